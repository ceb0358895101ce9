//! # rec_to_nwb_cli
//!
//! Command line front end of rec_to_nwb.
//!
//! ## Use
//!
//! Make a template configuration, fill it out, then run the conversion:
//!
//! ```bash
//! rec_to_nwb_cli new -p config.yml
//! rec_to_nwb_cli -p config.yml
//! ```
//!
//! The preprocessing directory is removed once every date has been written. Pass
//! `--keep-preprocessing` to leave it on disk. A log is written to `rec_to_nwb.log` in the
//! working directory.
use clap::{Arg, ArgAction, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use librec_to_nwb::build_status::{BuildStage, BuildStatus};
use librec_to_nwb::builder::RawToNwbBuilder;
use librec_to_nwb::config::Config;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could not create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// The two loggers of a run. The terminal sinks are dropped while the progress bar is drawn.
struct Loggers {
    full: Arc<spdlog::Logger>,
    file_only: Arc<spdlog::Logger>,
}

/// Keep the default terminal output and add a log file
fn build_loggers(log_path: &Path) -> spdlog::Result<Loggers> {
    let file_sink: Arc<dyn spdlog::sink::Sink> = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(log_path)
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let mut sinks: Vec<Arc<dyn spdlog::sink::Sink>> = spdlog::default_logger().sinks().to_vec();
    sinks.push(file_sink.clone());
    let full = Arc::new(
        spdlog::Logger::builder()
            .sinks(sinks)
            .flush_level_filter(spdlog::LevelFilter::All)
            .build()?,
    );
    let file_only = Arc::new(
        spdlog::Logger::builder()
            .sink(file_sink)
            .flush_level_filter(spdlog::LevelFilter::All)
            .build()?,
    );
    Ok(Loggers { full, file_only })
}

fn stage_message(status: &BuildStatus) -> String {
    match status.stage {
        BuildStage::Preprocessing => String::from("preprocessing"),
        BuildStage::Building => format!("building {}", status.date),
        BuildStage::Writing => format!("writing {}", status.date),
        BuildStage::Finished => String::from("finished"),
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("rec_to_nwb_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("keep-preprocessing")
                .long("keep-preprocessing")
                .action(ArgAction::SetTrue)
                .help("Do not remove the preprocessing directory after building"),
        )
        .get_matches();

    // Initialize feedback
    let loggers = match build_loggers(&PathBuf::from("./rec_to_nwb.log")) {
        Ok(l) => {
            spdlog::set_default_logger(l.full.clone());
            Some(l)
        }
        Err(e) => {
            spdlog::error!("Could not create the log file: {e}");
            None
        }
    };

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));
    let keep_preprocessing = matches.get_flag("keep-preprocessing");

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        spdlog::info!("Done.");
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Data Path: {}", config.data_path.to_string_lossy());
    spdlog::info!("Metadata Path: {}", config.metadata_path.to_string_lossy());
    spdlog::info!("Output Path: {}", config.output_path);
    spdlog::info!("Animal: {}", config.animal_name);
    spdlog::info!("Dates: {}", config.dates.join(", "));
    spdlog::info!("Parallel Instances: {}", config.parallel_instances);

    let builder = match RawToNwbBuilder::from_config(&config) {
        Ok(b) => b,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };

    // Setup the progress bar
    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos:>3}% {msg}") {
        pb.set_style(style);
    }
    if let Some(l) = &loggers {
        spdlog::set_default_logger(l.file_only.clone());
    }
    let (tx, rx) = mpsc::channel::<BuildStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || {
        builder.build_with_status(&tx)?;
        if !keep_preprocessing {
            builder.cleanup()?;
        }
        Ok::<(), librec_to_nwb::error::BuilderError>(())
    });

    let result = loop {
        std::thread::sleep(std::time::Duration::from_millis(500));
        for status in rx.try_iter() {
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(stage_message(&status));
        }

        if handle.is_finished() {
            break handle.join();
        }
    };

    pb.finish();
    if let Some(l) = &loggers {
        spdlog::set_default_logger(l.full.clone());
    }

    match result {
        Ok(Ok(_)) => spdlog::info!("Successfully converted data!"),
        Ok(Err(e)) => spdlog::error!("Conversion failed with error: {e}"),
        Err(_) => spdlog::error!("Failed to join conversion task!"),
    }

    spdlog::info!("Done.");
}
