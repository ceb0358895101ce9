use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::build_status::{BuildStage, BuildStatus};
use super::config::Config;
use super::container::{ContainerBuilder, ContainerBuilderFactory, DateBuildTask, NwbFileBuilderFactory};
use super::error::{BuilderError, ConfigError, ContainerError};
use super::extractor::{CommandExtractor, ExtractionOptions, RawExtractor};
use super::metadata::NwbMetadata;
use super::trodes_file::TrodesFileReader;
use super::video_files::VideoFilesOptions;

const PREPROCESSING_DIR: &str = "preprocessing";
const NWB_EXTENSION: &str = ".nwb";

/// The content type produced by the builders of a factory
pub type FactoryContent<F> =
    <<F as ContainerBuilderFactory>::Builder as ContainerBuilder>::Content;

/// Everything a build run needs to know about one subject
#[derive(Debug, Clone)]
pub struct SessionBuildContext {
    pub data_path: PathBuf,
    pub animal_name: String,
    pub dates: Vec<String>,
    pub metadata: Arc<NwbMetadata>,
    pub output_path: String,
    pub extraction: ExtractionOptions,
    pub video: VideoFilesOptions,
}

impl SessionBuildContext {
    pub fn from_config(config: &Config, metadata: NwbMetadata) -> Self {
        Self {
            data_path: config.data_path.clone(),
            animal_name: config.animal_name.clone(),
            dates: config.dates.clone(),
            metadata: Arc::new(metadata),
            output_path: config.output_path.clone(),
            extraction: config.extraction_options(),
            video: config.video_options(),
        }
    }
}

/// Converts the raw recordings of one subject into one container per date.
///
/// Preprocessing runs once for the whole subject, then each date is built and written before
/// the next one starts. The preprocessing directory is left on disk until [`Self::cleanup`]
/// is called.
#[derive(Debug)]
pub struct RawToNwbBuilder<E: RawExtractor, F: ContainerBuilderFactory> {
    context: SessionBuildContext,
    extractor: E,
    factory: F,
}

impl RawToNwbBuilder<CommandExtractor, NwbFileBuilderFactory<TrodesFileReader>> {
    /// Builder with the default extraction program and .nwb writer
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let metadata = config.read_metadata()?;
        Ok(Self::new(
            SessionBuildContext::from_config(config, metadata),
            CommandExtractor::new(&config.extractor_program),
            NwbFileBuilderFactory::new(TrodesFileReader),
        ))
    }
}

impl<E: RawExtractor, F: ContainerBuilderFactory> RawToNwbBuilder<E, F> {
    pub fn new(context: SessionBuildContext, extractor: E, factory: F) -> Self {
        Self {
            context,
            extractor,
            factory,
        }
    }

    pub fn context(&self) -> &SessionBuildContext {
        &self.context
    }

    /// `<data_path>/<animal_name>/preprocessing`
    pub fn preprocessing_path(&self) -> PathBuf {
        self.context
            .data_path
            .join(&self.context.animal_name)
            .join(PREPROCESSING_DIR)
    }

    /// Output file of a date. This is a plain concatenation of the output path, animal and date.
    pub fn output_file(&self, date: &str) -> String {
        format!(
            "{}{}{}{}",
            self.context.output_path, self.context.animal_name, date, NWB_EXTENSION
        )
    }

    /// Preprocess, then build and write the container of every date in order.
    ///
    /// Only the content of the last date is returned (None if there were no dates).
    pub fn build(&self) -> Result<Option<FactoryContent<F>>, BuilderError> {
        self.run(None)
    }

    /// Same as [`Self::build`], reporting progress through the channel
    pub fn build_with_status(
        &self,
        tx: &Sender<BuildStatus>,
    ) -> Result<Option<FactoryContent<F>>, BuilderError> {
        self.run(Some(tx))
    }

    /// Remove the preprocessing directory of the subject, if there is one
    pub fn cleanup(&self) -> Result<(), BuilderError> {
        let preprocessing = self.preprocessing_path();
        if preprocessing.exists() {
            spdlog::info!("Removing {}", preprocessing.to_string_lossy());
            std::fs::remove_dir_all(&preprocessing).map_err(|source| BuilderError::Cleanup {
                path: preprocessing.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn preprocess_data(&self) -> Result<(), BuilderError> {
        spdlog::info!(
            "Preprocessing raw data for {} with {} parallel instances...",
            self.context.animal_name,
            self.context.extraction.parallel_instances
        );
        self.extractor.extract(
            &self.context.data_path,
            &self.context.animal_name,
            &self.context.extraction,
        )?;
        Ok(())
    }

    fn date_task(&self, date: &str) -> DateBuildTask {
        DateBuildTask {
            data_path: self.context.data_path.clone(),
            animal_name: self.context.animal_name.clone(),
            date: date.to_string(),
            metadata: self.context.metadata.clone(),
            output_file: self.output_file(date),
            process_mda: self.context.extraction.extract_mda,
            process_dio: self.context.extraction.extract_dio,
            video: self.context.video,
        }
    }

    fn run(
        &self,
        tx: Option<&Sender<BuildStatus>>,
    ) -> Result<Option<FactoryContent<F>>, BuilderError> {
        send_status(tx, BuildStatus::new(0.0, "", BuildStage::Preprocessing))?;
        self.preprocess_data()?;

        let n_dates = self.context.dates.len() as f32;
        let mut content = None;
        for (idx, date) in self.context.dates.iter().enumerate() {
            spdlog::info!("Processing date {}...", date);
            let task = self.date_task(date);
            let output_file = task.output_file.clone();
            let on_error = |source: ContainerError| BuilderError::Container {
                date: date.clone(),
                output_file: output_file.clone(),
                source,
            };

            send_status(
                tx,
                BuildStatus::new(idx as f32 / n_dates, date, BuildStage::Building),
            )?;
            let mut builder = self.factory.create(task).map_err(on_error)?;
            let date_content = builder.build().map_err(on_error)?;

            send_status(
                tx,
                BuildStatus::new((idx as f32 + 0.5) / n_dates, date, BuildStage::Writing),
            )?;
            builder.write(&date_content).map_err(on_error)?;
            spdlog::info!("Finished processing date {}.", date);
            content = Some(date_content);
        }

        let last_date = self.context.dates.last().map(String::as_str).unwrap_or("");
        send_status(tx, BuildStatus::new(1.0, last_date, BuildStage::Finished))?;
        Ok(content)
    }
}

fn send_status(tx: Option<&Sender<BuildStatus>>, status: BuildStatus) -> Result<(), BuilderError> {
    if let Some(tx) = tx {
        tx.send(status)?;
    }
    Ok(())
}
