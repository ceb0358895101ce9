use std::path::Path;
use std::process::Command;

use super::error::ExtractorError;

/// Which parts of the raw recordings get extracted, and how many extraction instances may
/// run at once. The instance count is handed to the extraction program untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub extract_analog: bool,
    pub extract_spikes: bool,
    pub extract_lfps: bool,
    pub extract_dio: bool,
    pub extract_time: bool,
    pub extract_mda: bool,
    pub parallel_instances: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            extract_analog: false,
            extract_spikes: false,
            extract_lfps: false,
            extract_dio: true,
            extract_time: true,
            extract_mda: true,
            parallel_instances: 4,
        }
    }
}

impl ExtractionOptions {
    /// Names of the enabled stages, in a fixed order
    pub fn enabled_stages(&self) -> Vec<&'static str> {
        [
            ("analog", self.extract_analog),
            ("dio", self.extract_dio),
            ("time", self.extract_time),
            ("mda", self.extract_mda),
            ("lfps", self.extract_lfps),
            ("spikes", self.extract_spikes),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }
}

/// Turns the raw .rec files of a subject into extracted binaries under
/// `<data_path>/<animal_name>/preprocessing`.
pub trait RawExtractor {
    fn extract(
        &self,
        data_path: &Path,
        animal_name: &str,
        options: &ExtractionOptions,
    ) -> Result<(), ExtractorError>;
}

/// Runs an external extraction program.
///
/// The program is called as
/// `<program> --data-path <path> --animal <name> --parallel-instances <n> [--extract-<stage>...]`
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
}

impl CommandExtractor {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn build_args(data_path: &Path, animal_name: &str, options: &ExtractionOptions) -> Vec<String> {
        let mut args = vec![
            String::from("--data-path"),
            data_path.to_string_lossy().to_string(),
            String::from("--animal"),
            animal_name.to_string(),
            String::from("--parallel-instances"),
            options.parallel_instances.to_string(),
        ];
        args.extend(
            options
                .enabled_stages()
                .into_iter()
                .map(|stage| format!("--extract-{stage}")),
        );
        args
    }
}

impl RawExtractor for CommandExtractor {
    fn extract(
        &self,
        data_path: &Path,
        animal_name: &str,
        options: &ExtractionOptions,
    ) -> Result<(), ExtractorError> {
        let args = Self::build_args(data_path, animal_name, options);
        spdlog::info!("Running extraction: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| ExtractorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            spdlog::error!("Extraction failed with {}: {}", output.status, stderr);
            return Err(ExtractorError::ExitStatus {
                program: self.program.clone(),
                status: output.status,
                stderr,
            });
        }
        spdlog::info!("Extraction finished for {}", animal_name);
        Ok(())
    }
}
