use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::extractor::ExtractionOptions;
use super::metadata::NwbMetadata;
use super::video_files::VideoFilesOptions;

/// Structure representing the application configuration. Contains pathing, the subject and
/// dates to convert, and the extraction switches.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub data_path: PathBuf,
    pub animal_name: String,
    pub dates: Vec<String>,
    pub metadata_path: PathBuf,
    /// Prefix of every output file. Joined by plain concatenation, so a directory needs its
    /// trailing separator.
    pub output_path: String,
    pub extract_analog: bool,
    pub extract_spikes: bool,
    pub extract_lfps: bool,
    pub extract_dio: bool,
    pub extract_time: bool,
    pub extract_mda: bool,
    pub parallel_instances: usize,
    pub convert_timestamps: bool,
    pub return_timestamps: bool,
    pub extractor_program: String,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        let extraction = ExtractionOptions::default();
        let video = VideoFilesOptions::default();
        Self {
            data_path: PathBuf::from("None"),
            animal_name: String::from(""),
            dates: vec![],
            metadata_path: PathBuf::from("None"),
            output_path: String::from(""),
            extract_analog: extraction.extract_analog,
            extract_spikes: extraction.extract_spikes,
            extract_lfps: extraction.extract_lfps,
            extract_dio: extraction.extract_dio,
            extract_time: extraction.extract_time,
            extract_mda: extraction.extract_mda,
            parallel_instances: extraction.parallel_instances,
            convert_timestamps: video.convert_timestamps,
            return_timestamps: video.return_timestamps,
            extractor_program: String::from("rec_to_binaries"),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        if !config.is_parallel_instances_valid() {
            return Err(ConfigError::BadParallelInstances(config.parallel_instances));
        }
        Ok(config)
    }

    /// Load the session metadata the config points to
    pub fn read_metadata(&self) -> Result<NwbMetadata, ConfigError> {
        Ok(NwbMetadata::read_metadata_file(&self.metadata_path)?)
    }

    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            extract_analog: self.extract_analog,
            extract_spikes: self.extract_spikes,
            extract_lfps: self.extract_lfps,
            extract_dio: self.extract_dio,
            extract_time: self.extract_time,
            extract_mda: self.extract_mda,
            parallel_instances: self.parallel_instances,
        }
    }

    pub fn video_options(&self) -> VideoFilesOptions {
        VideoFilesOptions {
            convert_timestamps: self.convert_timestamps,
            return_timestamps: self.return_timestamps,
        }
    }

    pub fn is_parallel_instances_valid(&self) -> bool {
        self.parallel_instances >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let config = Config {
            data_path: PathBuf::from("/stelmo/data"),
            animal_name: String::from("beans"),
            dates: vec![String::from("20190718"), String::from("20190719")],
            output_path: String::from("/stelmo/nwb/"),
            ..Default::default()
        };
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

        let loaded = Config::read_config_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.extraction_options(), ExtractionOptions::default());
        assert_eq!(loaded.video_options(), VideoFilesOptions::default());
    }

    #[test]
    fn test_zero_parallel_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let config = Config {
            parallel_instances: 0,
            ..Default::default()
        };
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::BadParallelInstances(0))
        ));
    }

    #[test]
    fn test_missing_metadata() {
        let config = Config::default();
        assert!(matches!(
            config.read_metadata(),
            Err(ConfigError::MetadataError(_))
        ));
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::read_config_file(&dir.path().join("nope.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
