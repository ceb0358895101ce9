use std::path::PathBuf;
use thiserror::Error;

use super::build_status::BuildStatus;

#[derive(Debug, Error)]
pub enum TrodesFileError {
    #[error("Could not open extracted data file because file {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("Extracted data file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Extracted data file has an invalid settings header: {0}")]
    BadHeader(String),
    #[error("Extracted data file is missing the required setting or field {0}")]
    MissingField(String),
    #[error("Extracted data file declares unsupported field type {0}")]
    UnsupportedType(String),
    #[error("Extracted data file has a malformed field specification: {0}")]
    BadFieldSpec(String),
    #[error("Extracted data file ends with a partial record of {0} bytes; expected records of {1} bytes")]
    TruncatedRecord(usize, usize),
}

#[derive(Debug, Error)]
pub enum VideoFilesError {
    #[error("Video file name {0:?} is too short to strip its extension")]
    BadStreamName(String),
    #[error("Failed to read video timestamps from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: TrodesFileError,
    },
    #[error("Video timestamp file {path:?} has no {field} field")]
    MissingField { path: PathBuf, field: String },
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to load metadata as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Metadata failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Metadata failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid number of parallel instances: {0}; must be at least 1")]
    BadParallelInstances(usize),
    #[error("Config failed due to metadata error: {0}")]
    MetadataError(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Extractor failed to start program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Extractor program {program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container failed due to video files error: {0}")]
    VideoFiles(#[from] VideoFilesError),
    #[error("Container failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Container failed to convert a string for HDF5: {0}")]
    StringError(String),
    #[error("Container failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Container failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Container failed to format a timestamp: {0}")]
    TimeError(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("Builder failed during preprocessing: {0}")]
    Extractor(#[from] ExtractorError),
    #[error("Builder failed on date {date} (output {output_file}): {source}")]
    Container {
        date: String,
        output_file: String,
        #[source]
        source: ContainerError,
    },
    #[error("Builder failed to remove preprocessing directory {path:?}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Builder failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<BuildStatus>),
}
