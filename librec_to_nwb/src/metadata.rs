use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::MetadataError;

/// A video file recorded alongside a session, as declared in the metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFileMetadata {
    /// File name of the video, including its extension (i.e. `20190718_beans_01_s1.1.h264`)
    pub name: String,
    pub camera_id: u32,
}

impl VideoFileMetadata {
    pub fn new(name: &str, camera_id: u32) -> Self {
        Self {
            name: name.to_string(),
            camera_id,
        }
    }
}

/// Session metadata for one subject. Only the fields used to build a container are kept,
/// everything else in the file is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NwbMetadata {
    pub session_description: String,
    pub session_id: Option<String>,
    pub experimenter_name: Option<String>,
    pub lab: Option<String>,
    pub institution: Option<String>,
    pub associated_video_files: Vec<VideoFileMetadata>,
}

impl NwbMetadata {
    /// Read the metadata in a YAML file
    pub fn read_metadata_file(metadata_path: &Path) -> Result<Self, MetadataError> {
        if !metadata_path.exists() {
            return Err(MetadataError::BadFilePath(metadata_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(metadata_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}
