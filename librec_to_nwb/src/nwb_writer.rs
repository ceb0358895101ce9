use hdf5::types::VarLenUnicode;
use hdf5::File;
use ndarray::Array1;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::container::NwbContent;
use super::error::ContainerError;
use super::video_files::VideoFile;

const GENERAL_NAME: &str = "general";
const SUBJECT_NAME: &str = "subject";
const PROCESSING_NAME: &str = "processing";
const VIDEO_FILES_NAME: &str = "video_files";

/// This is the version of the container layout
const FORMAT_VERSION: &str = "1.0";

/// Thin wrapper around hdf5-rust which lays out a session container.
// Structure
// / - identifier, session_description, file_create_date, producer
// |---- general - session_id, experimenter, lab, institution, process_mda, process_dio
// |    |---- subject - subject_id
// |---- processing
// |    |---- video_files
// |    |    |---- <video name>(dset: timestamps) - device
#[derive(Debug)]
pub struct NwbWriter {
    file_handle: File,
    file_path: PathBuf,
    sidecar_path: PathBuf,
    general_group: hdf5::Group,
    video_group: hdf5::Group,
}

fn write_string_attr(
    location: &hdf5::Location,
    name: &str,
    value: &str,
) -> Result<(), ContainerError> {
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(
            &VarLenUnicode::from_str(value)
                .map_err(|e| ContainerError::StringError(e.to_string()))?,
        )?;
    Ok(())
}

impl NwbWriter {
    /// Create the writer, opening a file at path and creating the groups
    pub fn new(path: &Path) -> Result<Self, ContainerError> {
        let file_handle = File::create(path)?;
        let sidecar_path = path.with_extension("yml");

        let general_group = file_handle.create_group(GENERAL_NAME)?;
        let processing_group = file_handle.create_group(PROCESSING_NAME)?;
        let video_group = processing_group.create_group(VIDEO_FILES_NAME)?;

        Ok(Self {
            file_handle,
            file_path: path.to_path_buf(),
            sidecar_path,
            general_group,
            video_group,
        })
    }

    /// Write the session level attributes
    pub fn write_session(&mut self, content: &NwbContent) -> Result<(), ContainerError> {
        let producer = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        let created = OffsetDateTime::now_utc().format(&Rfc3339)?;

        write_string_attr(&self.file_handle, "identifier", &content.identifier)?;
        write_string_attr(
            &self.file_handle,
            "session_description",
            &content.session_description,
        )?;
        write_string_attr(&self.file_handle, "file_create_date", &created)?;
        write_string_attr(&self.file_handle, "producer", &producer)?;

        write_string_attr(&self.general_group, "session_id", &content.session_id)?;
        for (name, value) in [
            ("experimenter", &content.experimenter_name),
            ("lab", &content.lab),
            ("institution", &content.institution),
        ] {
            if let Some(v) = value {
                write_string_attr(&self.general_group, name, v)?;
            }
        }
        self.general_group
            .new_attr::<bool>()
            .create("process_mda")?
            .write_scalar(&content.process_mda)?;
        self.general_group
            .new_attr::<bool>()
            .create("process_dio")?
            .write_scalar(&content.process_dio)?;

        let subject_group = self.general_group.create_group(SUBJECT_NAME)?;
        write_string_attr(&subject_group, "subject_id", &content.animal_name)?;
        Ok(())
    }

    /// Write a video stream as a timestamp dataset tagged with its camera
    pub fn write_video_file(&mut self, video_file: &VideoFile) -> Result<(), ContainerError> {
        let dset = if video_file.timestamps.is_empty() {
            self.video_group
                .new_dataset::<f64>()
                .shape(0)
                .create(video_file.name.as_str())?
        } else {
            let timestamps = Array1::from(video_file.timestamps.clone());
            self.video_group
                .new_dataset_builder()
                .with_data(&timestamps)
                .create(video_file.name.as_str())?
        };
        dset.new_attr::<u32>()
            .create("device")?
            .write_scalar(&video_file.device)?;
        Ok(())
    }

    /// Write the extracted files used by this container in a separate yaml file
    pub fn write_fileinfo(&self, content: &NwbContent) -> Result<(), ContainerError> {
        let mut file_map = BTreeMap::<String, Vec<String>>::new();
        file_map.insert(
            String::from("extracted_file_names"),
            content
                .extracted_files
                .iter()
                .map(|a| a.path.to_string_lossy().to_string())
                .collect(),
        );
        file_map.insert(
            String::from("extracted_file_sizes"),
            content
                .extracted_files
                .iter()
                .map(|a| human_bytes::human_bytes(a.size_bytes as f64))
                .collect(),
        );

        let mut sidecar = std::fs::File::create(&self.sidecar_path)?;
        sidecar.write_all(serde_yaml::to_string(&file_map)?.as_bytes())?;
        Ok(())
    }

    /// Flush everything to disk and close the file, consuming the writer
    pub fn close(self) -> Result<(), ContainerError> {
        self.file_handle.flush()?;
        let file_path = self.file_path;
        drop(self.video_group);
        drop(self.general_group);
        drop(self.file_handle);
        spdlog::info!(
            "Wrote {} ({})",
            file_path.to_string_lossy(),
            human_bytes::human_bytes(std::fs::metadata(&file_path)?.len() as f64)
        );
        Ok(())
    }
}
