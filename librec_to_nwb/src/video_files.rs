use std::path::{Path, PathBuf};

use super::error::{TrodesFileError, VideoFilesError};
use super::metadata::VideoFileMetadata;
use super::trodes_file::ExtractedDataReader;

pub const NANOSECONDS_PER_SECOND: f64 = 1e9;

const HW_SYNC_SUFFIX: &str = "videoTimeStamps.cameraHWSync";
const HW_SYNC_FIELD: &str = "HWTimestamp";
const HW_FRAME_COUNT_SUFFIX: &str = "videoTimeStamps.cameraHWFrameCount";
const HW_FRAME_COUNT_FIELD: &str = "frameCount";

// Length of the extension stripped from a video name to find its timestamp files.
// `x.1.h264` -> `x.1.`, which is then joined directly to the suffix.
const EXTENSION_LENGTH: usize = 4;

/// Which timestamp file a video stream was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// cameraHWSync: unix epoch nanoseconds, camera synchronized with PTP
    Synced,
    /// cameraHWFrameCount: frame indices only, from datasets recorded before PTP
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFilesOptions {
    pub convert_timestamps: bool,
    pub return_timestamps: bool,
}

impl Default for VideoFilesOptions {
    fn default() -> Self {
        Self {
            convert_timestamps: true,
            return_timestamps: true,
        }
    }
}

/// A video stream ready to be put in a container
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFile {
    pub name: String,
    /// Seconds, or the raw values when conversion is off. Raw unix nanoseconds exceed 2^53
    /// and are rounded to the nearest f64.
    pub timestamps: Vec<f64>,
    pub device: u32,
}

/// Resolves the timestamps of the video streams of a session.
///
/// Timestamps come from one of two files written next to the raw data. Sessions recorded
/// with PTP have a cameraHWSync file whose timestamps are unix time in nanoseconds; older
/// sessions only have a cameraHWFrameCount file holding frame indices. The sync file always
/// takes precedence and the frame count file is only read when the sync file does not exist.
#[derive(Debug)]
pub struct VideoFilesExtractor<R: ExtractedDataReader> {
    raw_data_path: PathBuf,
    reader: R,
}

impl<R: ExtractedDataReader> VideoFilesExtractor<R> {
    pub fn new(raw_data_path: &Path, reader: R) -> Self {
        Self {
            raw_data_path: raw_data_path.to_path_buf(),
            reader,
        }
    }

    /// Returns the name, timestamps and device for each video file, in the order given.
    ///
    /// When `return_timestamps` is off no file is touched and every stream gets an empty
    /// timestamp list.
    pub fn extract_video_files(
        &self,
        video_files: &[VideoFileMetadata],
        options: &VideoFilesOptions,
    ) -> Result<Vec<VideoFile>, VideoFilesError> {
        let mut extracted = Vec::with_capacity(video_files.len());
        for video_file in video_files {
            let timestamps = if options.return_timestamps {
                self.get_timestamps(video_file, options)?
            } else {
                Vec::new()
            };
            extracted.push(VideoFile {
                name: video_file.name.clone(),
                timestamps,
                device: video_file.camera_id,
            });
        }
        Ok(extracted)
    }

    /// Timestamps of one stream, in seconds since 1/1/1970 for synced data when converting,
    /// otherwise exactly as stored on disk.
    fn get_timestamps(
        &self,
        video_file: &VideoFileMetadata,
        options: &VideoFilesOptions,
    ) -> Result<Vec<f64>, VideoFilesError> {
        let stem = video_stem(&video_file.name)?;
        let (source, timestamps) = self.read_timestamps(stem)?;
        match source {
            TimestampSource::Synced => {
                spdlog::info!("Loaded cameraHWSync timestamps for {}", stem)
            }
            TimestampSource::Legacy => {
                spdlog::info!("Loaded cameraHWFrameCount for {} (old dataset)", stem)
            }
        }
        Ok(convert_timestamps(source, timestamps, options.convert_timestamps))
    }

    /// Try the sync file first, falling back to the frame count only when it is missing
    pub fn read_timestamps(
        &self,
        stem: &str,
    ) -> Result<(TimestampSource, Vec<f64>), VideoFilesError> {
        let sync_path = self.raw_data_path.join(format!("{stem}{HW_SYNC_SUFFIX}"));
        match self.read_field(&sync_path, HW_SYNC_FIELD) {
            Ok(timestamps) => Ok((TimestampSource::Synced, timestamps)),
            Err(VideoFilesError::Read {
                source: TrodesFileError::NotFound(_),
                ..
            }) => {
                let count_path = self
                    .raw_data_path
                    .join(format!("{stem}{HW_FRAME_COUNT_SUFFIX}"));
                let frame_counts = self.read_field(&count_path, HW_FRAME_COUNT_FIELD)?;
                Ok((TimestampSource::Legacy, frame_counts))
            }
            Err(e) => Err(e),
        }
    }

    fn read_field(&self, path: &Path, field: &str) -> Result<Vec<f64>, VideoFilesError> {
        let data = self
            .reader
            .read(path)
            .map_err(|source| VideoFilesError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        match data.field(field) {
            Some(column) => Ok(column.to_f64()),
            None => Err(VideoFilesError::MissingField {
                path: path.to_path_buf(),
                field: field.to_string(),
            }),
        }
    }
}

/// Strip the extension from a video name: `x.1.h264` -> `x.1.`
pub fn video_stem(name: &str) -> Result<&str, VideoFilesError> {
    let n_chars = name.chars().count();
    if n_chars < EXTENSION_LENGTH {
        return Err(VideoFilesError::BadStreamName(name.to_string()));
    }
    match name.char_indices().nth(n_chars - EXTENSION_LENGTH) {
        Some((idx, _)) => Ok(&name[..idx]),
        None => Ok(""),
    }
}

/// Nanoseconds to seconds, but only for synced data. Frame counts are not times and are
/// always returned untouched, whatever `convert` says.
pub fn convert_timestamps(source: TimestampSource, timestamps: Vec<f64>, convert: bool) -> Vec<f64> {
    match source {
        TimestampSource::Synced if convert => timestamps
            .into_iter()
            .map(|t| t / NANOSECONDS_PER_SECOND)
            .collect(),
        _ => timestamps,
    }
}
