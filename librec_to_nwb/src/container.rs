use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::ContainerError;
use super::metadata::NwbMetadata;
use super::nwb_writer::NwbWriter;
use super::trodes_file::ExtractedDataReader;
use super::video_files::{VideoFile, VideoFilesExtractor, VideoFilesOptions};

const RAW_DIR: &str = "raw";
const PREPROCESSING_DIR: &str = "preprocessing";
const TIME_EXTENSION: &str = "time";
const MDA_EXTENSION: &str = "mda";
const DIO_EXTENSION: &str = "DIO";

/// Everything needed to build the container of a single recording date
#[derive(Debug, Clone)]
pub struct DateBuildTask {
    pub data_path: PathBuf,
    pub animal_name: String,
    pub date: String,
    pub metadata: Arc<NwbMetadata>,
    pub output_file: String,
    pub process_mda: bool,
    pub process_dio: bool,
    pub video: VideoFilesOptions,
}

impl DateBuildTask {
    /// `<data_path>/<animal>/raw/<date>`, where the .rec files and video timestamps live
    pub fn raw_data_path(&self) -> PathBuf {
        self.data_path
            .join(&self.animal_name)
            .join(RAW_DIR)
            .join(&self.date)
    }

    /// `<data_path>/<animal>/preprocessing/<date>`, where the extracted binaries live
    pub fn preprocessing_path(&self) -> PathBuf {
        self.data_path
            .join(&self.animal_name)
            .join(PREPROCESSING_DIR)
            .join(&self.date)
    }
}

/// An extracted binary file or directory used by a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Content of one container, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NwbContent {
    pub identifier: String,
    pub animal_name: String,
    pub date: String,
    pub session_description: String,
    pub session_id: String,
    pub experimenter_name: Option<String>,
    pub lab: Option<String>,
    pub institution: Option<String>,
    pub video_files: Vec<VideoFile>,
    pub process_mda: bool,
    pub process_dio: bool,
    pub extracted_files: Vec<ExtractedArtifact>,
}

/// Builds and persists the container of one date
pub trait ContainerBuilder {
    type Content;

    fn build(&mut self) -> Result<Self::Content, ContainerError>;
    fn write(&mut self, content: &Self::Content) -> Result<(), ContainerError>;
}

/// Makes a fresh [`ContainerBuilder`] for every date
pub trait ContainerBuilderFactory {
    type Builder: ContainerBuilder;

    fn create(&self, task: DateBuildTask) -> Result<Self::Builder, ContainerError>;
}

/// Default builder, writing an HDF5 based .nwb file
#[derive(Debug)]
pub struct NwbFileBuilder<R: ExtractedDataReader> {
    task: DateBuildTask,
    reader: R,
}

impl<R: ExtractedDataReader> NwbFileBuilder<R> {
    pub fn new(task: DateBuildTask, reader: R) -> Self {
        Self { task, reader }
    }

    /// List the extracted binaries for this date that the container refers to.
    ///
    /// Timestamps are always kept; mda and DIO only when they are being processed.
    fn list_extracted_files(&self) -> Result<Vec<ExtractedArtifact>, ContainerError> {
        let date_dir = self.task.preprocessing_path();
        if !date_dir.exists() {
            spdlog::warn!(
                "No preprocessing directory found at {}, container will not list extracted files",
                date_dir.to_string_lossy()
            );
            return Ok(vec![]);
        }

        let mut artifacts = Vec::new();
        for item in date_dir.read_dir()? {
            let path = item?.path();
            let keep = match path.extension().and_then(|e| e.to_str()) {
                Some(TIME_EXTENSION) => true,
                Some(MDA_EXTENSION) => self.task.process_mda,
                Some(DIO_EXTENSION) => self.task.process_dio,
                _ => false,
            };
            if keep {
                let size_bytes = artifact_size(&path)?;
                artifacts.push(ExtractedArtifact { path, size_bytes });
            }
        }
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(artifacts)
    }
}

impl<R: ExtractedDataReader> ContainerBuilder for NwbFileBuilder<R> {
    type Content = NwbContent;

    fn build(&mut self) -> Result<NwbContent, ContainerError> {
        let task = &self.task;
        spdlog::info!("Building container for {} on {}", task.animal_name, task.date);

        let video_extractor = VideoFilesExtractor::new(&task.raw_data_path(), &self.reader);
        let video_files = video_extractor
            .extract_video_files(&task.metadata.associated_video_files, &task.video)?;
        let extracted_files = self.list_extracted_files()?;

        let identifier = format!("{}_{}", task.animal_name, task.date);
        let metadata = &task.metadata;
        Ok(NwbContent {
            session_id: metadata
                .session_id
                .clone()
                .unwrap_or_else(|| identifier.clone()),
            identifier,
            animal_name: task.animal_name.clone(),
            date: task.date.clone(),
            session_description: metadata.session_description.clone(),
            experimenter_name: metadata.experimenter_name.clone(),
            lab: metadata.lab.clone(),
            institution: metadata.institution.clone(),
            video_files,
            process_mda: task.process_mda,
            process_dio: task.process_dio,
            extracted_files,
        })
    }

    fn write(&mut self, content: &NwbContent) -> Result<(), ContainerError> {
        let mut writer = NwbWriter::new(Path::new(&self.task.output_file))?;
        writer.write_session(content)?;
        for video_file in content.video_files.iter() {
            writer.write_video_file(video_file)?;
        }
        writer.write_fileinfo(content)?;
        writer.close()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NwbFileBuilderFactory<R: ExtractedDataReader + Clone> {
    reader: R,
}

impl<R: ExtractedDataReader + Clone> NwbFileBuilderFactory<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: ExtractedDataReader + Clone> ContainerBuilderFactory for NwbFileBuilderFactory<R> {
    type Builder = NwbFileBuilder<R>;

    fn create(&self, task: DateBuildTask) -> Result<NwbFileBuilder<R>, ContainerError> {
        Ok(NwbFileBuilder::new(task, self.reader.clone()))
    }
}

/// Size of a file, or of the files directly inside a directory
fn artifact_size(path: &Path) -> Result<u64, ContainerError> {
    if !path.is_dir() {
        return Ok(path.metadata()?.len());
    }
    let mut total: u64 = 0;
    for item in path.read_dir()? {
        let meta = item?.metadata()?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::VideoFileMetadata;
    use crate::trodes_file::fixtures::{write_frame_count, write_hw_sync};
    use crate::trodes_file::TrodesFileReader;
    use hdf5::types::VarLenUnicode;
    use tempfile::TempDir;

    fn make_task(data_path: &Path, output_file: String) -> DateBuildTask {
        DateBuildTask {
            data_path: data_path.to_path_buf(),
            animal_name: String::from("beans"),
            date: String::from("20190718"),
            metadata: Arc::new(NwbMetadata {
                session_description: String::from("Spatial bandit task"),
                lab: Some(String::from("Loren Frank")),
                associated_video_files: vec![
                    VideoFileMetadata::new("20190718_beans_01_s1.1.h264", 0),
                    VideoFileMetadata::new("20190718_beans_02_r1.1.h264", 1),
                ],
                ..Default::default()
            }),
            output_file,
            process_mda: true,
            process_dio: false,
            video: VideoFilesOptions::default(),
        }
    }

    /// Lay out a raw directory with one synced and one legacy video, plus preprocessing output
    fn make_session(data_path: &Path) {
        let raw = data_path.join("beans").join("raw").join("20190718");
        std::fs::create_dir_all(&raw).unwrap();
        write_hw_sync(
            &raw.join("20190718_beans_01_s1.1.videoTimeStamps.cameraHWSync"),
            &[1_563_400_000_000_000_000, 1_563_400_000_500_000_000],
        );
        write_frame_count(
            &raw.join("20190718_beans_02_r1.1.videoTimeStamps.cameraHWFrameCount"),
            &[0, 1, 2],
        );

        let pre = data_path.join("beans").join("preprocessing").join("20190718");
        for dir in [
            "20190718_beans_01_s1.time",
            "20190718_beans_01_s1.mda",
            "20190718_beans_01_s1.DIO",
            "20190718_beans_01_s1.spikes",
        ] {
            std::fs::create_dir_all(pre.join(dir)).unwrap();
            std::fs::write(pre.join(dir).join("data.dat"), [0u8; 16]).unwrap();
        }
    }

    #[test]
    fn test_build_content() {
        let dir = TempDir::new().unwrap();
        make_session(dir.path());
        let task = make_task(dir.path(), String::from("unused.nwb"));
        let mut builder = NwbFileBuilder::new(task, TrodesFileReader);
        let content = builder.build().unwrap();

        assert_eq!(content.identifier, "beans_20190718");
        assert_eq!(content.session_id, "beans_20190718");
        assert_eq!(content.lab.as_deref(), Some("Loren Frank"));
        assert_eq!(content.video_files.len(), 2);
        assert_eq!(content.video_files[0].timestamps, vec![1_563_400_000.0, 1_563_400_000.5]);
        assert_eq!(content.video_files[0].device, 0);
        assert_eq!(content.video_files[1].timestamps, vec![0.0, 1.0, 2.0]);

        let names: Vec<String> = content
            .extracted_files
            .iter()
            .map(|a| a.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["20190718_beans_01_s1.mda", "20190718_beans_01_s1.time"]);
        assert!(content.extracted_files.iter().all(|a| a.size_bytes == 16));
    }

    #[test]
    fn test_build_without_preprocessing() {
        let dir = TempDir::new().unwrap();
        make_session(dir.path());
        std::fs::remove_dir_all(dir.path().join("beans").join("preprocessing")).unwrap();
        let mut builder = NwbFileBuilder::new(
            make_task(dir.path(), String::from("unused.nwb")),
            TrodesFileReader,
        );
        assert!(builder.build().unwrap().extracted_files.is_empty());
    }

    #[test]
    fn test_build_missing_video_timestamps() {
        let dir = TempDir::new().unwrap();
        let mut builder = NwbFileBuilder::new(
            make_task(dir.path(), String::from("unused.nwb")),
            TrodesFileReader,
        );
        assert!(matches!(builder.build(), Err(ContainerError::VideoFiles(_))));
    }

    #[test]
    fn test_write_container() {
        let dir = TempDir::new().unwrap();
        make_session(dir.path());
        let output_file = format!("{}/beans20190718.nwb", dir.path().to_string_lossy());
        let factory = NwbFileBuilderFactory::new(TrodesFileReader);
        let mut builder = factory.create(make_task(dir.path(), output_file.clone())).unwrap();
        let content = builder.build().unwrap();
        builder.write(&content).unwrap();

        let file = hdf5::File::open(&output_file).unwrap();
        let identifier = file
            .attr("identifier")
            .unwrap()
            .read_scalar::<VarLenUnicode>()
            .unwrap();
        assert_eq!(identifier.as_str(), "beans_20190718");

        let dset = file
            .dataset("processing/video_files/20190718_beans_02_r1.1.h264")
            .unwrap();
        assert_eq!(dset.read_raw::<f64>().unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(dset.attr("device").unwrap().read_scalar::<u32>().unwrap(), 1);

        let sidecar = std::fs::read_to_string(dir.path().join("beans20190718.yml")).unwrap();
        assert!(sidecar.contains("20190718_beans_01_s1.mda"));
        assert!(!sidecar.contains("20190718_beans_01_s1.DIO"));
    }

    #[test]
    fn test_write_container_without_timestamps() {
        let dir = TempDir::new().unwrap();
        make_session(dir.path());
        let output_file = format!("{}/beans20190718.nwb", dir.path().to_string_lossy());
        let mut task = make_task(dir.path(), output_file.clone());
        task.video.return_timestamps = false;
        let mut builder = NwbFileBuilder::new(task, TrodesFileReader);
        let content = builder.build().unwrap();
        assert!(content.video_files.iter().all(|v| v.timestamps.is_empty()));
        builder.write(&content).unwrap();

        let file = hdf5::File::open(&output_file).unwrap();
        for (name, device) in [
            ("20190718_beans_01_s1.1.h264", 0u32),
            ("20190718_beans_02_r1.1.h264", 1),
        ] {
            let dset = file
                .dataset(&format!("processing/video_files/{name}"))
                .unwrap();
            assert_eq!(dset.shape(), vec![0]);
            assert!(dset.read_raw::<f64>().unwrap().is_empty());
            assert_eq!(dset.attr("device").unwrap().read_scalar::<u32>().unwrap(), device);
        }
    }
}
