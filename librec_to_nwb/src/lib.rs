//! # rec_to_nwb
//!
//! rec_to_nwb converts Trodes electrophysiology and video recordings into NWB containers,
//! one container per recording date. Raw .rec files are first handed to an extraction
//! program which writes binary files into a preprocessing directory; the containers are
//! then built from those files and from the session metadata.
//!
//! ## Building & Install
//!
//! HDF5 must be installed before building, the same way the hdf5-rust crate expects it
//! (a package manager install is usually detected automatically; otherwise set `HDF5_DIR`
//! in `.cargo/config.toml`).
//!
//! To build and install the CLI use `cargo install --path ./rec_to_nwb_cli` from the top
//! level repository.
//!
//! ## Configuration
//!
//! The CLI reads a YAML configuration. A template can be made with
//! `rec_to_nwb_cli new -p config.yml`:
//!
//! ```yml
//! data_path: None
//! animal_name: ''
//! dates: []
//! metadata_path: None
//! output_path: ''
//! extract_analog: false
//! extract_spikes: false
//! extract_lfps: false
//! extract_dio: true
//! extract_time: true
//! extract_mda: true
//! parallel_instances: 4
//! convert_timestamps: true
//! return_timestamps: true
//! extractor_program: rec_to_binaries
//! ```
//!
//! - `data_path`: directory containing `<animal_name>/raw/<date>/`
//! - `output_path`: prefix of the output files. Files are named
//! `<output_path><animal_name><date>.nwb` with no separator added, so give a trailing `/`
//! when pointing at a directory.
//! - `parallel_instances`: passed to the extraction program, which decides how to use it.
//! - `extractor_program`: called as
//! `<program> --data-path <path> --animal <name> --parallel-instances <n> --extract-<stage>...`
//! with one `--extract-` flag per enabled stage (`analog`, `dio`, `time`, `mda`, `lfps`,
//! `spikes`).
//!
//! ## Video timestamps
//!
//! Each video listed under `associated_video_files` in the metadata gets its timestamps from
//! the files written next to it in the raw directory. For a video `x.1.h264`:
//!
//! - `x.1.videoTimeStamps.cameraHWSync` exists when the camera was synchronized with PTP.
//! Its `HWTimestamp` field is unix time in nanoseconds and is converted to seconds when
//! `convert_timestamps` is set.
//! - Otherwise `x.1.videoTimeStamps.cameraHWFrameCount` is used. Its `frameCount` field only
//! counts frames, and is never converted.
//!
//! ## Output
//!
//! ```text
//! beans20190718.nwb
//! / - identifier, session_description, file_create_date, producer
//! |---- general - session_id, experimenter, lab, institution, process_mda, process_dio
//! |    |---- subject - subject_id
//! |---- processing
//! |    |---- video_files
//! |    |    |---- <video name>(dset: timestamps) - device
//! ```
//!
//! Next to every container a `.yml` file lists the extracted files used for that date.
pub mod build_status;
pub mod builder;
pub mod config;
pub mod container;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod nwb_writer;
pub mod trodes_file;
pub mod video_files;
