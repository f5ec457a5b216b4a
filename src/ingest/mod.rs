//! Frame ingestion sources.
//!
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Stub source (`stub://`, testing)
//!
//! Sources hand out decoded `Frame`s one at a time and never write them to disk.
//! An unreadable source is a fatal input error for the caller.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats};
