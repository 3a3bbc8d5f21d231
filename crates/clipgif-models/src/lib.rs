//! Shared data models for the ClipGif service.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and the files that belong to them
//! - Conversion parameters and trim windows
//! - Filename allocation and sanitization

pub mod filename;
pub mod job;
pub mod params;

// Re-export common types
pub use filename::{
    allocate, is_safe_filename, FilenameError, JobNames, ALLOWED_EXTENSIONS, ARTIFACT_EXTENSION,
};
pub use job::{Job, JobFiles, JobId};
pub use params::{ConversionParams, ParamsError, TrimWindow, DEFAULT_FPS};
