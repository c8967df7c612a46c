//! Core type definitions for the hemorrhage pipeline
//!
//! - [`Diagnosis`]: The six-name label vocabulary in label-vector order
//! - [`HeadVariant`]: Shared vs separate classifier heads
//! - [`ImageFormat`]: PNG or DICOM image source
//! - [`CachePolicy`]: Label cache reuse rule
//! - [`WindowSetting`]: CT display window (center, width)
//! - [`PipelineConfig`]: Configuration passed into every stage

mod config;
mod enums;
mod window;

pub use config::PipelineConfig;
pub use enums::{CachePolicy, Diagnosis, HeadVariant, ImageFormat};
pub use window::WindowSetting;
