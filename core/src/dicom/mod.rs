//! DICOM access: tag helpers and CT slice decoding

pub mod slice;
pub mod tags;

pub use slice::{fill_channels, CtSlice};
pub use tags::*;
