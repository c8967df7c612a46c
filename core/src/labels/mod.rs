//! Label table construction
//!
//! Turns the long-format `prefix_imageId_diagnosis` CSV into a wide table
//! with one row per image, filtered to images that exist on disk, and
//! caches the result for later runs.

pub mod cache;
pub mod prepare;
pub mod record;
pub mod table;

pub use prepare::{list_image_ids, prepare_test_table, prepare_train_labels, PrepareOutcome};
pub use record::{CompoundId, LongRow, RawLabelRecord, IMAGE_PREFIX};
pub use table::{bare_image_id, LabelTable, WideLabelRow};
