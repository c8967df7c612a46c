//! Image dataset, parallel loading and tensor batching
//!
//! [`IntracranialDataset`] maps table rows to decoded images and label vectors,
//! [`BatchLoader`] decodes batches on a worker pool, and [`ImageBatcher`]
//! stacks them into backend tensors.

pub mod batcher;
pub mod intracranial;
pub mod loader;

pub use batcher::{ImageBatch, ImageBatcher};
pub use intracranial::{ImageRecord, IntracranialDataset};
pub use loader::BatchLoader;
