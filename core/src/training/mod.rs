//! Training loop, batch inference and submission writing

pub mod predict;
pub mod submission;
pub mod train;

pub use predict::{derive_any, expand_row, predict, Prediction};
pub use submission::write_submission;
pub use train::{into_inference, load_trained, train, TrainingReport, CLASSIFIER_CONFIG_FILE};

use indicatif::{ProgressBar, ProgressStyle};

/// Compute backend for inference
#[cfg(not(feature = "wgpu"))]
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// Compute backend for inference
#[cfg(feature = "wgpu")]
pub type InferenceBackend = burn::backend::Wgpu;

/// Compute backend for training
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;

pub(crate) fn progress_bar(len: usize, prefix: String) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_prefix(prefix);
    pb
}
