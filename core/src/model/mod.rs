//! Slice classifier and its training loss

pub mod classifier;
pub mod loss;

pub use classifier::{Classifier, ClassifierConfig};
pub use loss::aggregate_loss;
