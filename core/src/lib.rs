pub mod api;
pub mod cli;
pub mod dataset;
pub mod dicom;
pub mod error;
pub mod imaging;
pub mod labels;
pub mod model;
pub mod training;
pub mod types;

pub use api::{Pipeline, PredictSummary, PrepareSummary, RunSummary};
pub use cli::report::TextReport;
pub use error::{IchError, Result};
pub use types::*;
