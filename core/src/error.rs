use thiserror::Error;

/// Result type for hemorrhage pipeline operations
pub type Result<T> = std::result::Result<T, IchError>;

/// Error types for hemorrhage pipeline operations
#[derive(Error, Debug)]
pub enum IchError {
    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// Tag not found in DICOM file
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// Invalid tag value
    #[error("Invalid tag value: {0}")]
    InvalidValue(String),

    /// Compound label ID that does not split into `prefix_imageId_diagnosis`
    #[error("Malformed label ID '{id}': expected 3 '_'-separated parts, found {parts}")]
    MalformedId { id: String, parts: usize },

    /// Diagnosis name outside the fixed vocabulary
    #[error("Unknown diagnosis: {0}")]
    UnknownDiagnosis(String),

    /// Pivot produced no cell for an expected diagnosis
    #[error("Missing label for image {image}, diagnosis {diagnosis}")]
    MissingDiagnosis { image: String, diagnosis: String },

    /// Same image and diagnosis carry different labels
    #[error("Conflicting labels for image {image}, diagnosis {diagnosis}")]
    ConflictingLabel { image: String, diagnosis: String },

    /// No readable sample at or after the requested index
    #[error("Dataset exhausted: no valid sample at or after index {requested} (length {len})")]
    DatasetExhausted { requested: usize, len: usize },

    /// Index past the end of the label table
    #[error("Index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Image decode/encode error
    #[error("Image error: {0}")]
    ImageError(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Configuration parse error
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Model save/load or tensor conversion error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Generic pipeline error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper conversions
impl From<String> for IchError {
    fn from(s: String) -> Self {
        IchError::PipelineError(s)
    }
}

impl From<&str> for IchError {
    fn from(s: &str) -> Self {
        IchError::PipelineError(s.to_string())
    }
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for IchError {
    fn from(e: dicom_object::ReadError) -> Self {
        IchError::DicomError(format!("{}", e))
    }
}

impl From<dicom_core::value::ConvertValueError> for IchError {
    fn from(e: dicom_core::value::ConvertValueError) -> Self {
        IchError::InvalidValue(format!("{}", e))
    }
}

impl From<csv::Error> for IchError {
    fn from(e: csv::Error) -> Self {
        IchError::CsvError(format!("{}", e))
    }
}

impl From<image::ImageError> for IchError {
    fn from(e: image::ImageError) -> Self {
        IchError::ImageError(format!("{}", e))
    }
}

impl From<serde_json::Error> for IchError {
    fn from(e: serde_json::Error) -> Self {
        IchError::ConfigError(format!("{}", e))
    }
}
