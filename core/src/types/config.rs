use crate::error::{IchError, Result};
use crate::types::{CachePolicy, HeadVariant, ImageFormat, WindowSetting};
use std::path::{Path, PathBuf};

/// Configuration for the whole hemorrhage pipeline
///
/// Passed explicitly into every stage at construction. Fields missing from a
/// JSON config file fall back to [`PipelineConfig::default`].
///
/// # Example
///
/// ```
/// use ich_core::{HeadVariant, PipelineConfig};
///
/// let config = PipelineConfig::default()
///     .with_batch_size(8)
///     .with_epochs(2)
///     .with_head_variant(HeadVariant::Shared);
///
/// assert_eq!(config.batch_size, 8);
/// assert_eq!(config.head_variant.class_count(), 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the raw competition CSVs
    pub csv_dir: PathBuf,

    /// Long-format training label file name inside `csv_dir`
    pub train_csv_name: String,

    /// Sample submission template file name inside `csv_dir`
    pub template_csv_name: String,

    /// Directory of training images
    pub train_image_dir: PathBuf,

    /// Directory of test images
    pub test_image_dir: PathBuf,

    /// Wide-format training label cache
    pub train_cache: PathBuf,

    /// Prepared test image list cache
    pub test_cache: PathBuf,

    /// Directory for checkpoints and submissions
    pub output_dir: PathBuf,

    /// On-disk image format of both image directories
    pub image_format: ImageFormat,

    /// CT window used when decoding DICOM slices
    pub window: WindowSetting,

    /// Classifier head layout; also fixes the label-vector length
    pub head_variant: HeadVariant,

    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,

    /// Probability threshold for deriving `any` under the shared head
    pub threshold: f32,

    /// Side length images are resized to when decoded from DICOM
    pub input_size: u32,

    /// Side length of the center crop applied before batching
    pub crop_size: u32,

    /// Worker threads used for sample loading
    pub num_workers: usize,

    /// Shuffle training batches
    pub shuffle: bool,

    /// Seed for shuffling and augmentation
    pub seed: u64,

    /// Stop an epoch after this many steps
    pub max_steps_per_epoch: Option<usize>,

    /// Stop inference after this many batches
    pub max_inference_batches: Option<usize>,

    /// Label cache validation
    pub cache_policy: CachePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("../../input/"),
            train_csv_name: "stage_1_train.csv".to_string(),
            template_csv_name: "stage_1_sample_submission.csv".to_string(),
            train_image_dir: PathBuf::from("../../input/stage_1_train_pngs/"),
            test_image_dir: PathBuf::from("../../input/stage_1_test_pngs/"),
            train_cache: PathBuf::from("train.csv"),
            test_cache: PathBuf::from("test.csv"),
            output_dir: PathBuf::from("../../output/"),
            image_format: ImageFormat::Png,
            window: WindowSetting::default(),
            head_variant: HeadVariant::Separate,
            batch_size: 32,
            epochs: 10,
            learning_rate: 2e-5,
            threshold: 0.8,
            input_size: 224,
            crop_size: 200,
            num_workers: 8,
            shuffle: true,
            seed: 42,
            max_steps_per_epoch: None,
            max_inference_batches: None,
            cache_policy: CachePolicy::Exists,
        }
    }
}

impl PipelineConfig {
    /// Small, fast configuration for smoke runs on CPU
    ///
    /// # Example
    ///
    /// ```
    /// use ich_core::PipelineConfig;
    ///
    /// let debug = PipelineConfig::debug();
    /// assert_eq!(debug.batch_size, 4);
    /// assert_eq!(debug.epochs, 1);
    /// assert_eq!(debug.max_inference_batches, Some(50));
    /// ```
    pub fn debug() -> Self {
        Self {
            batch_size: 4,
            epochs: 1,
            max_inference_batches: Some(50),
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// sets a negative window width
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.window.width < 0.0 {
            return Err(IchError::ConfigError(format!(
                "{}: window width must be non-negative, got {}",
                path.display(),
                config.window.width
            )));
        }
        Ok(config)
    }

    /// Path of the long-format training CSV
    pub fn train_csv_path(&self) -> PathBuf {
        self.csv_dir.join(&self.train_csv_name)
    }

    /// Path of the sample submission template
    pub fn template_csv_path(&self) -> PathBuf {
        self.csv_dir.join(&self.template_csv_name)
    }

    /// Path of the saved model for a given epoch (1-based)
    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.output_dir.join(format!("model-epoch-{}", epoch))
    }

    /// Path of the final trained model
    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join("model")
    }

    /// Path of the submission CSV
    pub fn submission_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_sub.csv", self.head_variant.simple_name()))
    }

    /// Builder: Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder: Set epoch count
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Builder: Set CT window
    pub fn with_window(mut self, window: WindowSetting) -> Self {
        self.window = window;
        self
    }

    /// Builder: Set head layout
    pub fn with_head_variant(mut self, variant: HeadVariant) -> Self {
        self.head_variant = variant;
        self
    }

    /// Builder: Set image format
    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    /// Builder: Set `any` threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder: Set cache policy
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Builder: Set raw CSV directory
    pub fn with_csv_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.csv_dir = dir.into();
        self
    }

    /// Builder: Set train and test image directories
    pub fn with_image_dirs(mut self, train: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        self.train_image_dir = train.into();
        self.test_image_dir = test.into();
        self
    }

    /// Builder: Set label cache paths
    pub fn with_caches(mut self, train: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        self.train_cache = train.into();
        self.test_cache = test.into();
        self
    }

    /// Builder: Set output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}
