use crate::dataset::IntracranialDataset;
use crate::error::Result;
use crate::imaging::{test_pipeline, train_pipeline};
use crate::labels::{prepare_test_table, prepare_train_labels, PrepareOutcome};
use crate::model::{Classifier, ClassifierConfig};
use crate::training::{self, into_inference, load_trained, write_submission, TrainingReport};
use crate::types::{ImageFormat, PipelineConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of the label preparation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareSummary {
    pub train: PrepareOutcome,
    pub test: PrepareOutcome,
}

/// Result of the inference stage
#[derive(Debug, Clone, PartialEq)]
pub struct PredictSummary {
    /// Images scored
    pub scored: usize,

    /// Images in the test table
    pub total: usize,

    /// Written submission, absent when inference was capped
    pub submission: Option<PathBuf>,

    /// Submission rows written
    pub rows: usize,
}

/// Result of a full prepare, train, predict run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub prepare: PrepareSummary,
    pub training: TrainingReport,
    pub predict: PredictSummary,
}

/// End-to-end hemorrhage classification pipeline
///
/// Wires label preparation, datasets, training and inference together for
/// one [`PipelineConfig`].
///
/// # Example
///
/// ```
/// use ich_core::{HeadVariant, Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::new(
///     PipelineConfig::debug().with_head_variant(HeadVariant::Shared),
/// );
/// assert_eq!(pipeline.config().batch_size, 4);
/// assert_eq!(pipeline.model_config().head_variant, HeadVariant::Shared);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Architecture matching the configured head variant
    pub fn model_config(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.config.head_variant)
    }

    /// Builds (or reuses) the wide training label table and the test table
    pub fn prepare(&self) -> Result<PrepareSummary> {
        let config = &self.config;
        let train = prepare_train_labels(
            &config.train_csv_path(),
            &config.train_image_dir,
            config.image_format,
            &config.train_cache,
            config.cache_policy,
        )?;
        let test = prepare_test_table(
            &config.template_csv_path(),
            &config.test_cache,
            config.cache_policy,
        )?;
        Ok(PrepareSummary { train, test })
    }

    /// Labeled dataset with training augmentation
    pub fn train_dataset(&self) -> Result<IntracranialDataset> {
        let config = &self.config;
        let dataset =
            IntracranialDataset::from_csv(&config.train_cache, &config.train_image_dir, true)?
                .with_diagnoses(config.head_variant.diagnoses())
                .with_transform(Arc::new(train_pipeline(config.crop_size)));
        Ok(self.with_source(dataset))
    }

    /// Unlabeled dataset with inference preprocessing
    pub fn test_dataset(&self) -> Result<IntracranialDataset> {
        let config = &self.config;
        let dataset =
            IntracranialDataset::from_csv(&config.test_cache, &config.test_image_dir, false)?
                .with_transform(Arc::new(test_pipeline(config.crop_size)));
        Ok(self.with_source(dataset))
    }

    fn with_source(&self, dataset: IntracranialDataset) -> IntracranialDataset {
        match self.config.image_format {
            ImageFormat::Png => dataset,
            ImageFormat::Dicom => dataset.with_dicom(self.config.window, self.config.input_size),
        }
    }

    /// Trains a fresh model on the prepared training table
    pub fn train<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> Result<(Classifier<B>, TrainingReport)> {
        let dataset = self.train_dataset()?;
        training::train(&self.config, &self.model_config(), &dataset, device)
    }

    /// Scores the test table and writes the submission
    ///
    /// With `max_inference_batches` set the submission is skipped, since the
    /// template cannot be filled completely.
    pub fn predict<B: Backend>(
        &self,
        model: &Classifier<B>,
        device: &B::Device,
    ) -> Result<PredictSummary> {
        let dataset = self.test_dataset()?;
        let predictions = training::predict(&self.config, model, &dataset, device)?;

        let mut summary = PredictSummary {
            scored: predictions.len(),
            total: dataset.len(),
            submission: None,
            rows: 0,
        };
        if self.config.max_inference_batches.is_some() && summary.scored < summary.total {
            info!(
                "Inference capped at {} of {} images; not writing a submission",
                summary.scored, summary.total
            );
            return Ok(summary);
        }

        let path = self.config.submission_path();
        summary.rows = write_submission(&self.config.template_csv_path(), &predictions, &path)?;
        summary.submission = Some(path);
        Ok(summary)
    }

    /// Loads the saved final model and runs [`predict`](Self::predict)
    pub fn predict_saved<B: Backend>(&self, device: &B::Device) -> Result<PredictSummary> {
        let model = load_trained::<B>(&self.config, device)?;
        self.predict(&model, device)
    }

    /// Prepare, train, then predict with the trained model
    pub fn run<B: AutodiffBackend>(&self, device: &B::Device) -> Result<RunSummary> {
        let prepare = self.prepare()?;
        let (model, training) = self.train::<B>(device)?;
        let predict = self.predict(&into_inference(model), device)?;
        Ok(RunSummary {
            prepare,
            training,
            predict,
        })
    }
}
