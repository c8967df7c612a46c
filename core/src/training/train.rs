use crate::dataset::{BatchLoader, ImageBatcher, IntracranialDataset};
use crate::error::{IchError, Result};
use crate::model::{Classifier, ClassifierConfig};
use crate::training::progress_bar;
use crate::types::{HeadVariant, PipelineConfig};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use log::{debug, info};
use std::path::PathBuf;

/// File next to the weights describing the architecture
pub const CLASSIFIER_CONFIG_FILE: &str = "classifier.json";

/// Outcome of a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub head_variant: HeadVariant,

    /// Mean batch loss per epoch
    pub epoch_losses: Vec<f64>,

    /// Optimizer steps over all epochs
    pub steps: usize,

    pub checkpoints: Vec<PathBuf>,
    pub model_path: PathBuf,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// Trains a fresh classifier on a labeled dataset
///
/// Each epoch visits the dataset once (or up to `max_steps_per_epoch`
/// batches), shuffled with `seed + epoch` when shuffling is on. Weights are
/// written after every epoch and once more as the final model.
///
/// # Errors
///
/// Fails if the dataset is unlabeled, its label width does not match the
/// head variant, any sample fails to load, or weights cannot be written.
pub fn train<B: AutodiffBackend>(
    config: &PipelineConfig,
    model_config: &ClassifierConfig,
    dataset: &IntracranialDataset,
    device: &B::Device,
) -> Result<(Classifier<B>, TrainingReport)> {
    let variant = model_config.head_variant;
    if !dataset.has_labels() {
        return Err(IchError::PipelineError("Training requires a labeled dataset".into()));
    }
    if dataset.class_count() != variant.class_count() {
        return Err(IchError::PipelineError(format!(
            "{} head expects {} labels, dataset yields {}",
            variant,
            variant.class_count(),
            dataset.class_count()
        )));
    }
    if dataset.is_empty() {
        return Err(IchError::PipelineError("Training dataset is empty".into()));
    }

    std::fs::create_dir_all(&config.output_dir)?;
    model_config
        .save(config.output_dir.join(CLASSIFIER_CONFIG_FILE))
        .map_err(|e| IchError::ModelError(format!("Failed to save model config: {}", e)))?;

    let mut model: Classifier<B> = model_config.init(device);
    let mut optim = AdamConfig::new().init();
    let batcher = ImageBatcher::<B>::new(device.clone());

    let mut report = TrainingReport {
        head_variant: variant,
        epoch_losses: Vec::with_capacity(config.epochs),
        steps: 0,
        checkpoints: Vec::with_capacity(config.epochs),
        model_path: config.model_path(),
    };

    info!(
        "Training {} head on {} images for {} epochs (batch size {})",
        variant,
        dataset.len(),
        config.epochs,
        config.batch_size
    );

    for epoch in 1..=config.epochs {
        let seed = config.seed.wrapping_add(epoch as u64);
        let loader = BatchLoader::new(dataset, config.batch_size, config.num_workers)?;
        let loader = if config.shuffle {
            loader.shuffled(seed)
        } else {
            loader.with_seed(seed)
        };
        let planned = config
            .max_steps_per_epoch
            .map_or(loader.num_batches(), |m| m.min(loader.num_batches()));

        let pb = progress_bar(planned, format!("epoch {}/{}", epoch, config.epochs));
        let mut loss_sum = 0.0;
        let mut steps = 0usize;

        for records in loader.batches().take(planned) {
            let batch = batcher.batch(records?)?;
            let labels = batch
                .labels
                .ok_or_else(|| IchError::PipelineError("Batch has no labels".into()))?;

            let loss = model.forward_loss(batch.images, labels)?;
            let value = loss.clone().into_scalar().elem::<f64>();
            if !value.is_finite() {
                pb.abandon();
                return Err(IchError::ModelError(format!(
                    "Loss diverged at epoch {} step {}",
                    epoch,
                    steps + 1
                )));
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);

            loss_sum += value;
            steps += 1;
            pb.inc(1);
            pb.set_message(format!("loss {:.4}", loss_sum / steps as f64));
        }
        pb.finish_and_clear();

        let mean = loss_sum / steps.max(1) as f64;
        info!(
            "Epoch {}/{}: mean loss {:.5} over {} steps",
            epoch, config.epochs, mean, steps
        );
        report.epoch_losses.push(mean);
        report.steps += steps;

        let checkpoint = config.checkpoint_path(epoch);
        model.save(&checkpoint)?;
        debug!("Saved checkpoint {}", checkpoint.display());
        report.checkpoints.push(checkpoint);
    }

    model.save(&report.model_path)?;
    info!("Saved model to {}", report.model_path.display());

    Ok((model, report))
}

/// Rebuilds a trained classifier for inference
///
/// Reads the architecture written by [`train`] and the final weights.
pub fn load_trained<B: Backend>(config: &PipelineConfig, device: &B::Device) -> Result<Classifier<B>> {
    let path = config.output_dir.join(CLASSIFIER_CONFIG_FILE);
    let model_config = ClassifierConfig::load(&path)
        .map_err(|e| IchError::ModelError(format!("Failed to read {}: {}", path.display(), e)))?;
    if model_config.head_variant != config.head_variant {
        return Err(IchError::ConfigError(format!(
            "Saved model uses the {} head, configuration asks for {}",
            model_config.head_variant, config.head_variant
        )));
    }
    model_config
        .init::<B>(device)
        .load(&config.model_path(), device)
}

/// Inference copy of a trained model on the inner backend
pub fn into_inference<B: AutodiffBackend>(model: Classifier<B>) -> Classifier<B::InnerBackend> {
    model.valid()
}
