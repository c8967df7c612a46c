use crate::dataset::{BatchLoader, ImageBatcher, IntracranialDataset};
use crate::error::{IchError, Result};
use crate::model::Classifier;
use crate::training::progress_bar;
use crate::types::{Diagnosis, HeadVariant, PipelineConfig};
use burn::prelude::*;
use log::info;

/// Probabilities for one image in [`Diagnosis::ALL`] order
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub image_id: String,
    pub probabilities: [f32; 6],
}

impl Prediction {
    pub fn probability(&self, diagnosis: Diagnosis) -> f32 {
        self.probabilities[diagnosis.index()]
    }
}

/// Hard `any` label for a row of subtype probabilities
///
/// 1.0 if at least one subtype reaches `threshold`, else 0.0. Applied per
/// image, never across the batch.
///
/// # Example
///
/// ```
/// use ich_core::training::derive_any;
///
/// assert_eq!(derive_any(&[0.1, 0.85, 0.0, 0.2, 0.3], 0.8), 1.0);
/// assert_eq!(derive_any(&[0.1, 0.79, 0.0, 0.2, 0.3], 0.8), 0.0);
/// ```
pub fn derive_any(subtypes: &[f32], threshold: f32) -> f32 {
    if subtypes.iter().any(|&p| p >= threshold) {
        1.0
    } else {
        0.0
    }
}

/// Expands one model output row to all six diagnoses
pub fn expand_row(row: &[f32], variant: HeadVariant, threshold: f32) -> Result<[f32; 6]> {
    if row.len() != variant.class_count() {
        return Err(IchError::ModelError(format!(
            "{} head produced {} outputs",
            variant,
            row.len()
        )));
    }
    let mut out = [0.0f32; 6];
    out[..row.len()].copy_from_slice(row);
    if variant == HeadVariant::Shared {
        out[Diagnosis::Any.index()] = derive_any(row, threshold);
    }
    Ok(out)
}

/// Scores every image of an unlabeled dataset in table order
///
/// Stops after `max_inference_batches` batches when set, leaving later
/// images without a prediction.
pub fn predict<B: Backend>(
    config: &PipelineConfig,
    model: &Classifier<B>,
    dataset: &IntracranialDataset,
    device: &B::Device,
) -> Result<Vec<Prediction>> {
    let variant = model.head_variant();
    let loader = BatchLoader::new(dataset, config.batch_size, config.num_workers)?
        .with_seed(config.seed);
    let planned = config
        .max_inference_batches
        .map_or(loader.num_batches(), |m| m.min(loader.num_batches()));
    let batcher = ImageBatcher::<B>::new(device.clone());

    info!(
        "Predicting {} images with the {} head ({} batches)",
        dataset.len(),
        variant,
        planned
    );
    let pb = progress_bar(planned, "predict".to_string());
    let mut predictions = Vec::with_capacity(dataset.len());

    for records in loader.batches().take(planned) {
        let batch = batcher.batch(records?)?;
        let probs = model
            .probabilities(batch.images)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| IchError::ModelError(format!("Unreadable model output: {:?}", e)))?;

        for (image_id, row) in batch.ids.into_iter().zip(probs.chunks(variant.class_count())) {
            predictions.push(Prediction {
                image_id,
                probabilities: expand_row(row, variant, config.threshold)?,
            });
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if predictions.len() < dataset.len() {
        info!(
            "Scored {} of {} images (batch cap)",
            predictions.len(),
            dataset.len()
        );
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::intracranial::testing::{table, write_png};
    use crate::model::ClassifierConfig;
    use burn::backend::NdArray;
    use rstest::rstest;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[rstest]
    #[case(&[0.1, 0.2, 0.8, 0.0, 0.0], 1.0)]
    #[case(&[0.1, 0.2, 0.3, 0.0, 0.79], 0.0)]
    #[case(&[0.0; 5], 0.0)]
    fn test_derive_any(#[case] row: &[f32], #[case] expected: f32) {
        assert_eq!(derive_any(row, 0.8), expected);
    }

    #[test]
    fn test_expand_shared_row() {
        let out = expand_row(&[0.9, 0.1, 0.1, 0.1, 0.1], HeadVariant::Shared, 0.8).unwrap();
        assert_eq!(out, [0.9, 0.1, 0.1, 0.1, 0.1, 1.0]);
    }

    #[test]
    fn test_expand_separate_row_keeps_any() {
        let out = expand_row(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.42], HeadVariant::Separate, 0.8).unwrap();
        assert_eq!(out[5], 0.42);
    }

    #[test]
    fn test_expand_wrong_width() {
        assert!(expand_row(&[0.1; 6], HeadVariant::Shared, 0.8).is_err());
    }

    fn dataset(dir: &TempDir, n: usize) -> IntracranialDataset {
        let ids: Vec<String> = (0..n).map(|i| format!("ID_{}", i)).collect();
        for id in &ids {
            write_png(dir.path(), id, 8, 100);
        }
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        IntracranialDataset::new(table(&refs), dir.path(), false)
    }

    #[rstest]
    #[case(HeadVariant::Shared)]
    #[case(HeadVariant::Separate)]
    fn test_predict_covers_dataset_in_order(#[case] variant: HeadVariant) {
        let dir = TempDir::new().unwrap();
        let dataset = dataset(&dir, 5);
        let device = Default::default();
        let model = ClassifierConfig::new(variant)
            .with_base_channels(4)
            .with_blocks(2)
            .init::<TestBackend>(&device);
        let config = PipelineConfig::default().with_batch_size(2);

        let predictions = predict(&config, &model, &dataset, &device).unwrap();
        let ids: Vec<&str> = predictions.iter().map(|p| p.image_id.as_str()).collect();
        assert_eq!(ids, vec!["ID_0", "ID_1", "ID_2", "ID_3", "ID_4"]);
        for p in &predictions {
            assert!(p.probabilities.iter().all(|v| (0.0..=1.0).contains(v)));
            if variant == HeadVariant::Shared {
                let any = p.probability(Diagnosis::Any);
                assert!(any == 0.0 || any == 1.0);
            }
        }
    }

    #[test]
    fn test_inference_batch_cap() {
        let dir = TempDir::new().unwrap();
        let dataset = dataset(&dir, 5);
        let device = Default::default();
        let model = ClassifierConfig::new(HeadVariant::Separate)
            .with_base_channels(4)
            .with_blocks(2)
            .init::<TestBackend>(&device);
        let mut config = PipelineConfig::default().with_batch_size(2);
        config.max_inference_batches = Some(1);

        assert_eq!(predict(&config, &model, &dataset, &device).unwrap().len(), 2);
    }
}
