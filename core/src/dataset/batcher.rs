use crate::dataset::intracranial::ImageRecord;
use crate::error::{IchError, Result};
use burn::prelude::*;
use burn::tensor::TensorData;

/// Stacked tensors for one batch
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// `[batch, 3, height, width]`, scaled to `[0, 1]`
    pub images: Tensor<B, 4>,

    /// `[batch, classes]` binary targets, absent for unlabeled data
    pub labels: Option<Tensor<B, 2, Int>>,

    /// Requested image id per row, in batch order
    pub ids: Vec<String>,
}

/// Turns decoded samples into tensors on a device
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stacks samples in order
    ///
    /// # Errors
    ///
    /// Fails on an empty batch, mismatched image sizes, or a mix of labeled
    /// and unlabeled samples.
    pub fn batch(&self, items: Vec<ImageRecord>) -> Result<ImageBatch<B>> {
        let first = items
            .first()
            .ok_or_else(|| IchError::PipelineError("Cannot batch zero samples".into()))?;
        let (width, height) = first.image.dimensions();
        let class_count = first.labels.as_ref().map(Vec::len);
        let n = items.len();
        let plane = (width * height) as usize;

        let mut pixels = Vec::with_capacity(n * 3 * plane);
        let mut targets = Vec::with_capacity(n * class_count.unwrap_or(0));
        let mut ids = Vec::with_capacity(n);

        for item in items {
            if item.image.dimensions() != (width, height) {
                return Err(IchError::ImageError(format!(
                    "Image {} is {:?}, expected {:?}",
                    item.image_id,
                    item.image.dimensions(),
                    (width, height)
                )));
            }
            // HWC interleaved to CHW planar
            let raw = item.image.as_raw();
            for c in 0..3 {
                pixels.extend(raw.iter().skip(c).step_by(3).map(|&v| v as f32 / 255.0));
            }

            match (&item.labels, class_count) {
                (Some(labels), Some(count)) if labels.len() == count => {
                    targets.extend(labels.iter().map(|&l| l as i64));
                }
                (None, None) => {}
                _ => {
                    return Err(IchError::PipelineError(format!(
                        "Inconsistent labels for image {}",
                        item.image_id
                    )))
                }
            }
            ids.push(item.requested_id);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [n, 3, height as usize, width as usize]),
            &self.device,
        );
        let labels = class_count.map(|count| {
            Tensor::<B, 2, Int>::from_data(TensorData::new(targets, [n, count]), &self.device)
        });

        Ok(ImageBatch {
            images,
            labels,
            ids,
        })
    }
}
