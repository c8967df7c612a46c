use crate::error::{IchError, Result};
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::prelude::*;

/// Training loss across one or more output heads
///
/// A single head scores every target column with one binary cross-entropy
/// (mean over batch and classes). Several heads each score their own column
/// and the per-head losses are summed, so each head carries equal weight.
///
/// `head_logits` are raw logits; widths must add up to the label columns.
pub fn aggregate_loss<B: Backend>(
    head_logits: Vec<Tensor<B, 2>>,
    labels: Tensor<B, 2, Int>,
) -> Result<Tensor<B, 1>> {
    let [batch, columns] = labels.dims();
    let width: usize = head_logits.iter().map(|t| t.dims()[1]).sum();
    if width != columns {
        return Err(IchError::ModelError(format!(
            "Heads produce {} outputs but labels have {} columns",
            width, columns
        )));
    }
    if head_logits.len() == 1 {
        let logits = head_logits.into_iter().next().ok_or_else(|| {
            IchError::ModelError("No output heads".into())
        })?;
        return Ok(bce_with_logits(logits, labels));
    }

    let mut offset = 0;
    let mut total: Option<Tensor<B, 1>> = None;
    for logits in head_logits {
        let k = logits.dims()[1];
        let targets = labels.clone().slice([0..batch, offset..offset + k]);
        let loss = bce_with_logits(logits, targets);
        total = Some(match total {
            Some(sum) => sum + loss,
            None => loss,
        });
        offset += k;
    }
    total.ok_or_else(|| IchError::ModelError("No output heads".into()))
}

fn bce_with_logits<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let device = logits.device();
    BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&device)
        .forward(logits, targets)
}
