use crate::error::{IchError, Result};
use crate::labels::{CompoundId, LongRow};
use crate::training::predict::Prediction;
use crate::types::Diagnosis;
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Fills the submission template with predicted probabilities
///
/// Every template row `ID_<image>_<diagnosis>` is looked up by image and
/// diagnosis, so template order and prediction order are independent. The
/// output keeps template order and ids.
///
/// # Errors
///
/// Fails on a malformed template id, an unknown diagnosis, or an image with
/// no prediction.
pub fn write_submission(template: &Path, predictions: &[Prediction], out: &Path) -> Result<usize> {
    let by_image: HashMap<&str, &Prediction> = predictions
        .iter()
        .map(|p| (p.image_id.as_str(), p))
        .collect();

    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut reader = csv::Reader::from_path(template)?;
    let mut writer = csv::Writer::from_path(out)?;
    writer.write_record(["ID", "Label"])?;

    let mut rows = 0;
    for row in reader.deserialize::<LongRow>() {
        let row = row?;
        let id = CompoundId::parse(&row.id)?;
        let diagnosis = Diagnosis::parse(&id.diagnosis)?;
        let image = id.image_key();
        let prediction = by_image
            .get(image.as_str())
            .ok_or_else(|| IchError::PipelineError(format!("No prediction for image {}", image)))?;

        let label = prediction.probability(diagnosis).to_string();
        writer.write_record([row.id.as_str(), label.as_str()])?;
        rows += 1;
    }
    writer.flush()?;

    info!("Wrote {} submission rows to {}", rows, out.display());
    Ok(rows)
}
