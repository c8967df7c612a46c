use crate::dicom::CtSlice;
use crate::error::{IchError, Result};
use crate::imaging::Transform;
use crate::labels::LabelTable;
use crate::types::{Diagnosis, ImageFormat, WindowSetting};
use image::RgbImage;
use log::{debug, warn};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One decoded sample
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Image id of the table row that was asked for
    pub requested_id: String,

    /// Image id actually loaded; differs from `requested_id` after a fallback
    pub image_id: String,

    pub path: PathBuf,

    /// Decoded and transformed pixels
    pub image: RgbImage,

    /// Labels in the dataset's diagnosis order, when labels are enabled
    pub labels: Option<Vec<f32>>,
}

impl ImageRecord {
    /// Whether this sample stands in for a missing neighbour
    pub fn is_substitute(&self) -> bool {
        self.requested_id != self.image_id
    }
}

/// Labeled (or unlabeled) CT slice dataset backed by a wide label table
///
/// The table is loaded once and never mutated; every [`get`](Self::get)
/// re-reads the image from disk.
///
/// A request for a row whose file is missing falls forward to the next row
/// with a file, up to the end of the table, and fails with
/// [`IchError::DatasetExhausted`] if none remain.
pub struct IntracranialDataset {
    table: LabelTable,
    image_dir: PathBuf,
    format: ImageFormat,
    window: WindowSetting,
    input_size: u32,
    diagnoses: Option<&'static [Diagnosis]>,
    transform: Option<Arc<dyn Transform>>,
}

impl IntracranialDataset {
    /// Loads a wide label CSV and binds it to an image directory
    ///
    /// With `with_labels` the label vector holds all six diagnoses; narrow
    /// it with [`with_diagnoses`](Self::with_diagnoses).
    pub fn from_csv(csv_file: &Path, image_dir: impl Into<PathBuf>, with_labels: bool) -> Result<Self> {
        let table = LabelTable::read_csv(csv_file, with_labels)?;
        debug!("Loaded {} rows from {}", table.len(), csv_file.display());
        Ok(Self::new(table, image_dir, with_labels))
    }

    /// Wraps an in-memory table
    pub fn new(table: LabelTable, image_dir: impl Into<PathBuf>, with_labels: bool) -> Self {
        Self {
            table,
            image_dir: image_dir.into(),
            format: ImageFormat::Png,
            window: WindowSetting::default(),
            input_size: 224,
            diagnoses: with_labels.then_some(&Diagnosis::ALL[..]),
            transform: None,
        }
    }

    /// Builder: Restrict the label vector to the given diagnoses, in order
    ///
    /// Has no effect on an unlabeled dataset.
    pub fn with_diagnoses(mut self, diagnoses: &'static [Diagnosis]) -> Self {
        if self.diagnoses.is_some() {
            self.diagnoses = Some(diagnoses);
        }
        self
    }

    /// Builder: Read DICOM slices, windowed and resized, instead of PNGs
    pub fn with_dicom(mut self, window: WindowSetting, input_size: u32) -> Self {
        self.format = ImageFormat::Dicom;
        self.window = window;
        self.input_size = input_size;
        self
    }

    /// Builder: Apply a transform to every decoded image
    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Length of the label vector, or 0 when labels are disabled
    pub fn class_count(&self) -> usize {
        self.diagnoses.map(|d| d.len()).unwrap_or(0)
    }

    pub fn has_labels(&self) -> bool {
        self.diagnoses.is_some()
    }

    pub fn table(&self) -> &LabelTable {
        &self.table
    }

    /// Path an image id resolves to
    pub fn image_path(&self, image_id: &str) -> PathBuf {
        self.image_dir
            .join(format!("{}.{}", image_id, self.format.extension()))
    }

    /// Fetches a sample using the thread-local generator for augmentation
    pub fn get(&self, index: usize) -> Result<ImageRecord> {
        self.get_with_rng(index, &mut rand::thread_rng())
    }

    /// Fetches a sample using the given generator for augmentation
    ///
    /// # Errors
    ///
    /// - [`IchError::IndexOutOfBounds`] if `index >= len()`
    /// - [`IchError::DatasetExhausted`] if no file exists at or after `index`
    /// - decode errors for the located file
    pub fn get_with_rng(&self, index: usize, rng: &mut dyn RngCore) -> Result<ImageRecord> {
        let len = self.len();
        let requested = self
            .table
            .get(index)
            .ok_or(IchError::IndexOutOfBounds { index, len })?;

        let (resolved, path) = self.resolve(index)?;
        let row = self
            .table
            .get(resolved)
            .ok_or(IchError::IndexOutOfBounds { index: resolved, len })?;

        let mut image = self.decode(&path)?;
        if let Some(transform) = &self.transform {
            image = transform.apply(image, rng);
        }

        let labels = match self.diagnoses {
            Some(diagnoses) => {
                let mut labels = Vec::with_capacity(diagnoses.len());
                for &diagnosis in diagnoses {
                    let value = row.label(diagnosis).ok_or_else(|| IchError::MissingDiagnosis {
                        image: row.image.clone(),
                        diagnosis: diagnosis.to_string(),
                    })?;
                    labels.push(value as f32);
                }
                Some(labels)
            }
            None => None,
        };

        Ok(ImageRecord {
            requested_id: requested.image.clone(),
            image_id: row.image.clone(),
            path,
            image,
            labels,
        })
    }

    /// Finds the first row at or after `index` whose file exists
    fn resolve(&self, index: usize) -> Result<(usize, PathBuf)> {
        for candidate in index..self.len() {
            let Some(row) = self.table.get(candidate) else {
                break;
            };
            let path = self.image_path(&row.image);
            if path.is_file() {
                return Ok((candidate, path));
            }
            warn!(
                "Missing image {} for row {}; trying next row",
                path.display(),
                candidate
            );
        }
        Err(IchError::DatasetExhausted {
            requested: index,
            len: self.len(),
        })
    }

    fn decode(&self, path: &Path) -> Result<RgbImage> {
        match self.format {
            ImageFormat::Png => Ok(image::open(path)?.to_rgb8()),
            ImageFormat::Dicom => CtSlice::from_file(path)?.to_rgb(self.window, self.input_size),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{table, write_png};
    use super::*;
    use crate::dicom::slice::testing::write_ct_file;
    use crate::imaging::CenterCrop;
    use crate::types::HeadVariant;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_get_returns_labels_in_order() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "ID_1", 4, 10);
        write_png(dir.path(), "ID_2", 4, 20);
        let dataset = IntracranialDataset::new(table(&["ID_1", "ID_2"]), dir.path(), true);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.class_count(), 6);

        let sample = dataset.get(1).unwrap();
        assert_eq!(sample.image_id, "ID_2");
        assert!(!sample.is_substitute());
        assert_eq!(sample.image.get_pixel(0, 0).0, [20, 20, 20]);
        // Row 1 has the intraparenchymal column set
        assert_eq!(sample.labels.unwrap(), vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_shared_head_truncates_to_subtypes() {
        let dir = TempDir::new().unwrap();
        for id in ["ID_a", "ID_b", "ID_c", "ID_d", "ID_e", "ID_f"] {
            write_png(dir.path(), id, 2, 0);
        }
        let dataset = IntracranialDataset::new(
            table(&["ID_a", "ID_b", "ID_c", "ID_d", "ID_e", "ID_f"]),
            dir.path(),
            true,
        )
        .with_diagnoses(HeadVariant::Shared.diagnoses());

        assert_eq!(dataset.class_count(), 5);
        // Row 5 only has `any` set, which the subtype vector leaves out
        assert_eq!(dataset.get(5).unwrap().labels.unwrap(), vec![0.0; 5]);
        assert_eq!(
            dataset.get(4).unwrap().labels.unwrap(),
            vec![0.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_unlabeled_dataset() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "ID_1", 2, 0);
        let dataset = IntracranialDataset::new(table(&["ID_1"]), dir.path(), false)
            .with_diagnoses(&Diagnosis::ALL);
        assert!(!dataset.has_labels());
        assert!(dataset.get(0).unwrap().labels.is_none());
    }

    #[test]
    fn test_missing_file_falls_forward() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "ID_1", 2, 1);
        write_png(dir.path(), "ID_3", 2, 3);
        let dataset = IntracranialDataset::new(table(&["ID_1", "ID_2", "ID_3"]), dir.path(), true);

        let sample = dataset.get(1).unwrap();
        assert_eq!(sample.requested_id, "ID_2");
        assert_eq!(sample.image_id, "ID_3");
        assert!(sample.is_substitute());
        // Labels follow the image that was actually loaded
        assert_eq!(sample.labels.unwrap(), vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_tail_is_exhausted() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "ID_1", 2, 1);
        let dataset = IntracranialDataset::new(table(&["ID_1", "ID_2", "ID_3"]), dir.path(), true);

        match dataset.get(1) {
            Err(IchError::DatasetExhausted { requested, len }) => {
                assert_eq!(requested, 1);
                assert_eq!(len, 3);
            }
            other => panic!("expected DatasetExhausted, got {:?}", other.map(|r| r.image_id)),
        }
        assert!(matches!(
            dataset.get(2),
            Err(IchError::DatasetExhausted { .. })
        ));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let dir = TempDir::new().unwrap();
        let dataset = IntracranialDataset::new(table(&["ID_1"]), dir.path(), true);
        assert!(matches!(
            dataset.get(1),
            Err(IchError::IndexOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_transform_is_applied() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "ID_1", 10, 5);
        let dataset = IntracranialDataset::new(table(&["ID_1"]), dir.path(), true)
            .with_transform(Arc::new(CenterCrop::new(4, 4)));
        assert_eq!(dataset.get(0).unwrap().image.dimensions(), (4, 4));
    }

    #[test]
    fn test_corrupt_png_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ID_1.png"), b"not a png").unwrap();
        let dataset = IntracranialDataset::new(table(&["ID_1"]), dir.path(), true);
        assert!(matches!(dataset.get(0), Err(IchError::ImageError(_))));
    }

    #[test]
    fn test_dicom_source_is_windowed() {
        let dir = TempDir::new().unwrap();
        // Stored 1064 with intercept -1024 is 40 HU, the window center
        write_ct_file(&dir.path().join("ID_1.dcm"), 2, 2, &[1064; 4]);
        let dataset = IntracranialDataset::new(table(&["ID_1"]), dir.path(), true)
            .with_dicom(WindowSetting::default(), 6);

        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.image.dimensions(), (6, 6));
        assert!(sample.image.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn test_from_csv() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("train.csv");
        fs::write(
            &csv,
            "Image,epidural,intraparenchymal,intraventricular,subarachnoid,subdural,any\n\
             ID_1,1,0,0,0,0,1\n",
        )
        .unwrap();
        write_png(dir.path(), "ID_1", 2, 0);

        let dataset = IntracranialDataset::from_csv(&csv, dir.path(), true).unwrap();
        assert_eq!(
            dataset.get(0).unwrap().labels.unwrap(),
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
        );
    }
}
