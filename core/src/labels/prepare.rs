use crate::error::Result;
use crate::labels::cache::{fingerprint, is_fresh, write_fingerprint};
use crate::labels::table::LabelTable;
use crate::types::{CachePolicy, ImageFormat};
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

/// What a preparation step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Existing cache reused
    Cached,

    /// Table derived and written
    Built { rows: usize, dropped: usize },
}

/// Collects the stems of image files with the format's extension
///
/// The extension must match exactly, since the dataset opens
/// `<id>.<extension>` and nothing else. The returned ids are the file names
/// without extension, e.g. `ID_63eb1e259` for `ID_63eb1e259.png`.
pub fn list_image_ids(directory: &Path, format: ImageFormat) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|ext| ext == format.extension())
            .unwrap_or(false);
        if matches {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
    }

    Ok(ids)
}

/// Builds the wide training label cache
///
/// Skips all work if the cache is fresh under `policy`. Otherwise splits and
/// pivots the long CSV, drops images without a backing file in
/// `image_dir`, and writes the table to `cache`.
pub fn prepare_train_labels(
    source_csv: &Path,
    image_dir: &Path,
    format: ImageFormat,
    cache: &Path,
    policy: CachePolicy,
) -> Result<PrepareOutcome> {
    let mut listing: Option<Vec<String>> = None;
    let fresh = is_fresh(cache, policy, || {
        let ids = list_image_ids(image_dir, format)?;
        let digest = fingerprint(source_csv, &ids);
        listing = Some(ids);
        digest
    })?;
    if fresh {
        info!("Reusing label cache {}", cache.display());
        return Ok(PrepareOutcome::Cached);
    }

    let mut table = LabelTable::from_long_csv(source_csv)?;
    let ids = match listing {
        Some(ids) => ids,
        None => list_image_ids(image_dir, format)?,
    };
    info!("Found {} images in {}", ids.len(), image_dir.display());

    let available: HashSet<String> = ids.iter().cloned().collect();
    let dropped = table.retain_available(&available);
    if dropped > 0 {
        warn!(
            "Dropped {} labeled images without a file in {}",
            dropped,
            image_dir.display()
        );
    }

    table.write_csv(cache, true)?;
    if policy == CachePolicy::Fingerprint {
        write_fingerprint(cache, fingerprint(source_csv, &ids)?)?;
    }
    info!("Wrote {} label rows to {}", table.len(), cache.display());

    Ok(PrepareOutcome::Built {
        rows: table.len(),
        dropped,
    })
}

/// Builds the unlabeled test image list from the submission template
///
/// No pivot and no file filtering: every template image is kept.
pub fn prepare_test_table(
    template_csv: &Path,
    cache: &Path,
    policy: CachePolicy,
) -> Result<PrepareOutcome> {
    if is_fresh(cache, policy, || fingerprint(template_csv, &[]))? {
        info!("Reusing test table {}", cache.display());
        return Ok(PrepareOutcome::Cached);
    }

    let table = LabelTable::from_template_csv(template_csv)?;
    table.write_csv(cache, false)?;
    if policy == CachePolicy::Fingerprint {
        write_fingerprint(cache, fingerprint(template_csv, &[])?)?;
    }
    info!("Wrote {} test rows to {}", table.len(), cache.display());

    Ok(PrepareOutcome::Built {
        rows: table.len(),
        dropped: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Diagnosis;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn long_csv(images: &[&str]) -> String {
        let mut out = String::from("ID,Label\n");
        for image in images {
            for d in Diagnosis::ALL {
                let label = (d == Diagnosis::Any && *image == "2") as u8;
                out.push_str(&format!("ID_{}_{},{}\n", image, d, label));
            }
        }
        out
    }

    #[test]
    fn test_list_image_ids() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("ID_1.png")).unwrap();
        File::create(dir.path().join("ID_2.PNG")).unwrap();
        File::create(dir.path().join("ID_3.dcm")).unwrap();
        fs::create_dir(dir.path().join("ID_4.png")).unwrap();

        let ids = list_image_ids(dir.path(), ImageFormat::Png).unwrap();
        assert_eq!(ids, vec!["ID_1"]);

        let ids = list_image_ids(dir.path(), ImageFormat::Dicom).unwrap();
        assert_eq!(ids, vec!["ID_3"]);
    }

    #[test]
    fn test_prepare_filters_missing_images_and_caches() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stage_1_train.csv");
        let images = dir.path().join("pngs");
        let cache = dir.path().join("train.csv");
        fs::create_dir(&images).unwrap();
        fs::write(&source, long_csv(&["1", "2", "3"])).unwrap();
        File::create(images.join("ID_1.png")).unwrap();
        File::create(images.join("ID_2.png")).unwrap();

        let outcome =
            prepare_train_labels(&source, &images, ImageFormat::Png, &cache, CachePolicy::Exists)
                .unwrap();
        assert_eq!(outcome, PrepareOutcome::Built { rows: 2, dropped: 1 });

        let table = LabelTable::read_csv(&cache, true).unwrap();
        let ids: Vec<&str> = table.rows().iter().map(|r| r.image.as_str()).collect();
        assert_eq!(ids, vec!["ID_1", "ID_2"]);
        assert_eq!(table.get(1).unwrap().label(Diagnosis::Any), Some(1));

        // Second run is an existence-only cache hit even though the source changed
        fs::write(&source, long_csv(&["1"])).unwrap();
        let outcome =
            prepare_train_labels(&source, &images, ImageFormat::Png, &cache, CachePolicy::Exists)
                .unwrap();
        assert_eq!(outcome, PrepareOutcome::Cached);
    }

    #[test]
    fn test_prepare_drops_rows_the_dataset_cannot_open() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stage_1_train.csv");
        let images = dir.path().join("pngs");
        let cache = dir.path().join("train.csv");
        fs::create_dir(&images).unwrap();
        fs::write(&source, long_csv(&["1", "2"])).unwrap();
        File::create(images.join("ID_1.png")).unwrap();
        File::create(images.join("ID_2.PNG")).unwrap();

        let outcome =
            prepare_train_labels(&source, &images, ImageFormat::Png, &cache, CachePolicy::Exists)
                .unwrap();
        assert_eq!(outcome, PrepareOutcome::Built { rows: 1, dropped: 1 });

        let table = LabelTable::read_csv(&cache, true).unwrap();
        assert_eq!(table.get(0).unwrap().image, "ID_1");
    }

    #[test]
    fn test_prepare_without_images_writes_labeled_header() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stage_1_train.csv");
        let images = dir.path().join("pngs");
        let cache = dir.path().join("train.csv");
        fs::create_dir(&images).unwrap();
        fs::write(&source, long_csv(&["1", "2"])).unwrap();

        let outcome =
            prepare_train_labels(&source, &images, ImageFormat::Png, &cache, CachePolicy::Exists)
                .unwrap();
        assert_eq!(outcome, PrepareOutcome::Built { rows: 0, dropped: 2 });

        let table = LabelTable::read_csv(&cache, true).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_prepare_fingerprint_detects_new_image() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("stage_1_train.csv");
        let images = dir.path().join("pngs");
        let cache = dir.path().join("train.csv");
        fs::create_dir(&images).unwrap();
        fs::write(&source, long_csv(&["1", "2"])).unwrap();
        File::create(images.join("ID_1.png")).unwrap();

        let policy = CachePolicy::Fingerprint;
        let first = prepare_train_labels(&source, &images, ImageFormat::Png, &cache, policy);
        assert_eq!(first.unwrap(), PrepareOutcome::Built { rows: 1, dropped: 1 });

        let again = prepare_train_labels(&source, &images, ImageFormat::Png, &cache, policy);
        assert_eq!(again.unwrap(), PrepareOutcome::Cached);

        File::create(images.join("ID_2.png")).unwrap();
        let rebuilt = prepare_train_labels(&source, &images, ImageFormat::Png, &cache, policy);
        assert_eq!(rebuilt.unwrap(), PrepareOutcome::Built { rows: 2, dropped: 0 });
    }

    #[test]
    fn test_prepare_test_table() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("stage_1_sample_submission.csv");
        let cache = dir.path().join("test.csv");
        fs::write(
            &template,
            "ID,Label\nID_9_epidural,0.5\nID_9_any,0.5\nID_8_epidural,0.5\n",
        )
        .unwrap();

        let outcome = prepare_test_table(&template, &cache, CachePolicy::Exists).unwrap();
        assert_eq!(outcome, PrepareOutcome::Built { rows: 2, dropped: 0 });
        assert_eq!(
            prepare_test_table(&template, &cache, CachePolicy::Exists).unwrap(),
            PrepareOutcome::Cached
        );
    }
}
