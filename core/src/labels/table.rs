use crate::error::{IchError, Result};
use crate::labels::record::{CompoundId, LongRow, RawLabelRecord, IMAGE_PREFIX};
use crate::types::Diagnosis;
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Column holding the `ID_`-prefixed image identifier
pub const IMAGE_COLUMN: &str = "Image";

/// Column holding the template label in the prepared test table
pub const LABEL_COLUMN: &str = "Label";

/// One row of the wide label table
#[derive(Debug, Clone, PartialEq)]
pub struct WideLabelRow {
    /// `ID_`-prefixed image identifier
    pub image: String,

    /// Labels in [`Diagnosis::ALL`] order; `None` for unlabeled (test) rows
    pub labels: Option<[u8; 6]>,
}

impl WideLabelRow {
    /// Label for one diagnosis, if the row is labeled
    pub fn label(&self, diagnosis: Diagnosis) -> Option<u8> {
        self.labels.map(|l| l[diagnosis.index()])
    }
}

/// Wide-format table: one row per image, one column per diagnosis
///
/// Row order is positional and stable; the dataset indexes into it directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
    rows: Vec<WideLabelRow>,
}

impl LabelTable {
    pub fn new(rows: Vec<WideLabelRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WideLabelRow> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[WideLabelRow] {
        &self.rows
    }

    /// Whether every row carries a label vector
    pub fn has_labels(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.labels.is_some())
    }

    /// Pivots long-format records into one row per image
    ///
    /// Exact duplicate triples collapse to one. Rows come out sorted by image
    /// id.
    ///
    /// # Errors
    ///
    /// - [`IchError::ConflictingLabel`] if one (image, diagnosis) pair carries both 0 and 1
    /// - [`IchError::MissingDiagnosis`] if an image lacks any of the six diagnoses
    pub fn pivot<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawLabelRecord>,
    {
        let mut seen: HashSet<RawLabelRecord> = HashSet::new();
        let mut cells: BTreeMap<String, [Option<u8>; 6]> = BTreeMap::new();
        let mut duplicates = 0usize;

        for record in records {
            if seen.contains(&record) {
                duplicates += 1;
                continue;
            }
            let slot = &mut cells.entry(record.image_key()).or_insert([None; 6])
                [record.diagnosis.index()];
            if slot.is_some() {
                return Err(IchError::ConflictingLabel {
                    image: record.image_key(),
                    diagnosis: record.diagnosis.to_string(),
                });
            }
            *slot = Some(record.label);
            seen.insert(record);
        }

        if duplicates > 0 {
            debug!("Dropped {} duplicate label rows", duplicates);
        }

        let mut rows = Vec::with_capacity(cells.len());
        for (image, cell) in cells {
            let mut labels = [0u8; 6];
            for diagnosis in Diagnosis::ALL {
                labels[diagnosis.index()] =
                    cell[diagnosis.index()].ok_or_else(|| IchError::MissingDiagnosis {
                        image: image.clone(),
                        diagnosis: diagnosis.to_string(),
                    })?;
            }
            rows.push(WideLabelRow {
                image,
                labels: Some(labels),
            });
        }

        Ok(Self { rows })
    }

    /// Keeps only rows whose image id is in `available`
    ///
    /// Returns the number of rows dropped.
    pub fn retain_available(&mut self, available: &HashSet<String>) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| available.contains(&r.image));
        before - self.rows.len()
    }

    /// Reads a long-format training CSV and pivots it
    pub fn from_long_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<LongRow>() {
            records.push(RawLabelRecord::from_row(&row?)?);
        }
        info!(
            "Read {} long-format label rows from {}",
            records.len(),
            path.display()
        );
        Self::pivot(records)
    }

    /// Reads a submission template into an unlabeled image list
    ///
    /// Keeps first-seen order and drops repeated images.
    pub fn from_template_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for row in reader.deserialize::<LongRow>() {
            let id = CompoundId::parse(&row?.id)?;
            let image = id.image_key();
            if seen.insert(image.clone()) {
                rows.push(WideLabelRow {
                    image,
                    labels: None,
                });
            }
        }
        Ok(Self { rows })
    }

    /// Writes the table as CSV
    ///
    /// With `with_labels` the header is `Image` plus one column per diagnosis,
    /// even when the table is empty, and unlabeled rows are rejected. Without
    /// it the table is written as `Image,Label` with the template placeholder
    /// 0.5.
    pub fn write_csv(&self, path: &Path, with_labels: bool) -> Result<()> {
        if with_labels {
            if let Some(row) = self.rows.iter().find(|r| r.labels.is_none()) {
                return Err(IchError::PipelineError(format!(
                    "{} has no labels to write",
                    row.image
                )));
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        if with_labels {
            let mut header = vec![IMAGE_COLUMN.to_string()];
            header.extend(Diagnosis::ALL.iter().map(|d| d.simple_name().to_string()));
            writer.write_record(&header)?;
            for row in &self.rows {
                let labels = row.labels.unwrap_or_default();
                let mut record = vec![row.image.clone()];
                record.extend(labels.iter().map(|l| l.to_string()));
                writer.write_record(&record)?;
            }
        } else {
            writer.write_record([IMAGE_COLUMN, LABEL_COLUMN])?;
            for row in &self.rows {
                writer.write_record([row.image.as_str(), "0.5"])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a wide table previously written by [`LabelTable::write_csv`]
    ///
    /// Diagnosis columns are located by header name, so column order does
    /// not matter. With `with_labels` false only `Image` is read.
    ///
    /// # Errors
    ///
    /// Fails if a required column is absent or a label cell is empty
    /// ([`IchError::MissingDiagnosis`]) or not an integer.
    pub fn read_csv(path: &Path, with_labels: bool) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| -> Result<usize> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                IchError::CsvError(format!("{}: missing column '{}'", path.display(), name))
            })
        };

        let image_col = position(IMAGE_COLUMN)?;
        let label_cols = if with_labels {
            let mut cols = [0usize; 6];
            for diagnosis in Diagnosis::ALL {
                cols[diagnosis.index()] = position(diagnosis.simple_name())?;
            }
            Some(cols)
        } else {
            None
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let image = record.get(image_col).unwrap_or_default().to_string();
            let labels = match label_cols {
                Some(cols) => {
                    let mut labels = [0u8; 6];
                    for diagnosis in Diagnosis::ALL {
                        let cell = record.get(cols[diagnosis.index()]).unwrap_or_default().trim();
                        labels[diagnosis.index()] = parse_cell(cell, &image, diagnosis)?;
                    }
                    Some(labels)
                }
                None => None,
            };
            rows.push(WideLabelRow { image, labels });
        }
        Ok(Self { rows })
    }
}

fn parse_cell(cell: &str, image: &str, diagnosis: Diagnosis) -> Result<u8> {
    if cell.is_empty() {
        return Err(IchError::MissingDiagnosis {
            image: image.to_string(),
            diagnosis: diagnosis.to_string(),
        });
    }
    // Tolerate float-formatted integers such as "1.0"
    let value: f64 = cell.parse().map_err(|_| {
        IchError::InvalidValue(format!("{} {}: '{}' is not a label", image, diagnosis, cell))
    })?;
    match value {
        v if v == 0.0 => Ok(0),
        v if v == 1.0 => Ok(1),
        _ => Err(IchError::InvalidValue(format!(
            "{} {}: label must be 0 or 1, found {}",
            image, diagnosis, cell
        ))),
    }
}

/// Strips the `ID_` prefix from an image key, if present
pub fn bare_image_id(image: &str) -> &str {
    image.strip_prefix(IMAGE_PREFIX).unwrap_or(image)
}
