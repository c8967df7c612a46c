use crate::error::{IchError, Result};
use crate::types::Diagnosis;
use serde::Deserialize;
use std::fmt;

/// Prefix re-attached to bare image ids in every derived table
pub const IMAGE_PREFIX: &str = "ID_";

/// Row of a long-format label or submission CSV
#[derive(Debug, Clone, Deserialize)]
pub struct LongRow {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Label")]
    pub label: f64,
}

/// Parsed `<prefix>_<imageId>_<diagnosis>` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundId {
    pub prefix: String,
    pub image_id: String,
    pub diagnosis: String,
}

impl CompoundId {
    /// Splits a compound id on `_`
    ///
    /// # Errors
    ///
    /// Returns [`IchError::MalformedId`] unless the split yields exactly 3 parts
    ///
    /// # Example
    ///
    /// ```
    /// use ich_core::labels::CompoundId;
    ///
    /// let id = CompoundId::parse("ID_63eb1e259_epidural").unwrap();
    /// assert_eq!(id.image_id, "63eb1e259");
    /// assert_eq!(id.image_key(), "ID_63eb1e259");
    ///
    /// assert!(CompoundId::parse("ID_63eb1e259").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('_').collect();
        match parts.as_slice() {
            [prefix, image_id, diagnosis] => Ok(Self {
                prefix: prefix.to_string(),
                image_id: image_id.to_string(),
                diagnosis: diagnosis.to_string(),
            }),
            _ => Err(IchError::MalformedId {
                id: s.to_string(),
                parts: parts.len(),
            }),
        }
    }

    /// Image identifier with the `ID_` prefix re-attached
    pub fn image_key(&self) -> String {
        format!("{}{}", IMAGE_PREFIX, self.image_id)
    }
}

impl fmt::Display for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.prefix, self.image_id, self.diagnosis)
    }
}

/// One (image, diagnosis, label) triple from the long-format training CSV
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawLabelRecord {
    /// Bare image id, without prefix
    pub image_id: String,
    pub diagnosis: Diagnosis,
    pub label: u8,
}

impl RawLabelRecord {
    /// Parses a long-format row
    ///
    /// # Errors
    ///
    /// Fails on a malformed id, a diagnosis outside the vocabulary, or a
    /// label other than 0/1.
    pub fn from_row(row: &LongRow) -> Result<Self> {
        let id = CompoundId::parse(&row.id)?;
        let diagnosis = Diagnosis::parse(&id.diagnosis)?;
        let label = if row.label == 0.0 {
            0
        } else if row.label == 1.0 {
            1
        } else {
            return Err(IchError::InvalidValue(format!(
                "Label for {} must be 0 or 1, found {}",
                row.id, row.label
            )));
        };
        Ok(Self {
            image_id: id.image_id,
            diagnosis,
            label,
        })
    }

    /// Image identifier with the `ID_` prefix re-attached
    pub fn image_key(&self) -> String {
        format!("{}{}", IMAGE_PREFIX, self.image_id)
    }
}
