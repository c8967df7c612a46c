use crate::error::{IchError, Result};
use std::fmt;

/// Hemorrhage diagnosis vocabulary
///
/// Declaration order is the label-vector order used everywhere:
/// epidural, intraparenchymal, intraventricular, subarachnoid, subdural, any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnosis {
    Epidural,
    Intraparenchymal,
    Intraventricular,
    Subarachnoid,
    Subdural,
    Any,
}

impl Diagnosis {
    /// All six diagnoses in label-vector order
    pub const ALL: [Diagnosis; 6] = [
        Diagnosis::Epidural,
        Diagnosis::Intraparenchymal,
        Diagnosis::Intraventricular,
        Diagnosis::Subarachnoid,
        Diagnosis::Subdural,
        Diagnosis::Any,
    ];

    /// The five hemorrhage subtypes (everything except `Any`)
    pub const SUBTYPES: [Diagnosis; 5] = [
        Diagnosis::Epidural,
        Diagnosis::Intraparenchymal,
        Diagnosis::Intraventricular,
        Diagnosis::Subarachnoid,
        Diagnosis::Subdural,
    ];

    /// Returns the column name used in label CSVs
    pub fn simple_name(&self) -> &'static str {
        match self {
            Diagnosis::Epidural => "epidural",
            Diagnosis::Intraparenchymal => "intraparenchymal",
            Diagnosis::Intraventricular => "intraventricular",
            Diagnosis::Subarachnoid => "subarachnoid",
            Diagnosis::Subdural => "subdural",
            Diagnosis::Any => "any",
        }
    }

    /// Position in the label vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Parses a diagnosis column name
    ///
    /// # Errors
    ///
    /// Returns [`IchError::UnknownDiagnosis`] for names outside the vocabulary
    pub fn parse(s: &str) -> Result<Self> {
        let s_lower = s.trim().to_lowercase();
        Diagnosis::ALL
            .iter()
            .copied()
            .find(|d| d.simple_name() == s_lower)
            .ok_or_else(|| IchError::UnknownDiagnosis(s.to_string()))
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Output head layout of the classifier
///
/// The label-vector length of a dataset follows the head layout it is
/// trained with: five subtypes for `Shared`, all six for `Separate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeadVariant {
    /// One linear layer with an output per subtype; `any` is thresholded
    Shared,

    /// Six independent single-output heads, one per diagnosis
    #[default]
    Separate,
}

impl HeadVariant {
    /// Diagnoses predicted directly by the heads, in label-vector order
    pub fn diagnoses(&self) -> &'static [Diagnosis] {
        match self {
            HeadVariant::Shared => &Diagnosis::SUBTYPES,
            HeadVariant::Separate => &Diagnosis::ALL,
        }
    }

    /// Length of the label vector
    pub fn class_count(&self) -> usize {
        self.diagnoses().len()
    }

    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            HeadVariant::Shared => "shared",
            HeadVariant::Separate => "separate",
        }
    }
}

impl fmt::Display for HeadVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// On-disk format of dataset images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Pre-windowed 8-bit PNG slices (`<id>.png`)
    #[default]
    Png,

    /// Raw CT slices (`<id>.dcm`), windowed on load
    Dicom,
}

impl ImageFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Dicom => "dcm",
        }
    }
}

/// How an existing label cache is validated before reuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Reuse the cache whenever the file exists
    #[default]
    Exists,

    /// Reuse the cache only if the source fingerprint matches its sidecar
    Fingerprint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_label_order() {
        let names: Vec<&str> = Diagnosis::ALL.iter().map(|d| d.simple_name()).collect();
        assert_eq!(
            names,
            vec![
                "epidural",
                "intraparenchymal",
                "intraventricular",
                "subarachnoid",
                "subdural",
                "any"
            ]
        );
        for (i, d) in Diagnosis::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[rstest]
    #[case("epidural", Diagnosis::Epidural)]
    #[case("Subdural", Diagnosis::Subdural)]
    #[case(" any ", Diagnosis::Any)]
    fn test_parse_diagnosis(#[case] input: &str, #[case] expected: Diagnosis) {
        assert_eq!(Diagnosis::parse(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_diagnosis() {
        assert!(matches!(
            Diagnosis::parse("fracture"),
            Err(IchError::UnknownDiagnosis(_))
        ));
    }

    #[test]
    fn test_head_variant_class_count() {
        assert_eq!(HeadVariant::Shared.class_count(), 5);
        assert_eq!(HeadVariant::Separate.class_count(), 6);
        assert_eq!(HeadVariant::default(), HeadVariant::Separate);
        assert!(!HeadVariant::Shared.diagnoses().contains(&Diagnosis::Any));
    }

    #[test]
    fn test_image_format_extension() {
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Dicom.extension(), "dcm");
    }
}
