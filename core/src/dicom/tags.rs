use dicom_core::Tag;
use dicom_object::InMemDicomObject;

// Identification Tags
pub use dicom_dictionary_std::tags::{MODALITY, SOP_INSTANCE_UID};

// Image Pixel Module Tags
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

// Modality LUT Tags
pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Helper to get u16 value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to u16
pub fn get_u16_value(dcm: &InMemDicomObject, tag: Tag) -> Option<u16> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<u16>().ok())
}

/// Helper to get the first value of a decimal string tag as f64
///
/// Multi-valued DS elements (e.g. `40\80`) yield their first value.
/// Returns `None` if the tag is not present or is not numeric.
pub fn get_float_value(dcm: &InMemDicomObject, tag: Tag) -> Option<f64> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_float64().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};

    #[test]
    fn test_tag_values() {
        // Just ensure tags are correctly defined
        assert_eq!(ROWS, Tag(0x0028, 0x0010));
        assert_eq!(RESCALE_SLOPE, Tag(0x0028, 0x1053));
        assert_eq!(RESCALE_INTERCEPT, Tag(0x0028, 0x1052));
        assert_eq!(PIXEL_DATA, Tag(0x7FE0, 0x0010));
        assert_eq!(SOP_INSTANCE_UID, Tag(0x0008, 0x0018));
    }

    #[test]
    fn test_get_values() {
        let mut dcm = InMemDicomObject::new_empty();
        dcm.put(DataElement::new(ROWS, VR::US, PrimitiveValue::from(512_u16)));
        dcm.put(DataElement::new(
            RESCALE_INTERCEPT,
            VR::DS,
            PrimitiveValue::from("-1024"),
        ));
        dcm.put(DataElement::new(MODALITY, VR::CS, PrimitiveValue::from("CT ")));

        assert_eq!(get_u16_value(&dcm, ROWS), Some(512));
        assert_eq!(get_float_value(&dcm, RESCALE_INTERCEPT), Some(-1024.0));
        assert_eq!(get_string_value(&dcm, MODALITY), Some("CT".to_string()));
        assert_eq!(get_float_value(&dcm, RESCALE_SLOPE), None);
    }
}
