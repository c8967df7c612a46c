use crate::dicom::tags::{
    get_float_value, get_string_value, get_u16_value, BITS_ALLOCATED, COLUMNS, PIXEL_DATA,
    PIXEL_REPRESENTATION, RESCALE_INTERCEPT, RESCALE_SLOPE, ROWS, SAMPLES_PER_PIXEL,
    SOP_INSTANCE_UID,
};
use crate::error::{IchError, Result};
use crate::imaging::hounsfield::{rescale, window_to_luma};
use crate::types::WindowSetting;
use dicom_core::value::DicomValueType;
use dicom_core::PrimitiveValue;
use dicom_object::{open_file, InMemDicomObject};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use std::path::Path;

/// Single-frame CT slice with its stored pixel values and modality LUT
#[derive(Debug, Clone)]
pub struct CtSlice {
    pub rows: u16,
    pub columns: u16,

    /// Stored values, row-major, sign-extended per PixelRepresentation
    pub raw: Vec<i32>,

    /// RescaleSlope, 1.0 when absent
    pub slope: f32,

    /// RescaleIntercept, 0.0 when absent
    pub intercept: f32,

    pub sop_instance_uid: Option<String>,
}

impl CtSlice {
    /// Reads a slice from a DICOM file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let dcm = open_file(path)?;
        Self::from_dicom(&dcm)
    }

    /// Reads a slice from an already-opened DICOM object
    ///
    /// Only native (uncompressed) grayscale pixel data is supported.
    ///
    /// # Errors
    ///
    /// Returns an error if geometry tags are missing, the pixel data is
    /// encapsulated, or the sample count does not match `rows * columns`.
    pub fn from_dicom(dcm: &InMemDicomObject) -> Result<Self> {
        let rows = get_u16_value(dcm, ROWS).ok_or_else(|| IchError::TagNotFound("Rows".into()))?;
        let columns =
            get_u16_value(dcm, COLUMNS).ok_or_else(|| IchError::TagNotFound("Columns".into()))?;

        let samples = get_u16_value(dcm, SAMPLES_PER_PIXEL).unwrap_or(1);
        if samples != 1 {
            return Err(IchError::InvalidValue(format!(
                "Expected SamplesPerPixel=1 for CT, found {}",
                samples
            )));
        }

        let bits_allocated = get_u16_value(dcm, BITS_ALLOCATED).unwrap_or(16);
        let signed = get_u16_value(dcm, PIXEL_REPRESENTATION).unwrap_or(0) == 1;

        let elem = dcm
            .element(PIXEL_DATA)
            .map_err(|_| IchError::TagNotFound("PixelData".into()))?;
        let value = elem.value().primitive().ok_or_else(|| {
            IchError::DicomError("Encapsulated (compressed) pixel data is not supported".into())
        })?;
        let raw = decode_samples(value, bits_allocated, signed)?;

        let expected = rows as usize * columns as usize;
        if raw.len() < expected {
            return Err(IchError::InvalidValue(format!(
                "PixelData holds {} samples, expected {}x{}",
                raw.len(),
                rows,
                columns
            )));
        }

        Ok(Self {
            rows,
            columns,
            raw: raw.into_iter().take(expected).collect(),
            slope: get_float_value(dcm, RESCALE_SLOPE).unwrap_or(1.0) as f32,
            intercept: get_float_value(dcm, RESCALE_INTERCEPT).unwrap_or(0.0) as f32,
            sop_instance_uid: get_string_value(dcm, SOP_INSTANCE_UID),
        })
    }

    /// Hounsfield values, floored at air
    pub fn hounsfield(&self) -> Vec<f32> {
        rescale(&self.raw, self.slope, self.intercept)
    }

    /// Windowed 8-bit grayscale rendering at native resolution
    pub fn to_luma(&self, window: WindowSetting) -> Result<GrayImage> {
        window_to_luma(
            &self.raw,
            self.columns as u32,
            self.rows as u32,
            self.slope,
            self.intercept,
            window,
        )
        .ok_or_else(|| IchError::ImageError("Slice buffer does not match its geometry".into()))
    }

    /// Windowed, resized, three-channel rendering ready for the network
    pub fn to_rgb(&self, window: WindowSetting, size: u32) -> Result<RgbImage> {
        let luma = self.to_luma(window)?;
        let resized = if luma.dimensions() == (size, size) {
            luma
        } else {
            imageops::resize(&luma, size, size, FilterType::Triangle)
        };
        Ok(fill_channels(&resized))
    }
}

/// Replicates a grayscale image into three identical channels
pub fn fill_channels(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}

fn decode_samples(value: &PrimitiveValue, bits_allocated: u16, signed: bool) -> Result<Vec<i32>> {
    let widen = |v: u16| if signed { v as i16 as i32 } else { v as i32 };
    match (value, bits_allocated) {
        (PrimitiveValue::U16(v), 16) => Ok(v.iter().map(|&s| widen(s)).collect()),
        (PrimitiveValue::I16(v), 16) => Ok(v.iter().map(|&s| s as i32).collect()),
        (PrimitiveValue::U8(v), 16) => Ok(v
            .chunks_exact(2)
            .map(|b| widen(u16::from_le_bytes([b[0], b[1]])))
            .collect()),
        (PrimitiveValue::U8(v), 8) => Ok(v
            .iter()
            .map(|&s| if signed { s as i8 as i32 } else { s as i32 })
            .collect()),
        (_, bits) => Err(IchError::InvalidValue(format!(
            "Unsupported pixel layout: BitsAllocated={}, VR value {:?}",
            bits,
            value.value_type()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::dicom::tags::MODALITY;
    use dicom_core::{DataElement, VR};
    use dicom_object::FileMetaTableBuilder;

    /// Builds an in-memory signed 16-bit CT slice
    pub fn ct_object(
        rows: u16,
        columns: u16,
        raw: &[i16],
        slope: &str,
        intercept: &str,
    ) -> InMemDicomObject {
        let mut dcm = InMemDicomObject::new_empty();
        dcm.put(DataElement::new(MODALITY, VR::CS, PrimitiveValue::from("CT")));
        dcm.put(DataElement::new(
            SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.1"),
        ));
        dcm.put(DataElement::new(SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
        dcm.put(DataElement::new(ROWS, VR::US, PrimitiveValue::from(rows)));
        dcm.put(DataElement::new(COLUMNS, VR::US, PrimitiveValue::from(columns)));
        dcm.put(DataElement::new(BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)));
        dcm.put(DataElement::new(PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(1_u16)));
        dcm.put(DataElement::new(RESCALE_SLOPE, VR::DS, PrimitiveValue::from(slope)));
        dcm.put(DataElement::new(RESCALE_INTERCEPT, VR::DS, PrimitiveValue::from(intercept)));
        let stored: Vec<u16> = raw.iter().map(|&v| v as u16).collect();
        dcm.put(DataElement::new(
            PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(stored.into()),
        ));
        dcm
    }

    /// Writes a CT slice to disk with explicit VR little endian meta
    pub fn write_ct_file(path: &Path, rows: u16, columns: u16, raw: &[i16]) {
        let obj = ct_object(rows, columns, raw, "1", "-1024")
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax("1.2.840.10008.1.2.1")
                    .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.2")
                    .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.1"),
            )
            .unwrap();
        obj.write_to_file(path).unwrap();
    }
}
