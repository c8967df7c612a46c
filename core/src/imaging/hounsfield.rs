//! Hounsfield-unit rescale and display windowing

use crate::types::WindowSetting;
use image::GrayImage;

/// Air-equivalent floor; anything below is outside the scanner field of view
pub const AIR_FLOOR_HU: f32 = -1024.0;

/// Converts stored pixel values to Hounsfield units
///
/// Applies `raw * slope + intercept` and raises anything below
/// [`AIR_FLOOR_HU`] to the floor. No upper clamp is applied.
///
/// # Example
///
/// ```
/// use ich_core::imaging::rescale;
///
/// let hu = rescale(&[0, 1000, 4000], 1.0, -1024.0);
/// assert_eq!(hu, vec![-1024.0, -24.0, 2976.0]);
///
/// // Padding values far below air are floored
/// let hu = rescale(&[-2000], 1.0, -1024.0);
/// assert_eq!(hu, vec![-1024.0]);
/// ```
pub fn rescale(raw: &[i32], slope: f32, intercept: f32) -> Vec<f32> {
    raw.iter()
        .map(|&v| (v as f32 * slope + intercept).max(AIR_FLOOR_HU))
        .collect()
}

/// Clamps Hounsfield values into `[center - width/2, center + width/2]`
///
/// A zero width collapses every pixel to `center`.
pub fn apply_window(rescaled: &[f32], window: WindowSetting) -> Vec<f32> {
    let mut out = rescaled.to_vec();
    apply_window_in_place(&mut out, window);
    out
}

/// In-place variant of [`apply_window`]
pub fn apply_window_in_place(values: &mut [f32], window: WindowSetting) {
    let (min, max) = (window.min(), window.max());
    for v in values.iter_mut() {
        *v = v.max(min).min(max);
    }
}

/// Maps windowed values linearly onto 0..=255
///
/// A degenerate (zero-width) window maps every pixel to 0.
pub fn to_display(windowed: &[f32], window: WindowSetting) -> Vec<u8> {
    let min = window.min();
    let span = window.max() - min;
    if span <= 0.0 {
        return vec![0; windowed.len()];
    }
    windowed
        .iter()
        .map(|&v| (((v - min) / span).clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

/// Rescales, windows and maps a raw slice to an 8-bit grayscale image
pub fn window_to_luma(
    raw: &[i32],
    width: u32,
    height: u32,
    slope: f32,
    intercept: f32,
    window: WindowSetting,
) -> Option<GrayImage> {
    let mut hu = rescale(raw, slope, intercept);
    apply_window_in_place(&mut hu, window);
    let display = to_display(&hu, window);
    GrayImage::from_raw(width, height, display)
}

/// Returns the mean intensity of a grayscale image
pub fn mean_intensity(img: &GrayImage) -> f32 {
    let n = img.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let total: u64 = img.as_raw().iter().map(|&v| v as u64).sum();
    total as f32 / n as f32
}
