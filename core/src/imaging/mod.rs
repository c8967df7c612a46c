//! Pixel-level processing: Hounsfield windowing and augmentation

pub mod hounsfield;
pub mod transform;

pub use hounsfield::{apply_window, rescale, to_display, window_to_luma, AIR_FLOOR_HU};
pub use transform::{
    test_pipeline, train_pipeline, CenterCrop, Compose, HorizontalFlip, RandomBrightnessContrast,
    Resize, ShiftScaleRotate, Transform,
};
