//! Image augmentation transforms
//!
//! Every transform maps an RGB image to an RGB image. Randomised transforms
//! draw from the generator handed in by the caller so that a seeded loader
//! reproduces the same augmentations.

use super::hounsfield::mean_intensity;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::{Rng, RngCore};

/// An `image -> image` transform
pub trait Transform: Send + Sync {
    fn apply(&self, img: RgbImage, rng: &mut dyn RngCore) -> RgbImage;
}

/// Applies transforms in order
#[derive(Default)]
pub struct Compose {
    steps: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(steps: Vec<Box<dyn Transform>>) -> Self {
        Self { steps }
    }

    /// Builder: Append a transform
    pub fn then(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, mut img: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        for step in &self.steps {
            img = step.apply(img, rng);
        }
        img
    }
}

/// Crops the central `width x height` region
///
/// Images smaller than the crop along an axis keep their full extent there.
#[derive(Debug, Clone, Copy)]
pub struct CenterCrop {
    pub width: u32,
    pub height: u32,
}

impl CenterCrop {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transform for CenterCrop {
    fn apply(&self, img: RgbImage, _rng: &mut dyn RngCore) -> RgbImage {
        let (w, h) = img.dimensions();
        let cw = self.width.min(w);
        let ch = self.height.min(h);
        if (cw, ch) == (w, h) {
            return img;
        }
        let x = (w - cw) / 2;
        let y = (h - ch) / 2;
        imageops::crop_imm(&img, x, y, cw, ch).to_image()
    }
}

/// Resizes to exactly `width x height`
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Resize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transform for Resize {
    fn apply(&self, img: RgbImage, _rng: &mut dyn RngCore) -> RgbImage {
        if img.dimensions() == (self.width, self.height) {
            return img;
        }
        imageops::resize(&img, self.width, self.height, FilterType::Triangle)
    }
}

/// Mirrors left-right with probability `p`
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFlip {
    pub p: f64,
}

impl Default for HorizontalFlip {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

impl Transform for HorizontalFlip {
    fn apply(&self, img: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        if rng.gen_bool(self.p.clamp(0.0, 1.0)) {
            imageops::flip_horizontal(&img)
        } else {
            img
        }
    }
}

/// Random linear brightness and contrast change
///
/// `out = alpha * (px - mean) + mean + beta * 255` with
/// `alpha in [1 - contrast_limit, 1 + contrast_limit]` and
/// `beta in [-brightness_limit, brightness_limit]`.
#[derive(Debug, Clone, Copy)]
pub struct RandomBrightnessContrast {
    pub brightness_limit: f32,
    pub contrast_limit: f32,
    pub p: f64,
}

impl Default for RandomBrightnessContrast {
    fn default() -> Self {
        Self {
            brightness_limit: 0.2,
            contrast_limit: 0.2,
            p: 0.5,
        }
    }
}

impl Transform for RandomBrightnessContrast {
    fn apply(&self, mut img: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        if !rng.gen_bool(self.p.clamp(0.0, 1.0)) {
            return img;
        }
        let alpha = 1.0 + symmetric(rng, self.contrast_limit);
        let beta = symmetric(rng, self.brightness_limit) * 255.0;
        let mean = mean_intensity(&imageops::grayscale(&img));

        for px in img.pixels_mut() {
            for c in px.0.iter_mut() {
                let v = alpha * (*c as f32 - mean) + mean + beta;
                *c = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        img
    }
}

/// Random affine shift, scale and rotation about the image center
///
/// Nearest-neighbour sampling; pixels mapped from outside the source are black.
#[derive(Debug, Clone, Copy)]
pub struct ShiftScaleRotate {
    /// Max shift as a fraction of width/height
    pub shift_limit: f32,
    /// Max relative scale change
    pub scale_limit: f32,
    /// Max rotation in degrees
    pub rotate_limit: f32,
    pub p: f64,
}

impl Default for ShiftScaleRotate {
    fn default() -> Self {
        Self {
            shift_limit: 0.0625,
            scale_limit: 0.1,
            rotate_limit: 45.0,
            p: 0.5,
        }
    }
}

impl Transform for ShiftScaleRotate {
    fn apply(&self, img: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        if !rng.gen_bool(self.p.clamp(0.0, 1.0)) {
            return img;
        }
        let (w, h) = img.dimensions();
        let dx = symmetric(rng, self.shift_limit) * w as f32;
        let dy = symmetric(rng, self.shift_limit) * h as f32;
        let scale = 1.0 + symmetric(rng, self.scale_limit);
        let angle = symmetric(rng, self.rotate_limit).to_radians();
        affine_nearest(&img, dx, dy, scale, angle)
    }
}

/// Uniform draw from `[-limit, limit]`
fn symmetric(rng: &mut dyn RngCore, limit: f32) -> f32 {
    if limit <= 0.0 {
        return 0.0;
    }
    rng.gen_range(-limit..=limit)
}

fn affine_nearest(img: &RgbImage, dx: f32, dy: f32, scale: f32, angle: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let (sin, cos) = angle.sin_cos();
    let inv_scale = if scale.abs() < f32::EPSILON { 1.0 } else { 1.0 / scale };

    RgbImage::from_fn(w, h, |x, y| {
        // Map the destination pixel back into the source
        let tx = x as f32 + 0.5 - cx - dx;
        let ty = y as f32 + 0.5 - cy - dy;
        let sx = (cos * tx + sin * ty) * inv_scale + cx;
        let sy = (-sin * tx + cos * ty) * inv_scale + cy;
        if sx < 0.0 || sy < 0.0 || sx >= w as f32 || sy >= h as f32 {
            Rgb([0, 0, 0])
        } else {
            *img.get_pixel(sx as u32, sy as u32)
        }
    })
}

/// Augmentations used for training
pub fn train_pipeline(crop_size: u32) -> Compose {
    Compose::default()
        .then(CenterCrop::new(crop_size, crop_size))
        .then(HorizontalFlip::default())
        .then(RandomBrightnessContrast::default())
        .then(ShiftScaleRotate::default())
}

/// Deterministic preprocessing used for inference
pub fn test_pipeline(crop_size: u32) -> Compose {
    Compose::default().then(CenterCrop::new(crop_size, crop_size))
}
