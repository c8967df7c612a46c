use crate::error::IchError;
use crate::model::loss::aggregate_loss;
use crate::types::HeadVariant;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use burn::tensor::activation::{relu, sigmoid};
use std::path::Path;

/// Architecture of the slice classifier
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub head_variant: HeadVariant,

    #[config(default = 3)]
    pub in_channels: usize,

    /// Channels of the first block; each further block doubles them
    #[config(default = 16)]
    pub base_channels: usize,

    /// Stride-2 conv blocks in the backbone
    #[config(default = 4)]
    pub blocks: usize,
}

impl ClassifierConfig {
    /// Builds a freshly initialized model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Classifier<B> {
        let mut backbone = Vec::with_capacity(self.blocks);
        let mut channels_in = self.in_channels;
        let mut channels_out = self.base_channels;
        for _ in 0..self.blocks {
            backbone.push(ConvBlock {
                conv: Conv2dConfig::new([channels_in, channels_out], [3, 3])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
                norm: BatchNormConfig::new(channels_out).init(device),
            });
            channels_in = channels_out;
            channels_out *= 2;
        }

        let heads = match self.head_variant {
            HeadVariant::Shared => {
                vec![LinearConfig::new(channels_in, self.head_variant.class_count()).init(device)]
            }
            HeadVariant::Separate => (0..self.head_variant.class_count())
                .map(|_| LinearConfig::new(channels_in, 1).init(device))
                .collect(),
        };

        Classifier {
            backbone,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            heads,
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.conv.forward(x)))
    }
}

/// Convolutional backbone with either one shared multi-output head or one
/// single-output head per diagnosis
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    backbone: Vec<ConvBlock<B>>,
    pool: AdaptiveAvgPool2d,
    heads: Vec<Linear<B>>,
}

impl<B: Backend> Classifier<B> {
    /// Head layout, recovered from the number of heads
    pub fn head_variant(&self) -> HeadVariant {
        if self.heads.len() == 1 {
            HeadVariant::Shared
        } else {
            HeadVariant::Separate
        }
    }

    /// Pooled features `[batch, channels]`
    pub fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.backbone {
            x = block.forward(x);
        }
        self.pool.forward(x).flatten(1, 3)
    }

    /// Logits of every head, each `[batch, outputs]`
    pub fn forward_heads(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 2>> {
        let features = self.features(images);
        self.heads
            .iter()
            .map(|head| head.forward(features.clone()))
            .collect()
    }

    /// Concatenated logits `[batch, class_count]` in diagnosis order
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        Tensor::cat(self.forward_heads(images), 1)
    }

    /// Sigmoid probabilities `[batch, class_count]`
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward(images))
    }

    /// Aggregate training loss for a labeled batch
    pub fn forward_loss(&self, images: Tensor<B, 4>, labels: Tensor<B, 2, Int>) -> crate::error::Result<Tensor<B, 1>> {
        aggregate_loss(self.forward_heads(images), labels)
    }

    /// Writes weights to `path` (the recorder adds its extension)
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        CompactRecorder::new()
            .record(self.clone().into_record(), path.to_path_buf())
            .map_err(|e| IchError::ModelError(format!("Failed to save {}: {}", path.display(), e)))
    }

    /// Replaces weights with the ones stored at `path`
    pub fn load(self, path: &Path, device: &B::Device) -> crate::error::Result<Self> {
        let record = CompactRecorder::new()
            .load(path.to_path_buf(), device)
            .map_err(|e| IchError::ModelError(format!("Failed to load {}: {}", path.display(), e)))?;
        Ok(self.load_record(record))
    }
}
