//! CNN Model Architecture for Tomato Leaf Disease Classification
//!
//! Three convolutional blocks followed by a dropout-regularized dense head.
//!
//! ```text
//! input [B, 3, 128, 128]
//!   -> block(32)  -> [B, 32, 64, 64]
//!   -> block(64)  -> [B, 64, 32, 32]
//!   -> block(128) -> [B, 128, 16, 16]
//!   -> flatten -> dropout(0.5) -> dense(128, relu) -> dropout(0.3) -> dense(10)
//! ```
//!
//! Each block is `Conv2d(3x3, same) -> ReLU -> BatchNorm -> MaxPool(2x2)`.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::model::artifact::LayerSpec;

/// Configuration for the TomatoClassifier CNN model
#[derive(Config, Debug)]
pub struct TomatoClassifierConfig {
    /// Number of output classes
    #[config(default = "crate::NUM_CLASSES")]
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "crate::IMAGE_SIZE")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "crate::CHANNELS")]
    pub in_channels: usize,

    /// Filters of the first block, doubled by each following block
    #[config(default = "32")]
    pub base_filters: usize,

    /// Units of the hidden dense layer
    #[config(default = "128")]
    pub dense_units: usize,

    /// Dropout applied to the flattened features
    #[config(default = "0.5")]
    pub flatten_dropout: f64,

    /// Dropout applied after the hidden dense layer
    #[config(default = "0.3")]
    pub dense_dropout: f64,
}

impl TomatoClassifierConfig {
    /// Filters of each convolutional block
    pub fn block_filters(&self) -> [usize; 3] {
        [self.base_filters, self.base_filters * 2, self.base_filters * 4]
    }

    /// Spatial size after the three pooling stages
    pub fn feature_map_size(&self) -> usize {
        self.input_size / 8
    }

    /// Length of the flattened feature vector fed to the dense head
    pub fn flatten_len(&self) -> usize {
        let s = self.feature_map_size();
        self.block_filters()[2] * s * s
    }

    /// Layer specs implied by this configuration
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        let [f1, f2, f3] = self.block_filters();
        let mut specs = Vec::new();

        for (i, (c_in, c_out)) in [(self.in_channels, f1), (f1, f2), (f2, f3)]
            .into_iter()
            .enumerate()
        {
            specs.push(LayerSpec::conv(i + 1, c_out, c_in, 3));
            specs.push(LayerSpec::batch_norm(i + 1, c_out));
        }
        specs.push(LayerSpec::dense("dense_1", self.flatten_len(), self.dense_units, "relu"));
        specs.push(LayerSpec::dense("dense_2", self.dense_units, self.num_classes, "softmax"));

        specs
    }
}

/// Conv2d -> ReLU -> BatchNorm -> MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub bn: BatchNorm<B>,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            bn: BatchNormConfig::new(out_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        let x = self.bn.forward(x);
        self.pool.forward(x)
    }

    /// Conv kernel shape `[out, in, kh, kw]`
    pub fn kernel_shape(&self) -> [usize; 4] {
        self.conv.weight.val().dims()
    }

    /// BatchNorm feature count
    pub fn norm_features(&self) -> usize {
        self.bn.gamma.val().dims()[0]
    }
}

/// Tomato Leaf Disease Classifier CNN
#[derive(Module, Debug)]
pub struct TomatoClassifier<B: Backend> {
    pub block1: ConvBlock<B>,
    pub block2: ConvBlock<B>,
    pub block3: ConvBlock<B>,

    pub flatten_dropout: Dropout,
    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dense_dropout: Dropout,
    pub fc2: Linear<B>,
}

impl<B: Backend> TomatoClassifier<B> {
    /// Create a new classifier with freshly initialized weights
    pub fn new(config: &TomatoClassifierConfig, device: &B::Device) -> Self {
        let [f1, f2, f3] = config.block_filters();

        Self {
            block1: ConvBlock::new(config.in_channels, f1, device), // 128 -> 64
            block2: ConvBlock::new(f1, f2, device),                 // 64 -> 32
            block3: ConvBlock::new(f2, f3, device),                 // 32 -> 16
            flatten_dropout: DropoutConfig::new(config.flatten_dropout).init(),
            fc1: LinearConfig::new(config.flatten_len(), config.dense_units).init(device),
            relu: Relu::new(),
            dense_dropout: DropoutConfig::new(config.dense_dropout).init(),
            fc2: LinearConfig::new(config.dense_units, config.num_classes).init(device),
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width], values in [0, 1]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block1.forward(x);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);

        // [B, C, H, W] -> [B, C * H * W]
        let x = x.flatten::<2>(1, 3);

        let x = self.flatten_dropout.forward(x);
        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.dense_dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.fc2.weight.val().dims()[1]
    }

    /// Layer specs read from the actual weight tensors
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        let mut specs = Vec::new();

        for (i, block) in [&self.block1, &self.block2, &self.block3].into_iter().enumerate() {
            let [c_out, c_in, k, _] = block.kernel_shape();
            specs.push(LayerSpec::conv(i + 1, c_out, c_in, k));
            specs.push(LayerSpec::batch_norm(i + 1, block.norm_features()));
        }

        let [fc1_in, fc1_out] = self.fc1.weight.val().dims();
        let [fc2_in, fc2_out] = self.fc2.weight.val().dims();
        specs.push(LayerSpec::dense("dense_1", fc1_in, fc1_out, "relu"));
        specs.push(LayerSpec::dense("dense_2", fc2_in, fc2_out, "softmax"));

        specs
    }
}
