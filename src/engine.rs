//! 推論エンジンとのインターフェース

use std::path::Path;

use anyhow::{ensure, Context, Result};
use image::RgbImage;
use log::{debug, info};
use tract_onnx::prelude::*;

use crate::tensor::OutputTensor;

/// キャンバスを受け取り、出力テンソルを返す推論エンジン
pub trait InferenceEngine {
    /// 1枚のキャンバス (`T×T`) について順伝播を行います。
    fn forward(&mut self, canvas: &RgbImage) -> Result<OutputTensor>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn forward(&mut self, canvas: &RgbImage) -> Result<OutputTensor> {
        (**self).forward(canvas)
    }
}

/// 入力テンソルのチャネル順
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// `TractEngine` の設定
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// 入力テンソルの名前
    pub input_name: String,
    /// 出力テンソルの名前
    pub output_name: String,
    /// 入力の一辺
    pub size: u32,
    pub channel_order: ChannelOrder,
    /// 画素値を 1/255 して 0〜1 に正規化するか
    pub normalize: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_name: "data".to_string(),
            output_name: "output".to_string(),
            size: crate::config::DEFAULT_TARGET_SIZE,
            channel_order: ChannelOrder::Bgr,
            normalize: false,
        }
    }
}

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// tract で ONNX モデルを実行する推論エンジン
pub struct TractEngine {
    plan: Plan,
    config: EngineConfig,
}

impl TractEngine {
    /// ONNX モデルを読み込み、実行できる状態にします。
    ///
    /// # Args
    /// * `model_path` - ONNX のグラフファイル
    /// * `config` - 入出力の名前や入力サイズ
    pub fn load<P: AsRef<Path>>(model_path: P, config: EngineConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("loading model: {}", model_path.display());

        let size = config.size as usize;
        let mut model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;
        model
            .set_input_names([config.input_name.as_str()])
            .with_context(|| format!("input tensor '{}' not found", config.input_name))?;
        model
            .set_output_names([config.output_name.as_str()])
            .with_context(|| format!("output tensor '{}' not found", config.output_name))?;

        let plan = model
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())?
            .into_optimized()?
            .into_runnable()
            .context("failed to prepare model for inference")?;
        info!(
            "model ready: input '{}' {}x{}, output '{}'",
            config.input_name, size, size, config.output_name
        );

        Ok(Self { plan, config })
    }

    /// キャンバスを NCHW の f32 テンソルに変換します。
    fn to_input_tensor(&self, canvas: &RgbImage) -> Tensor {
        let size = self.config.size as usize;
        let scale = if self.config.normalize { 1. / 255. } else { 1. };
        let order = match self.config.channel_order {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        };
        tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            f32::from(canvas.get_pixel(x as u32, y as u32)[order[c]]) * scale
        })
        .into()
    }
}

impl InferenceEngine for TractEngine {
    fn forward(&mut self, canvas: &RgbImage) -> Result<OutputTensor> {
        ensure!(
            canvas.dimensions() == (self.config.size, self.config.size),
            "canvas must be {0}x{0}, got {1}x{2}",
            self.config.size,
            canvas.width(),
            canvas.height()
        );

        let input = self.to_input_tensor(canvas);
        let outputs = self.plan.run(tvec!(input.into()))?;
        let output = outputs
            .first()
            .context("model produced no output tensor")?;

        let shape = output.shape().to_vec();
        debug!("'{}' shape: {:?}", self.config.output_name, shape);
        let data: Vec<f32> = output.to_array_view::<f32>()?.iter().copied().collect();
        OutputTensor::from_shape(&shape, data)
    }
}
