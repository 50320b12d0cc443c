//! 前処理・推論・後処理をまとめた検出器

use anyhow::Result;
use image::DynamicImage;
use log::debug;

use crate::config::DetectorConfig;
use crate::detection_result::DetectionData;
use crate::engine::InferenceEngine;
use crate::img_proc;
use crate::postprocess;

/// 推論エンジンと設定をまとめた検出器
pub struct Detector<E: InferenceEngine> {
    engine: E,
    config: DetectorConfig,
}

impl<E: InferenceEngine> Detector<E> {
    pub fn new(engine: E, config: DetectorConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 画像の処理を開始します。
    ///
    /// # Args
    /// * `img` - 入力画像
    ///
    /// # Return
    /// * 元画像の座標系で表した物体検出結果
    pub fn detect(&mut self, img: &DynamicImage) -> Result<Vec<DetectionData>> {
        let (canvas, lb) = img_proc::letterbox(img, self.config.target_size)?;
        debug!(
            "letterbox: scale={:.4}, pad=({}, {}), resized={}x{}",
            lb.scale, lb.pad_x, lb.pad_y, lb.new_width, lb.new_height
        );

        let out = self.engine.forward(&canvas)?;
        Ok(postprocess::post_process(&out, &lb, &self.config))
    }
}
