//! # Tiny YOLO デモ
//!
//! YOLOv3 / YOLOv4-tiny のモデルを推論エンジンで実行し、出力テンソルをBBoxに変換するライブラリです。
//!
//! ## 主な機能
//!
//! 1. **前処理**: 画像をアスペクト比を保ったまま正方形のキャンバスに配置します (レターボックス)。
//! 2. **出力の解釈**: モデルの出力形式 (`DecodePolicy`) に合わせて検出候補を取り出します。
//! 3. **NMS**: 重なっているBBoxの中でコンフィデンスが最大のものを残します。
//! 4. **逆変換**: 検出結果を元の画像の座標系に戻し、画像の範囲に収めます。
//!
//! ## Example
//! ```no_run
//! use tiny_yolo_demo::config::DetectorConfig;
//! use tiny_yolo_demo::detector::Detector;
//! use tiny_yolo_demo::engine::{EngineConfig, TractEngine};
//!
//! let config = DetectorConfig::yolov4_tiny();
//! let engine = TractEngine::load("model/yolov4-tiny.onnx", EngineConfig::default())?;
//! let mut detector = Detector::new(engine, config);
//! let img = image::open("image.jpg")?;
//! let result = detector.detect(&img)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod camera;
pub mod cli;
pub mod coco;
pub mod config;
pub mod detection_result;
pub mod detector;
pub mod engine;
pub mod img_proc;
pub mod nms;
pub mod postprocess;
pub mod tensor;
