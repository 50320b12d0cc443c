//! YOLOv4-tiny デモ
//!
//! ```text
//! yolo4-demo model/yolov4-tiny-opt.onnx model/yolov4-tiny-opt.bin [image.jpg]
//! ```
use anyhow::Result;

use tiny_yolo_demo::cli;
use tiny_yolo_demo::config::DetectorConfig;

fn main() -> Result<()> {
    cli::run(DetectorConfig::yolov4_tiny())
}
