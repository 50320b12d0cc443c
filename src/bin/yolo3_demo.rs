//! YOLOv3 デモ
//!
//! ```text
//! yolo3-demo model/yolov3.onnx model/yolov3.bin [image.jpg]
//! ```
use anyhow::Result;

use tiny_yolo_demo::cli;
use tiny_yolo_demo::config::DetectorConfig;

fn main() -> Result<()> {
    cli::run(DetectorConfig::yolov3())
}
