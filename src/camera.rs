//! カメラから1フレームだけ取得するモジュール

use anyhow::Result;
use image::DynamicImage;

/// カメラの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    /// `/dev/videoN` の N
    pub device_index: usize,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            frame_width: 640,
            frame_height: 480,
        }
    }
}

/// カメラから1フレームを取得します。
///
/// MJPGで取得したフレームをデコードして返します。
#[cfg(feature = "camera")]
pub fn capture_frame(config: &CameraConfig) -> Result<DynamicImage> {
    use anyhow::Context;
    use log::info;
    use v4l::buffer::Type;
    use v4l::io::{mmap::Stream, traits::CaptureStream};
    use v4l::video::Capture;
    use v4l::{Device, FourCC};

    // カメラデバイスをOpen
    let mut dev = Device::new(config.device_index)
        .with_context(|| format!("camera {} open failed", config.device_index))?;

    // カメラのフォーマットを設定
    let mut fmt = dev.format()?;
    fmt.width = config.frame_width;
    fmt.height = config.frame_height;
    fmt.fourcc = FourCC::new(b"MJPG");
    let fmt = dev.set_format(&fmt)?;
    info!("camera format: {}x{} {}", fmt.width, fmt.height, fmt.fourcc);

    let mut cam_stream = Stream::with_buffers(&mut dev, Type::VideoCapture, 2)?;
    let (frame, _meta) = CaptureStream::next(&mut cam_stream).context("capture failed")?;
    Ok(image::load_from_memory(frame)?)
}

/// カメラから1フレームを取得します。
///
/// `camera` featureなしでビルドした場合は常にエラーになります。
#[cfg(not(feature = "camera"))]
pub fn capture_frame(config: &CameraConfig) -> Result<DynamicImage> {
    anyhow::bail!(
        "camera {} open failed: built without the `camera` feature",
        config.device_index
    )
}
