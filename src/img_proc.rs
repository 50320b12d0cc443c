//! YOLOに関する画像処理モジュール

use anyhow::{ensure, Result};
use image::imageops::FilterType;
use image::{DynamicImage, Pixel, Rgb, RgbImage};

use crate::coco;
use crate::detection_result::DetectionData;

use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

/// レターボックス変換のパラメータ
///
/// 前処理で画像ごとに計算し、同じ画像の検出結果を元の座標系に戻すときに使います。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// 縮小率 (縦横共通)
    pub scale: f32,
    /// 左右の余白 (ピクセル)
    pub pad_x: u32,
    /// 上下の余白 (ピクセル)
    pub pad_y: u32,
    /// リサイズ後の画像の幅
    pub new_width: u32,
    /// リサイズ後の画像の高さ
    pub new_height: u32,
    /// 正方形キャンバスの一辺
    pub size: u32,
    /// 元画像の幅
    pub orig_width: u32,
    /// 元画像の高さ
    pub orig_height: u32,
}

impl Letterbox {
    /// 元画像のサイズとキャンバスのサイズからレターボックス変換を計算します。
    ///
    /// # Args
    ///
    /// * `width` - 元画像の幅
    /// * `height` - 元画像の高さ
    /// * `size` - 正方形キャンバスの一辺
    pub fn new(width: u32, height: u32, size: u32) -> Result<Self> {
        ensure!(width > 0 && height > 0, "image size must be positive: {width}x{height}");
        ensure!(size > 0, "letterbox size must be positive");

        let target = f64::from(size);
        let scale = f64::min(target / f64::from(width), target / f64::from(height));
        let new_width = ((f64::from(width) * scale).round() as u32).clamp(1, size);
        let new_height = ((f64::from(height) * scale).round() as u32).clamp(1, size);

        Ok(Self {
            scale: scale as f32,
            pad_x: (size - new_width) / 2,
            pad_y: (size - new_height) / 2,
            new_width,
            new_height,
            size,
            orig_width: width,
            orig_height: height,
        })
    }

    /// キャンバス上の座標を元の画像の座標系に戻します。
    ///
    /// # Return
    /// * 新たな座標 (x, y)
    pub fn point_reverse_transform(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// 画像をアスペクト比を保ってリサイズし、黒で埋めた正方形のキャンバスの中央に配置します。
///
/// # Args
///
/// * `img` - 入力画像
/// * `size` - キャンバスの一辺
///
/// # Return
///
/// * キャンバスと、逆変換に使うレターボックス変換
pub fn letterbox(img: &DynamicImage, size: u32) -> Result<(RgbImage, Letterbox)> {
    let lb = Letterbox::new(img.width(), img.height(), size)?;
    let resized = image::imageops::resize(
        &img.to_rgb8(),
        lb.new_width,
        lb.new_height,
        FilterType::Triangle,
    );

    let mut canvas = RgbImage::new(size, size);
    for (x, y, &pixel) in resized.enumerate_pixels() {
        canvas.put_pixel(x + lb.pad_x, y + lb.pad_y, pixel);
    }
    Ok((canvas, lb))
}

const COLORS: [[u8; 3]; 10] = [
    [255, 0, 0],
    [255, 255, 0],
    [0, 0, 255],
    [0, 255, 0],
    [28, 105, 80],
    [190, 159, 53],
    [46, 194, 148],
    [242, 30, 131],
    [97, 101, 198],
    [115, 11, 87],
];

fn class_color(class: i32) -> Rgb<u8> {
    *Rgb::from_slice(&COLORS[class.rem_euclid(COLORS.len() as i32) as usize])
}

/// 太さ `thickness` の矩形を描画します。角は両端を含みます。
fn draw_rect(
    img: &mut RgbImage,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    thickness: i32,
    color: Rgb<u8>,
) {
    let offset = thickness / 2;
    for i in 0..thickness {
        let d = i - offset;
        let (left, top) = (x1.min(x2) - d, y1.min(y2) - d);
        let w = (x2 - x1).abs() + 1 + 2 * d;
        let h = (y2 - y1).abs() + 1 + 2 * d;
        if w > 0 && h > 0 {
            draw_hollow_rect_mut(img, Rect::at(left, top).of_size(w as u32, h as u32), color);
        }
    }
}

/// BBoxの左上にラベルを描画します。上端からはみ出す場合はBBoxの内側に描きます。
fn draw_label(
    img: &mut RgbImage,
    x: i32,
    y: i32,
    color: Rgb<u8>,
    font: &Font,
    font_size: f32,
    text: &str,
) {
    let scale = Scale::uniform(font_size.max(1.));
    let (text_w, text_h) = text_size(scale, font, text);
    let (w, h) = (text_w.max(1) + 6, text_h.max(1) + 4);
    let top = if y - h < 0 { y } else { y - h };

    draw_filled_rect_mut(img, Rect::at(x, top).of_size(w as u32, h as u32), color);

    let brightness: u32 = color.0.iter().map(|&c| u32::from(c)).sum();
    let text_color = if brightness < 382 {
        Rgb([255u8, 255, 255])
    } else {
        Rgb([0u8, 0, 0])
    };
    draw_text_mut(img, text_color, x + 3, top + 2, scale, font, text);
}

/// 画像上にバウンディングボックスとラベルを描画します。
///
/// # Args
///
/// * `img` - バウンディングボックスとラベルを描画する画像 (in-place)
/// * `d_result` - 検出結果の配列 (元画像の座標系)
/// * `font` - ラベルのフォント。`None` の場合は枠だけ描画します
/// * `font_size` - ラベルのフォントサイズ
/// * `line_thickness` - バウンディングボックスの線の太さ
pub fn draw_bbox(
    img: &mut RgbImage,
    d_result: &[DetectionData],
    font: Option<&Font>,
    font_size: f32,
    line_thickness: f32,
) {
    let line_thickness = line_thickness.max(1.).round() as i32;
    let mut sorted = d_result.to_vec();
    // コンフィデンスの高いものを上に描く
    sorted.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

    for d in sorted.iter() {
        let color = class_color(d.class);

        let x1 = d.x1.round() as i32;
        let y1 = d.y1.round() as i32;
        let x2 = d.x2.round() as i32;
        let y2 = d.y2.round() as i32;

        draw_rect(img, x1, y1, x2, y2, line_thickness, color);

        if let Some(font) = font {
            let text = format!("{}: {:.2}", coco::class_name(d.class), d.confidence);
            draw_label(img, x1.min(x2), y1.min(y2), color, font, font_size, &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_canvas(lb: &Letterbox, x: f32, y: f32) -> (f32, f32) {
        (x * lb.scale + lb.pad_x as f32, y * lb.scale + lb.pad_y as f32)
    }

    #[test]
    fn letterbox_of_landscape_image() {
        let lb = Letterbox::new(640, 480, 416).unwrap();
        assert!((lb.scale - 0.65).abs() < 1e-6);
        assert_eq!((lb.new_width, lb.new_height), (416, 312));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 52));
    }

    #[test]
    fn letterbox_of_portrait_image() {
        let lb = Letterbox::new(300, 600, 416).unwrap();
        assert_eq!((lb.new_width, lb.new_height), (208, 416));
        assert_eq!((lb.pad_x, lb.pad_y), (104, 0));
    }

    #[test]
    fn letterbox_rejects_empty_sizes() {
        assert!(Letterbox::new(0, 480, 416).is_err());
        assert!(Letterbox::new(640, 0, 416).is_err());
        assert!(Letterbox::new(640, 480, 0).is_err());
    }

    #[test]
    fn canvas_point_maps_back_to_original() {
        let lb = Letterbox::new(640, 480, 416).unwrap();
        let (x, y) = lb.point_reverse_transform(208., 150.);
        assert!((x - 320.).abs() < 1e-3);
        assert!((y - 150.769_23).abs() < 1e-3);
    }

    #[test]
    fn reverse_transform_round_trip() {
        for (w, h) in [(640, 480), (1280, 720), (333, 999), (416, 416)] {
            let lb = Letterbox::new(w, h, 416).unwrap();
            for (x, y) in [(0., 0.), (12.5, 300.25), (w as f32 - 1., h as f32 - 1.)] {
                let (cx, cy) = to_canvas(&lb, x, y);
                let (rx, ry) = lb.point_reverse_transform(cx, cy);
                assert!((rx - x).abs() < 1e-2 && (ry - y).abs() < 1e-2, "{w}x{h}: {x},{y}");
            }
        }
    }

    #[test]
    fn letterbox_pads_with_black() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([200, 100, 50])));
        let (canvas, lb) = letterbox(&img, 32).unwrap();
        assert_eq!(canvas.dimensions(), (32, 32));
        assert_eq!((lb.pad_x, lb.pad_y), (0, 8));
        assert_eq!(canvas.get_pixel(16, 0), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(16, 31), &Rgb([0, 0, 0]));
        let center = canvas.get_pixel(16, 16);
        for (c, expected) in center.0.iter().zip([200u8, 100, 50]) {
            assert!(c.abs_diff(expected) <= 1, "{center:?}");
        }
    }

    #[test]
    fn draw_bbox_without_font_draws_frame() {
        let mut img = RgbImage::new(100, 100);
        let d = DetectionData::from_corners(10., 10., 50., 60., 0, 0.9);
        draw_bbox(&mut img, &[d], None, 12., 2.);
        assert_eq!(img.get_pixel(10, 30), &Rgb(COLORS[0]));
        assert_eq!(img.get_pixel(11, 30), &Rgb(COLORS[0]));
        assert_eq!(img.get_pixel(50, 60), &Rgb(COLORS[0]));
        assert_eq!(img.get_pixel(30, 30), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(12, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn draw_bbox_handles_degenerate_and_offscreen_boxes() {
        let mut img = RgbImage::new(20, 20);
        let boxes = [
            DetectionData::from_corners(5., 5., 5., 5., 1, 0.9),
            DetectionData::from_corners(-40., -40., 100., 100., 2, 0.8),
        ];
        draw_bbox(&mut img, &boxes, None, 12., 3.);
        assert_eq!(img.get_pixel(5, 5), &Rgb(COLORS[1]));
    }
}
