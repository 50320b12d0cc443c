//! デモプログラム共通のコマンドライン処理

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use image::{DynamicImage, RgbImage};
use log::info;
use rusttype::Font;

use crate::camera::{self, CameraConfig};
use crate::coco;
use crate::config::DetectorConfig;
use crate::detection_result::DetectionData;
use crate::detector::Detector;
use crate::engine::{ChannelOrder, EngineConfig, TractEngine};
use crate::img_proc::draw_bbox;

/// コマンドライン引数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// モデルのグラフファイル (ONNX)
    #[arg(value_name = "MODEL_PARAM")]
    pub model_param: PathBuf,

    /// モデルの重みファイル
    ///
    /// 存在の確認だけに使います。外部データはグラフと同じディレクトリから読み込まれるので、
    /// グラフが参照する外部データファイルか、重みを埋め込んだグラフなら同じファイルを指定します。
    #[arg(value_name = "MODEL_WEIGHTS")]
    pub model_weights: PathBuf,

    /// 入力画像。省略するとカメラから1フレーム取得します
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// 結果画像の保存先
    #[arg(long, default_value = "result.jpg", value_name = "FILE")]
    pub output: PathBuf,

    /// YOLOの入力サイズ
    #[arg(long, value_name = "PIXELS")]
    pub target_size: Option<u32>,

    /// コンフィデンスの閾値 (0.0 - 1.0)
    #[arg(long, value_name = "THRESHOLD")]
    pub prob_threshold: Option<f32>,

    /// NMS IoU 閾値 (0.0 - 1.0)
    #[arg(long, value_name = "THRESHOLD")]
    pub nms_threshold: Option<f32>,

    /// NMS後にBBoxを広げる幅 (ピクセル)
    #[arg(long, value_name = "PIXELS", conflicts_with = "no_expand")]
    pub expand_margin: Option<f32>,

    /// BBoxを広げない
    #[arg(long)]
    pub no_expand: bool,

    /// DirectBox形式でこれを超えるスコアの行を捨てる
    #[arg(long, value_name = "SCORE")]
    pub score_ceiling: Option<f32>,

    /// 入力テンソルの名前
    #[arg(long, value_name = "NAME")]
    pub input_name: Option<String>,

    /// 出力テンソルの名前
    #[arg(long, value_name = "NAME")]
    pub output_name: Option<String>,

    /// 入力をRGB順で渡す (デフォルトはBGR)
    #[arg(long)]
    pub rgb: bool,

    /// 画素値を 0〜1 に正規化して渡す
    #[arg(long)]
    pub normalize: bool,

    /// ラベル描画用のTTFフォント。省略するとBBoxだけ描画します
    #[arg(long, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// ラベルのフォントサイズ
    #[arg(long, default_value = "20", value_name = "PIXELS")]
    pub font_size: f32,

    /// BBoxの線の太さ
    #[arg(long, default_value = "2", value_name = "PIXELS")]
    pub line_thickness: f32,

    /// カメラのデバイス番号
    #[arg(long, default_value = "0", value_name = "INDEX")]
    pub camera: usize,

    /// テンソルの形状や途中結果をログに出す
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// プリセットにコマンドライン引数の値を上書きした設定を作ります。
    pub fn detector_config(&self, preset: DetectorConfig) -> DetectorConfig {
        use crate::postprocess::DecodePolicy;

        let mut config = preset;
        if let Some(size) = self.target_size {
            config.target_size = size;
        }
        if let Some(t) = self.prob_threshold {
            config.prob_threshold = t;
        }
        if let Some(t) = self.nms_threshold {
            config.nms_threshold = t;
        }
        if self.no_expand {
            config.expand_margin = None;
        } else if let Some(margin) = self.expand_margin {
            config.expand_margin = Some(margin);
        }
        if let (Some(ceiling), DecodePolicy::DirectBox { score_ceiling }) =
            (self.score_ceiling, &mut config.policy)
        {
            *score_ceiling = ceiling;
        }
        if let Some(name) = &self.input_name {
            config.input_name = name.clone();
        }
        if let Some(name) = &self.output_name {
            config.output_name = name.clone();
        }
        config
    }

    pub fn engine_config(&self, config: &DetectorConfig) -> EngineConfig {
        EngineConfig {
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
            size: config.target_size,
            channel_order: if self.rgb {
                ChannelOrder::Rgb
            } else {
                ChannelOrder::Bgr
            },
            normalize: self.normalize,
        }
    }
}

/// `env_logger` を初期化します。`--verbose` の場合は debug 以上を出します。
pub fn init_logger(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // テストなどで二重に初期化された場合は無視する
    let _ = builder.try_init();
}

/// モデルのファイルが揃っているか確認します。
fn check_model_files(args: &Args) -> Result<()> {
    ensure!(
        args.model_param.is_file(),
        "model param not found: {}",
        args.model_param.display()
    );
    ensure!(
        args.model_weights.is_file(),
        "model weights not found: {}",
        args.model_weights.display()
    );
    Ok(())
}

fn load_font(path: &Path) -> Result<Font<'static>> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    Font::try_from_vec(data).with_context(|| format!("invalid font {}", path.display()))
}

fn load_frame(args: &Args) -> Result<DynamicImage> {
    match &args.image {
        Some(path) => image::open(path)
            .with_context(|| format!("image open failed: {}", path.display())),
        None => camera::capture_frame(&CameraConfig {
            device_index: args.camera,
            ..CameraConfig::default()
        }),
    }
}

/// 検出結果を1行ずつ標準出力に書き出します。
pub fn print_detections(detections: &[DetectionData]) {
    for d in detections {
        let (x, y, w, h) = d.rect();
        println!(
            "label: {} ({}) prob: {:.4} at ({:.0}, {:.0}, {:.0}x{:.0})",
            d.class,
            coco::class_name(d.class),
            d.confidence,
            x,
            y,
            w,
            h
        );
    }
}

/// 元画像に検出結果を描画します。検出がなければ元画像のままです。
pub fn render(
    img: &DynamicImage,
    detections: &[DetectionData],
    font: Option<&Font>,
    font_size: f32,
    line_thickness: f32,
) -> RgbImage {
    let mut rgb_img = img.to_rgb8();
    draw_bbox(&mut rgb_img, detections, font, font_size, line_thickness);
    rgb_img
}

/// 結果画像を保存します。
pub fn save_result(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path)
        .with_context(|| format!("failed to save {}", path.display()))
}

/// デモプログラムの本体
///
/// # Args
/// * `preset` - モデルに合わせた設定のプリセット
pub fn run(preset: DetectorConfig) -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = args.detector_config(preset);
    check_model_files(&args)?;
    let engine = TractEngine::load(&args.model_param, args.engine_config(&config))?;
    let mut detector = Detector::new(engine, config);
    info!("{:?}", detector.config());

    let font = args.font.as_deref().map(load_font).transpose()?;
    let frame = load_frame(&args)?;

    let start = Instant::now();
    let detections = detector.detect(&frame)?;
    let t = start.elapsed().as_secs_f64() * 1000.0;
    info!("Processing time:{:.03}ms, {} objects", t, detections.len());

    print_detections(&detections);

    let rgb_img = render(
        &frame,
        &detections,
        font.as_ref(),
        args.font_size,
        args.line_thickness,
    );
    save_result(&rgb_img, &args.output)?;
    println!("Result saved to {}", args.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::DecodePolicy;

    #[test]
    fn requires_model_files() {
        assert!(Args::try_parse_from(["yolo4-demo"]).is_err());
        assert!(Args::try_parse_from(["yolo4-demo", "m.onnx"]).is_err());
        assert!(Args::try_parse_from(["yolo4-demo", "m.onnx", "m.bin", "a.jpg", "b.jpg"]).is_err());
    }

    #[test]
    fn image_is_optional() {
        let args = Args::try_parse_from(["yolo4-demo", "m.onnx", "m.bin"]).unwrap();
        assert!(args.image.is_none());
        assert_eq!(args.output, PathBuf::from("result.jpg"));

        let args = Args::try_parse_from(["yolo4-demo", "m.onnx", "m.bin", "a.jpg"]).unwrap();
        assert_eq!(args.image, Some(PathBuf::from("a.jpg")));
    }

    #[test]
    fn options_override_preset() {
        let args = Args::try_parse_from([
            "yolo3-demo",
            "m.onnx",
            "m.bin",
            "--prob-threshold",
            "0.3",
            "--score-ceiling",
            "2.0",
            "--no-expand",
            "--output-name",
            "detection_out",
        ])
        .unwrap();
        let config = args.detector_config(DetectorConfig::yolov3());
        assert_eq!(config.prob_threshold, 0.3);
        assert_eq!(config.nms_threshold, 0.45);
        assert_eq!(config.expand_margin, None);
        assert_eq!(config.policy, DecodePolicy::DirectBox { score_ceiling: 2.0 });
        assert_eq!(config.output_name, "detection_out");

        let engine = args.engine_config(&config);
        assert_eq!(engine.channel_order, ChannelOrder::Bgr);
        assert_eq!(engine.size, 416);
    }

    #[test]
    fn missing_model_weights_are_reported() {
        let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let args = Args::try_parse_from(["yolo4-demo", manifest, manifest]).unwrap();
        assert!(check_model_files(&args).is_ok());

        let args =
            Args::try_parse_from(["yolo4-demo", manifest, "no_such_weights.bin"]).unwrap();
        let err = check_model_files(&args).unwrap_err();
        assert!(err.to_string().contains("model weights not found"), "{err}");
    }

    #[test]
    fn expand_margin_conflicts_with_no_expand() {
        let res = Args::try_parse_from([
            "yolo3-demo",
            "m.onnx",
            "m.bin",
            "--expand-margin",
            "10",
            "--no-expand",
        ]);
        assert!(res.is_err());
    }
}
