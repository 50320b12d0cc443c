//! 検出パイプラインの設定

use crate::nms::NmsScope;
use crate::postprocess::DecodePolicy;

/// YOLOの入力サイズ
pub const DEFAULT_TARGET_SIZE: u32 = 416;
pub const DEFAULT_PROB_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
/// DirectBox形式のスコアの上限。壊れた行を弾くためのもので、確率の上限ではない
pub const DEFAULT_SCORE_CEILING: f32 = 1.5;
/// YOLOv3デモでNMS後のBBoxを広げる幅 (ピクセル)
pub const DEFAULT_EXPAND_MARGIN: f32 = 50.;
pub const COCO_CLASS_NUM: usize = 80;

/// 検出パイプラインの設定
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// 正方形キャンバスの一辺
    pub target_size: u32,
    /// 候補として残すコンフィデンスの下限
    pub prob_threshold: f32,
    /// NMSのIoU閾値
    pub nms_threshold: f32,
    /// 出力テンソルの解釈方法
    pub policy: DecodePolicy,
    /// NMSの抑制範囲
    pub nms_scope: NmsScope,
    /// NMS後にBBoxを広げる幅。`None` なら広げない
    pub expand_margin: Option<f32>,
    /// 入力テンソルの名前
    pub input_name: String,
    /// 出力テンソルの名前
    pub output_name: String,
}

impl DetectorConfig {
    /// YOLOv3 (検出結果を直接出力するモデル) 用の設定
    pub fn yolov3() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            prob_threshold: DEFAULT_PROB_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            policy: DecodePolicy::DirectBox {
                score_ceiling: DEFAULT_SCORE_CEILING,
            },
            nms_scope: NmsScope::PerClass,
            expand_margin: Some(DEFAULT_EXPAND_MARGIN),
            input_name: "data".to_string(),
            output_name: "output".to_string(),
        }
    }

    /// YOLOv4-tiny (`cx,cy,w,h,obj,class[80]` を出力するモデル) 用の設定
    pub fn yolov4_tiny() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            prob_threshold: DEFAULT_PROB_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            policy: DecodePolicy::JointObjectness {
                num_classes: COCO_CLASS_NUM,
            },
            nms_scope: NmsScope::ClassAgnostic,
            expand_margin: None,
            input_name: "data".to_string(),
            output_name: "output".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_decode_stage() {
        let v3 = DetectorConfig::yolov3();
        let v4 = DetectorConfig::yolov4_tiny();
        assert_eq!(v3.target_size, v4.target_size);
        assert_eq!(v3.prob_threshold, 0.5);
        assert_eq!(v3.nms_threshold, 0.45);
        assert_eq!(v3.nms_scope, NmsScope::PerClass);
        assert_eq!(v4.nms_scope, NmsScope::ClassAgnostic);
        assert_eq!(v3.expand_margin, Some(50.));
        assert_eq!(v4.expand_margin, None);
        assert_eq!(v3.policy, DecodePolicy::DirectBox { score_ceiling: 1.5 });
    }
}
