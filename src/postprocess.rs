//! YOLO (You Only Look Once) 物体検出アルゴリズムの出力を後処理するためのモジュール

use log::{debug, trace, warn};

use crate::config::DetectorConfig;
use crate::detection_result::DetectionData;
use crate::img_proc::Letterbox;
use crate::nms::nms;
use crate::tensor::OutputTensor;

/// 1行の先頭にある座標とオブジェクトスコアの数 (cx, cy, w, h, obj)
const BOX_FIELDS: usize = 5;
/// DirectBox形式の1行の長さ (x0, y0, x1, y1, score, label)
const DIRECT_BOX_FIELDS: usize = 6;

/// 出力テンソルの1行をどう解釈するか
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodePolicy {
    /// `[cx, cy, w, h, obj_conf, class_0 .. class_{n-1}]` (キャンバスのピクセル座標)
    JointObjectness { num_classes: usize },
    /// `[x0, y0, x1, y1, score, label]` (キャンバスに対して0〜1に正規化された座標)
    ///
    /// `score_ceiling` を超えるスコアの行は壊れた行として捨てます。
    DirectBox { score_ceiling: f32 },
}

impl DecodePolicy {
    /// 出力テンソルから検出候補を取り出します。
    ///
    /// # Args
    /// * `out` - 推論エンジンの出力
    /// * `size` - キャンバスの一辺
    /// * `prob_threshold` - コンフィデンスの下限
    ///
    /// # Return
    /// * キャンバス座標系の検出候補
    pub fn decode(&self, out: &OutputTensor, size: u32, prob_threshold: f32) -> Vec<DetectionData> {
        if !out.is_empty() && out.cols() < self.row_len() {
            warn!(
                "output rows have {} fields, expected at least {}; skipping all rows",
                out.cols(),
                self.row_len()
            );
            return vec![];
        }

        match *self {
            DecodePolicy::JointObjectness { num_classes } => {
                decode_joint_objectness(out, num_classes, prob_threshold)
            }
            DecodePolicy::DirectBox { score_ceiling } => {
                decode_direct_box(out, size as f32, prob_threshold, score_ceiling)
            }
        }
    }

    /// 1行に必要な要素数
    pub fn row_len(&self) -> usize {
        match *self {
            DecodePolicy::JointObjectness { num_classes } => BOX_FIELDS + num_classes,
            DecodePolicy::DirectBox { .. } => DIRECT_BOX_FIELDS,
        }
    }
}

/// `get_cls_id` 相当。最大のクラススコアとそのクラスIDを返します。
fn max_class(class_scores: &[f32]) -> Option<(i32, f32)> {
    class_scores
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(id, score)| (id as i32, score))
}

fn finite_box(coords: &[f32]) -> bool {
    coords.iter().all(|v| v.is_finite())
}

fn decode_joint_objectness(
    out: &OutputTensor,
    num_classes: usize,
    prob_threshold: f32,
) -> Vec<DetectionData> {
    let row_len = BOX_FIELDS + num_classes;
    out.iter_rows()
        .filter_map(|values| {
            let obj_score = values[4];
            // 組み合わせたコンフィデンスが閾値を超えることはないので先に弾く
            if !(obj_score >= prob_threshold) {
                return None;
            }

            let (class_id, class_score) = max_class(&values[BOX_FIELDS..row_len])?;
            let confidence = obj_score * class_score;
            if !(confidence >= prob_threshold) || !finite_box(&values[..4]) {
                return None;
            }

            Some(DetectionData::from_center(
                values[0], values[1], values[2], values[3], class_id, confidence,
            ))
        })
        .collect()
}

fn decode_direct_box(
    out: &OutputTensor,
    size: f32,
    prob_threshold: f32,
    score_ceiling: f32,
) -> Vec<DetectionData> {
    out.iter_rows()
        .filter_map(|values| {
            let score = values[4];
            if !(prob_threshold..=score_ceiling).contains(&score) {
                if score > score_ceiling {
                    trace!("dropping row with out-of-range score {score}");
                }
                return None;
            }
            if !finite_box(&values[..4]) {
                trace!("dropping row with non-finite coordinates {:?}", &values[..4]);
                return None;
            }

            Some(DetectionData::from_corners(
                values[0] * size,
                values[1] * size,
                values[2] * size,
                values[3] * size,
                values[5] as i32,
                score,
            ))
        })
        .collect()
}

/// 出力テンソルの形状と先頭の数行をログに出します。
fn trace_tensor(out: &OutputTensor) {
    debug!("output tensor: rows={}, cols={}", out.rows(), out.cols());
    for (i, row) in out.iter_rows().take(5).enumerate() {
        let head: Vec<String> = row.iter().take(10).map(|v| format!("{v:.4}")).collect();
        trace!("row {}: {}", i, head.join(" "));
    }
}

/// `post_process`関数は、YOLOの出力から物体検出を行います
///
/// 候補の取り出し、NMS、元画像の座標系への逆変換、(設定されていれば) BBoxの拡大を順に行います。
///
/// # Args
/// * `out` - 推論エンジンの出力
/// * `lb` - 入力画像に適用したレターボックス変換
/// * `config` - 閾値などの設定
///
/// # Return
/// * 元画像の座標系で表した検出結果 (コンフィデンスの降順)
pub fn post_process(
    out: &OutputTensor,
    lb: &Letterbox,
    config: &DetectorConfig,
) -> Vec<DetectionData> {
    trace_tensor(out);

    let candidates = config
        .policy
        .decode(out, lb.size, config.prob_threshold);
    debug!("{} candidates above threshold {}", candidates.len(), config.prob_threshold);

    let kept = nms(&candidates, config.nms_threshold, config.nms_scope);
    debug!("{} boxes left after NMS", kept.len());

    kept.iter()
        .map(|d| d.reverse_transform(lb))
        .map(|d| match config.expand_margin {
            Some(margin) => d.expand(margin, lb.orig_width, lb.orig_height),
            None => d,
        })
        .collect()
}
