use crate::detection_result::DetectionData;

/// NMSで抑制の対象とする範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmsScope {
    /// クラスに関係なく全てのBBoxを比較する
    ClassAgnostic,
    /// 同じクラスのBBox同士だけを比較する
    PerClass,
}

/// 2つのBBoxのIoU (Intersection over Union) を計算します。
///
/// 重なりがない場合と、和集合の面積が0の場合は0を返します。
pub fn iou(a: &DetectionData, b: &DetectionData) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let xx1 = a.x2.min(b.x2);
    let yy1 = a.y2.min(b.y2);

    if x1 >= xx1 || y1 >= yy1 {
        return 0.0;
    }
    let inter = (xx1 - x1) * (yy1 - y1);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Non-Maximum Suppression (NMS) を適用し、重なっているBBoxの中でコンフィデンスが最大のものを残します。
///
/// # Args
/// * `bb` - 候補のBBox (角の順序は問わない)
/// * `nms_threshold` - IoUがこの値を超えたBBoxを抑制する
/// * `scope` - 抑制の対象範囲
///
/// # Return
/// * コンフィデンスの降順に並んだ残ったBBox
pub fn nms(bb: &[DetectionData], nms_threshold: f32, scope: NmsScope) -> Vec<DetectionData> {
    let mut sorted_bb: Vec<DetectionData> = bb.iter().map(DetectionData::normalized).collect();
    sorted_bb.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<DetectionData> = Vec::with_capacity(sorted_bb.len());
    for a in sorted_bb {
        let suppressed = kept.iter().any(|b| {
            if scope == NmsScope::PerClass && a.class != b.class {
                return false;
            }
            iou(&a, b) > nms_threshold
        });
        if !suppressed {
            kept.push(a);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32, class: i32, confidence: f32) -> DetectionData {
        DetectionData::from_corners(x1, y1, x2, y2, class, confidence)
    }

    #[test]
    fn iou_is_symmetric() {
        let a = bbox(0., 0., 10., 10., 0, 0.9);
        let b = bbox(5., 2., 20., 8., 0, 0.8);
        assert_eq!(iou(&a, &b), iou(&b, &a));
        assert!(iou(&a, &b) > 0.);
    }

    #[test]
    fn iou_of_box_with_itself_is_one() {
        let a = bbox(3., 4., 30., 40., 0, 0.9);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0., 0., 10., 10., 0, 0.9);
        let b = bbox(20., 20., 30., 30., 0, 0.9);
        assert_eq!(iou(&a, &b), 0.0);
        // 辺で接しているだけ
        let c = bbox(10., 0., 20., 10., 0, 0.9);
        assert_eq!(iou(&a, &c), 0.0);
    }

    #[test]
    fn iou_of_degenerate_boxes_is_zero() {
        let a = bbox(5., 5., 5., 5., 0, 0.9);
        assert_eq!(iou(&a, &a), 0.0);
    }

    #[test]
    fn nms_of_empty_list_is_empty() {
        assert!(nms(&[], 0.45, NmsScope::ClassAgnostic).is_empty());
    }

    #[test]
    fn nms_threshold_decides_suppression() {
        // IoU = 90 / 100 = 0.9
        let a = bbox(0., 0., 10., 10., 0, 0.9);
        let b = bbox(0., 0., 10., 9., 0, 0.6);
        assert!((iou(&a, &b) - 0.9).abs() < 1e-6);

        let kept = nms(&[b, a], 0.45, NmsScope::PerClass);
        assert_eq!(kept, vec![a]);

        let kept = nms(&[b, a], 0.95, NmsScope::PerClass);
        assert_eq!(kept, vec![a, b]);
    }

    #[test]
    fn per_class_scope_keeps_overlapping_boxes_of_other_classes() {
        let a = bbox(0., 0., 10., 10., 0, 0.9);
        let b = bbox(0., 0., 10., 10., 1, 0.8);

        assert_eq!(nms(&[a, b], 0.45, NmsScope::PerClass).len(), 2);
        assert_eq!(nms(&[a, b], 0.45, NmsScope::ClassAgnostic), vec![a]);
    }

    #[test]
    fn nms_handles_equal_confidences() {
        let a = bbox(0., 0., 10., 10., 0, 0.5);
        let b = bbox(1., 1., 11., 11., 0, 0.5);
        let c = bbox(50., 50., 60., 60., 0, 0.5);
        let kept = nms(&[a, b, c], 0.45, NmsScope::ClassAgnostic);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn nms_suppresses_boxes_with_swapped_corners() {
        let a = bbox(30., 40., 10., 5., 1, 0.9);
        let b = bbox(30., 40., 10., 5., 1, 0.85);
        let kept = nms(&[a, b], 0.45, NmsScope::PerClass);
        assert_eq!(kept, vec![a.normalized()]);
    }

    #[test]
    fn kept_boxes_never_overlap_above_threshold() {
        let mut candidates = vec![];
        for i in 0..12 {
            let off = (i * 7 % 40) as f32;
            candidates.push(bbox(off, off / 2., off + 30., off / 2. + 25., i % 3, 0.3 + i as f32 * 0.05));
        }
        for scope in [NmsScope::ClassAgnostic, NmsScope::PerClass] {
            let kept = nms(&candidates, 0.4, scope);
            assert!(kept.len() <= candidates.len());
            for (i, a) in kept.iter().enumerate() {
                for b in &kept[i + 1..] {
                    if scope == NmsScope::PerClass && a.class != b.class {
                        continue;
                    }
                    assert!(iou(a, b) <= 0.4);
                }
            }
            assert!(kept.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        }
    }
}
