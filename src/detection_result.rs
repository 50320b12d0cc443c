//! 物体検出の結果を処理するモジュール

use crate::img_proc::Letterbox;

/// 検出結果を保持するための構造体
///
/// 座標は左上 (`x1`, `y1`) と右下 (`x2`, `y2`) の角で保持します。
/// どの座標系 (キャンバス or 元画像) かは処理の段階によります。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionData {
    /// クラス
    pub class: i32,
    /// バウンディングボックス左上のx
    pub x1: f32,
    /// バウンディングボックス左上のy
    pub y1: f32,
    /// バウンディングボックス右下のx
    pub x2: f32,
    /// バウンディングボックス右下のy
    pub y2: f32,
    /// コンフィデンス
    pub confidence: f32,
}

impl DetectionData {
    /// 中心座標とサイズから新しいDetectionDataを作成します。
    ///
    /// # Args
    ///
    /// * `cx`, `cy` - 中心座標
    /// * `w`, `h` - BBoxのサイズ
    /// * `class` - クラスID
    /// * `confidence` - コンフィデンス
    ///
    /// # Return
    /// * 新たなDetectionDataインスタンス
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32, class: i32, confidence: f32) -> Self {
        let x1 = cx - w / 2.;
        let y1 = cy - h / 2.;
        Self {
            class,
            x1,
            y1,
            x2: x1 + w,
            y2: y1 + h,
            confidence,
        }
    }

    /// 左上と右下の座標から新しいDetectionDataを作成します。
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, class: i32, confidence: f32) -> Self {
        Self {
            class,
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// `(x, y, width, height)` 形式の矩形
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.width(), self.height())
    }

    /// BBoxの面積。角が逆転している場合は0とします。
    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    /// 角の順序を揃えます (`x1 <= x2`, `y1 <= y2`)。
    pub fn normalized(&self) -> Self {
        let mut new_d = *self;
        if new_d.x2 < new_d.x1 {
            std::mem::swap(&mut new_d.x1, &mut new_d.x2);
        }
        if new_d.y2 < new_d.y1 {
            std::mem::swap(&mut new_d.y1, &mut new_d.y2);
        }
        new_d
    }

    /// 座標を `[0, width - 1]`, `[0, height - 1]` の範囲に収めます。NaNは0になります。
    ///
    /// # Args
    ///
    /// * `width` - 画像の幅
    /// * `height` - 画像の高さ
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;

        let mut new_d = *self;
        new_d.x1 = new_d.x1.max(0.).min(max_x);
        new_d.y1 = new_d.y1.max(0.).min(max_y);
        new_d.x2 = new_d.x2.max(0.).min(max_x);
        new_d.y2 = new_d.y2.max(0.).min(max_y);
        new_d
    }

    /// YOLOの出力した検出結果の座標を元の画像の座標系に戻します。
    ///
    /// 逆変換後に角の順序を揃え、元画像の範囲にクランプします。
    ///
    /// # Args
    ///
    /// * `lb` - 前処理で得たレターボックス変換
    ///
    /// # Return
    /// * 新たなDetectionDataインスタンス
    pub fn reverse_transform(&self, lb: &Letterbox) -> Self {
        let mut new_d = *self;
        (new_d.x1, new_d.y1) = lb.point_reverse_transform(self.x1, self.y1);
        (new_d.x2, new_d.y2) = lb.point_reverse_transform(self.x2, self.y2);
        new_d.normalized().clamp(lb.orig_width, lb.orig_height)
    }

    /// BBoxを上下左右に `margin` ピクセル広げ、画像の範囲に収め直します。
    ///
    /// NMS後の最終的な結果にだけ適用してください。
    pub fn expand(&self, margin: f32, width: u32, height: u32) -> Self {
        let mut new_d = *self;
        new_d.x1 -= margin;
        new_d.y1 -= margin;
        new_d.x2 += margin;
        new_d.y2 += margin;
        new_d.clamp(width, height)
    }
}
