//! 推論エンジンの出力テンソル

use anyhow::{ensure, Result};

/// 2次元 (行優先) の出力テンソル。1行が1つの検出候補に対応します。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTensor {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl OutputTensor {
    /// 行数・列数とデータから新しいテンソルを作成します。
    ///
    /// `data.len()` が `rows * cols` と一致しない場合はエラーになります。
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        ensure!(
            rows.checked_mul(cols) == Some(data.len()),
            "tensor length mismatch: {}x{} != {}",
            rows,
            cols,
            data.len()
        );
        Ok(Self { rows, cols, data })
    }

    /// 任意の形状のテンソルを、最後の次元を列とする2次元に平坦化します。
    ///
    /// 0次元の場合は1行1列、最後の次元が0の場合は0行として扱います。
    pub fn from_shape(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let cols = shape.last().copied().unwrap_or(1);
        let rows = if cols == 0 { 0 } else { data.len() / cols };
        ensure!(
            shape.iter().product::<usize>() == data.len(),
            "tensor shape {:?} does not match length {}",
            shape,
            data.len()
        );
        Self::new(rows, cols, if cols == 0 { vec![] } else { data })
    }

    /// 行を持たない空のテンソル
    pub fn empty(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: vec![],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // cols == 0 の場合 chunks_exact はpanicする
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }
}
