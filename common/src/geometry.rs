//! ページ座標の矩形
//!
//! 座標系は左上原点（`top`/`bottom` はページ上端からの距離）。

use serde::{Deserialize, Serialize};

/// 矩形（x0: 左, top: 上, x1: 右, bottom: 下）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self { x0, top, x1, bottom }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// 水平方向の中心
    pub fn center_x(&self) -> f64 {
        (self.x0 + self.x1) / 2.0
    }

    /// 2つの矩形を包む矩形
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// 水平方向に重なりがあるか（端の接触は含まない）
    pub fn overlaps_horizontally(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && self.x1 > other.x0
    }
}
