/// 網格模型
///
/// 負責網格幾何與每格的靜態可通行（clearance）判定，只在尺寸改變時重算
use vek::Vec3;

use crate::error::{ExposureError, Result};
use crate::scene::SceneQuery;

pub const CELL_SIZE: f32 = 1.0;
/// 可通行檢測射線的起點高度
pub const CLEARANCE_PROBE_HEIGHT: f32 = 10.0;

#[derive(Debug, Clone)]
pub struct GridModel {
    dimension: i32,
    cell_size: f32,
    centers: Vec<Vec3<f32>>,
    clearance: Vec<bool>,
}

impl GridModel {
    /// 建立網格並對每格做一次向下的可通行檢測
    pub fn new(dimension: i32, scene: &dyn SceneQuery) -> Result<Self> {
        let mut grid = Self {
            dimension: 0,
            cell_size: CELL_SIZE,
            centers: Vec::new(),
            clearance: Vec::new(),
        };
        grid.resize(dimension, scene)?;
        Ok(grid)
    }

    /// 改變網格尺寸
    ///
    /// 格子數不變時不做任何事並回傳 `false`；否則整組重新配置並重算可通行性
    pub fn resize(&mut self, dimension: i32, scene: &dyn SceneQuery) -> Result<bool> {
        if dimension <= 0 {
            return Err(ExposureError::InvalidDimension(dimension));
        }
        let num_cells = (dimension as usize).pow(2);
        if !self.centers.is_empty() && num_cells == self.num_cells() {
            return Ok(false);
        }

        self.centers = Vec::new();
        self.clearance = Vec::new();
        self.dimension = dimension;

        let mut centers = Vec::with_capacity(num_cells);
        let mut clearance = Vec::with_capacity(num_cells);
        for row in 0..dimension {
            for col in 0..dimension {
                let center = self.cell_center(row, col);
                let probe_origin = center + Vec3::unit_y() * CLEARANCE_PROBE_HEIGHT;
                let navigable = scene.raycast(probe_origin, -Vec3::unit_y(), f32::INFINITY).is_none();
                centers.push(center);
                clearance.push(navigable);
            }
        }
        self.centers = centers;
        self.clearance = clearance;

        log::info!(
            "grid resized to {}x{} ({} cells, {} navigable)",
            dimension,
            dimension,
            num_cells,
            self.clearance.iter().filter(|c| **c).count()
        );
        Ok(true)
    }

    pub fn dimension(&self) -> i32 {
        self.dimension
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn num_cells(&self) -> usize {
        self.centers.len()
    }

    pub fn cell_index(&self, row: i32, col: i32) -> usize {
        (row * self.dimension + col) as usize
    }

    pub fn cell_center(&self, row: i32, col: i32) -> Vec3<f32> {
        let half = i64::from(self.dimension / 2);
        Vec3::new(
            (i64::from(col) - half) as f32 * self.cell_size + 0.5 * self.cell_size,
            0.0,
            (i64::from(row) - half) as f32 * self.cell_size + 0.5 * self.cell_size,
        )
    }

    /// 世界座標轉格子座標，結果可能落在網格外
    ///
    /// 超出 i32 範圍的座標會被夾在 i32 邊界，非有限值一律視為網格外
    pub fn world_to_cell(&self, pos: Vec3<f32>) -> (i32, i32) {
        (self.axis_to_cell(pos.z), self.axis_to_cell(pos.x))
    }

    fn axis_to_cell(&self, v: f32) -> i32 {
        let scaled = (v / self.cell_size).floor();
        if scaled.is_nan() {
            return i32::MIN;
        }
        // f32 -> i64 的轉型會飽和（無限大變成 i64 邊界）
        let cell = (scaled as i64).saturating_add(i64::from(self.dimension / 2));
        cell.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    /// 世界座標所在格子的索引，網格外回傳 `None`
    pub fn cell_at(&self, pos: Vec3<f32>) -> Option<usize> {
        let (row, col) = self.world_to_cell(pos);
        if row < 0 || col < 0 || row >= self.dimension || col >= self.dimension {
            return None;
        }
        Some(self.cell_index(row, col))
    }

    pub fn nearest_cell_center(&self, pos: Vec3<f32>) -> Vec3<f32> {
        let (row, col) = self.world_to_cell(pos);
        self.cell_center(row, col)
    }

    pub fn center(&self, index: usize) -> Vec3<f32> {
        self.centers[index]
    }

    pub fn centers(&self) -> &[Vec3<f32>] {
        &self.centers
    }

    pub fn is_navigable(&self, index: usize) -> bool {
        self.clearance[index]
    }

    pub fn clearance(&self) -> &[bool] {
        &self.clearance
    }
}
