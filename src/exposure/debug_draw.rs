/// 除錯繪製
///
/// 純觀察用途，繪製結果不會回饋到曝光計算
use std::ops::Range;
use vek::{Rgba, Vec3};

use super::grid::GridModel;
use super::store::ExposureStore;

pub const RAY_EXPOSED: Rgba<f32> = Rgba { r: 1.0, g: 0.0, b: 1.0, a: 1.0 };
pub const RAY_HIDDEN: Rgba<f32> = Rgba { r: 0.0, g: 1.0, b: 1.0, a: 1.0 };
pub const FILL_EXPOSED: Rgba<f32> = Rgba { r: 1.0, g: 0.0, b: 0.0, a: 0.3 };
pub const FILL_HIDDEN: Rgba<f32> = Rgba { r: 0.0, g: 1.0, b: 0.0, a: 0.3 };

/// 除錯繪製輸出端
pub trait DebugDraw {
    fn line(&mut self, from: Vec3<f32>, to: Vec3<f32>, color: Rgba<f32>);
    fn filled_quad(&mut self, center: Vec3<f32>, size: Vec3<f32>, color: Rgba<f32>);
}

/// 視點到每個可通行格子的射線，依前緩衝上色
pub fn draw_rays(
    eye_pos: Vec3<f32>,
    cells: Range<usize>,
    grid: &GridModel,
    store: &ExposureStore,
    sink: &mut dyn DebugDraw,
) {
    for index in cells {
        if !grid.is_navigable(index) {
            continue;
        }
        let color = if store.read(index) { RAY_EXPOSED } else { RAY_HIDDEN };
        sink.line(eye_pos, grid.center(index), color);
    }
}

/// 曝光熱度圖
pub fn draw_exposure_map(grid: &GridModel, store: &ExposureStore, sink: &mut dyn DebugDraw) {
    let size = Vec3::new(0.9 * grid.cell_size(), 0.001, 0.9 * grid.cell_size());
    for index in 0..grid.num_cells() {
        if !grid.is_navigable(index) {
            continue;
        }
        let fill = if store.read(index) { FILL_EXPOSED } else { FILL_HIDDEN };
        let center = grid.center(index) + Vec3::unit_y() * 0.01;
        sink.filled_quad(center, size, fill);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawLine {
    pub from: Vec3<f32>,
    pub to: Vec3<f32>,
    pub color: Rgba<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawQuad {
    pub center: Vec3<f32>,
    pub size: Vec3<f32>,
    pub color: Rgba<f32>,
}

/// 記錄繪製命令的輸出端，每個 tick 開始前清空
#[derive(Debug, Default)]
pub struct DrawRecorder {
    pub lines: Vec<DrawLine>,
    pub quads: Vec<DrawQuad>,
}

impl DrawRecorder {
    pub fn clear(&mut self) {
        self.lines.clear();
        self.quads.clear();
    }

    pub fn lines_with(&self, color: Rgba<f32>) -> usize {
        self.lines.iter().filter(|l| l.color == color).count()
    }

    pub fn quads_with(&self, color: Rgba<f32>) -> usize {
        self.quads.iter().filter(|q| q.color == color).count()
    }
}

impl DebugDraw for DrawRecorder {
    fn line(&mut self, from: Vec3<f32>, to: Vec3<f32>, color: Rgba<f32>) {
        self.lines.push(DrawLine { from, to, color });
    }

    fn filled_quad(&mut self, center: Vec3<f32>, size: Vec3<f32>, color: Rgba<f32>) {
        self.quads.push(DrawQuad { center, size, color });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Aabb, BoxScene};

    #[test]
    fn test_draws_skip_blocked_cells() {
        let scene = BoxScene::new(vec![Aabb::on_ground(0.5, 0.5, Vec3::new(0.8, 1.0, 0.8))]);
        let grid = GridModel::new(4, &scene).unwrap();
        let mut store = ExposureStore::new(grid.num_cells());
        store.write_back(0, true);
        store.swap();

        let mut recorder = DrawRecorder::default();
        draw_exposure_map(&grid, &store, &mut recorder);
        assert_eq!(recorder.quads.len(), 15);
        assert_eq!(recorder.quads_with(FILL_EXPOSED), 1);
        assert_eq!(recorder.quads_with(FILL_HIDDEN), 14);
        assert!((recorder.quads[0].center.y - 0.01).abs() < 1e-6);

        draw_rays(Vec3::new(0.0, 2.0, 0.0), 0..4, &grid, &store, &mut recorder);
        assert_eq!(recorder.lines.len(), 4);
        assert_eq!(recorder.lines_with(RAY_EXPOSED), 1);

        recorder.clear();
        assert!(recorder.lines.is_empty() && recorder.quads.is_empty());
    }
}
