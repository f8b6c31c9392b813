/// 最近未曝光格子搜尋
use ordered_float::OrderedFloat;
use vek::Vec3;

use super::grid::GridModel;
use super::store::ExposureStore;
use crate::scene::{path_length, PathFinder};

pub struct NearestUnexposedFinder;

impl NearestUnexposedFinder {
    /// 重新計算從 `origin` 到每個可通行格子中心的路徑長度
    ///
    /// 無法到達與不可通行的格子記為無限大
    pub fn update_path_lengths(
        origin: Vec3<f32>,
        grid: &GridModel,
        store: &mut ExposureStore,
        pathfinder: &dyn PathFinder,
    ) {
        let lengths = store.path_lengths_mut();
        for (index, length) in lengths.iter_mut().enumerate() {
            *length = if grid.is_navigable(index) {
                pathfinder
                    .compute_path(origin, grid.center(index))
                    .map(|corners| path_length(&corners))
                    .unwrap_or(f32::INFINITY)
            } else {
                f32::INFINITY
            };
        }
    }

    /// 找出路徑最短、可通行且未曝光的格子中心
    ///
    /// 同長度時取列優先掃描中最先出現的格子，這只是掃描順序的結果，
    /// 不代表歐氏距離最近
    pub fn find_nearest_unexposed(
        query_pos: Vec3<f32>,
        grid: &GridModel,
        store: &mut ExposureStore,
        pathfinder: &dyn PathFinder,
    ) -> Option<Vec3<f32>> {
        Self::update_path_lengths(query_pos, grid, store, pathfinder);
        Self::best_cell(grid, store).map(|index| grid.center(index))
    }

    fn best_cell(grid: &GridModel, store: &ExposureStore) -> Option<usize> {
        store
            .path_lengths()
            .iter()
            .enumerate()
            .filter(|(index, length)| {
                grid.is_navigable(*index) && !store.read(*index) && length.is_finite()
            })
            .min_by_key(|(_, length)| OrderedFloat(**length))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Aabb, BoxScene};

    /// 直線距離，x < `wall_x` 的格子視為無法到達
    struct HalfMapPath {
        wall_x: f32,
    }

    impl PathFinder for HalfMapPath {
        fn compute_path(&self, from: Vec3<f32>, to: Vec3<f32>) -> Option<Vec<Vec3<f32>>> {
            (to.x >= self.wall_x).then(|| vec![from, to])
        }
    }

    fn brute_force(
        query: Vec3<f32>,
        grid: &GridModel,
        store: &ExposureStore,
        pathfinder: &dyn PathFinder,
    ) -> Option<f32> {
        let mut best: Option<f32> = None;
        for i in 0..grid.num_cells() {
            if !grid.is_navigable(i) || store.read(i) {
                continue;
            }
            if let Some(corners) = pathfinder.compute_path(query, grid.center(i)) {
                let len = path_length(&corners);
                if best.map_or(true, |b| len < b) {
                    best = Some(len);
                }
            }
        }
        best
    }

    #[test]
    fn test_none_when_everything_exposed() {
        let scene = BoxScene::default();
        let grid = GridModel::new(5, &scene).unwrap();
        let mut store = ExposureStore::new(grid.num_cells());
        for i in 0..grid.num_cells() {
            store.write_back(i, true);
        }
        store.swap();
        let finder = HalfMapPath { wall_x: f32::NEG_INFINITY };
        assert_eq!(
            NearestUnexposedFinder::find_nearest_unexposed(Vec3::zero(), &grid, &mut store, &finder),
            None
        );
    }

    #[test]
    fn test_skips_unreachable_and_blocked_cells() {
        // (row 2, col 3) 被方塊佔據
        let scene = BoxScene::new(vec![Aabb::on_ground(1.5, 0.5, Vec3::new(0.8, 1.0, 0.8))]);
        let grid = GridModel::new(5, &scene).unwrap();
        assert!(!grid.is_navigable(grid.cell_index(2, 3)));
        let mut store = ExposureStore::new(grid.num_cells());
        // col 0..=2 無法到達
        let finder = HalfMapPath { wall_x: 1.0 };

        let query = grid.cell_center(2, 2);
        let found = NearestUnexposedFinder::find_nearest_unexposed(query, &grid, &mut store, &finder);
        assert_eq!(found, Some(grid.cell_center(1, 3)));
        assert_eq!(store.path_lengths()[grid.cell_index(2, 2)], f32::INFINITY);
        assert_eq!(store.path_lengths()[grid.cell_index(2, 3)], f32::INFINITY);
        assert!((store.path_lengths()[grid.cell_index(2, 4)] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_ties_resolve_to_first_in_scan_order() {
        let scene = BoxScene::default();
        let grid = GridModel::new(4, &scene).unwrap();
        let mut store = ExposureStore::new(grid.num_cells());
        let finder = HalfMapPath { wall_x: f32::NEG_INFINITY };

        // 查詢點在四個中央格子的交界，四格距離相同
        let found = NearestUnexposedFinder::find_nearest_unexposed(Vec3::zero(), &grid, &mut store, &finder);
        assert_eq!(found, Some(grid.cell_center(1, 1)));
    }

    #[test]
    fn test_matches_brute_force_on_small_grids() {
        for seed in 0..8u64 {
            let scene = BoxScene::random(seed, 6, 4.0);
            let grid = GridModel::new(8, &scene).unwrap();
            let mut store = ExposureStore::new(grid.num_cells());
            // 以固定規則標記曝光
            for i in 0..grid.num_cells() {
                store.write_back(i, (i as u64 * 7 + seed) % 3 == 0);
            }
            store.swap();

            let finder = HalfMapPath { wall_x: -2.0 };
            let query = Vec3::new(seed as f32 * 0.3 - 1.0, 0.0, 0.7);
            let expected = brute_force(query, &grid, &store, &finder);
            let found = NearestUnexposedFinder::find_nearest_unexposed(query, &grid, &mut store, &finder);

            match (expected, found) {
                (None, None) => {}
                (Some(best), Some(pos)) => {
                    let index = grid.cell_at(pos).unwrap();
                    assert!(grid.is_navigable(index));
                    assert!(!store.read(index));
                    assert!((pos.distance(query) - best).abs() < 1e-4);
                }
                other => panic!("mismatch for seed {}: {:?}", seed, other),
            }
        }
    }
}
