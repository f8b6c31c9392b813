/// 直線尋路
///
/// 兩點之間若在步行高度沒有遮擋，就回傳直線路徑
use std::sync::Arc;
use vek::Vec3;

use super::{PathFinder, RaycastCommand, SceneQuery};

pub struct DirectPathFinder {
    scene: Arc<dyn SceneQuery>,
    /// 檢查遮擋時的離地高度
    walk_height: f32,
}

impl DirectPathFinder {
    pub fn new(scene: Arc<dyn SceneQuery>) -> Self {
        Self { scene, walk_height: 0.5 }
    }

    pub fn with_walk_height(mut self, walk_height: f32) -> Self {
        self.walk_height = walk_height;
        self
    }
}

impl PathFinder for DirectPathFinder {
    fn compute_path(&self, from: Vec3<f32>, to: Vec3<f32>) -> Option<Vec<Vec3<f32>>> {
        let lift = Vec3::new(0.0, self.walk_height, 0.0);
        let cmd = RaycastCommand::between(from + lift, to + lift);
        match self.scene.raycast(cmd.origin, cmd.direction, cmd.max_distance) {
            Some(_) => None,
            None => Some(vec![from, to]),
        }
    }
}
