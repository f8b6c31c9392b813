/// 軸對齊方塊場景
///
/// 以 AABB 障礙物組成的簡單場景，提供給模擬與測試使用
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use vek::Vec3;

use super::SceneQuery;

/// 軸對齊包圍盒
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3<f32>,
    pub max: Vec3<f32>,
}

impl Aabb {
    pub fn new(min: Vec3<f32>, max: Vec3<f32>) -> Self {
        Self { min, max }
    }

    /// 以地面中心點與尺寸建立（底部貼齊 y = 0）
    pub fn on_ground(center_x: f32, center_z: f32, size: Vec3<f32>) -> Self {
        let half = Vec3::new(size.x * 0.5, 0.0, size.z * 0.5);
        let base = Vec3::new(center_x, 0.0, center_z);
        Self {
            min: base - half,
            max: base + half + Vec3::new(0.0, size.y, 0.0),
        }
    }

    pub fn contains(&self, p: Vec3<f32>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Slab 測試，回傳進入距離
    ///
    /// 起點在盒內時不算命中
    pub fn ray_hit(&self, origin: Vec3<f32>, direction: Vec3<f32>, max_distance: f32) -> Option<f32> {
        let o = origin.into_array();
        let d = direction.into_array();
        let lo = self.min.into_array();
        let hi = self.max.into_array();

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        for axis in 0..3 {
            if d[axis].abs() < 1e-8 {
                if o[axis] < lo[axis] || o[axis] > hi[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d[axis];
            let mut t0 = (lo[axis] - o[axis]) * inv;
            let mut t1 = (hi[axis] - o[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
        }

        if t_enter > t_exit || t_exit < 0.0 || t_enter <= 0.0 || t_enter > max_distance {
            return None;
        }
        Some(t_enter)
    }
}

/// 方塊場景
#[derive(Debug, Clone, Default)]
pub struct BoxScene {
    boxes: Vec<Aabb>,
}

impl BoxScene {
    pub fn new(boxes: Vec<Aabb>) -> Self {
        Self { boxes }
    }

    /// 以種子隨機產生障礙物，範圍為 [-extent, extent]²
    pub fn random(seed: u64, count: usize, extent: f32) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let boxes = (0..count)
            .map(|_| {
                let x = rng.random_range(-extent..extent);
                let z = rng.random_range(-extent..extent);
                let size = Vec3::new(
                    rng.random_range(0.5..3.0),
                    rng.random_range(1.0..4.0),
                    rng.random_range(0.5..3.0),
                );
                Aabb::on_ground(x, z, size)
            })
            .collect();
        Self { boxes }
    }

    pub fn boxes(&self) -> &[Aabb] {
        &self.boxes
    }

    pub fn push(&mut self, aabb: Aabb) {
        self.boxes.push(aabb);
    }
}

impl SceneQuery for BoxScene {
    fn raycast(&self, origin: Vec3<f32>, direction: Vec3<f32>, max_distance: f32) -> Option<f32> {
        self.boxes
            .iter()
            .filter_map(|b| b.ray_hit(origin, direction, max_distance))
            .min_by(|a, b| a.total_cmp(b))
    }
}
