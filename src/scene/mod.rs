/// 場景查詢模組
///
/// 曝光系統只透過這裡的介面存取射線相交與尋路能力
use vek::Vec3;

pub mod box_scene;
pub mod direct_path;

pub use self::{
    box_scene::{Aabb, BoxScene},
    direct_path::DirectPathFinder,
};

/// 單條射線命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastCommand {
    pub origin: Vec3<f32>,
    /// 單位方向向量（長度為零時代表零長度射線）
    pub direction: Vec3<f32>,
    pub max_distance: f32,
}

impl RaycastCommand {
    /// 建立從 `from` 指向 `to` 的射線，長度恰好到達目標點
    pub fn between(from: Vec3<f32>, to: Vec3<f32>) -> Self {
        let vec = to - from;
        let distance = vec.magnitude();
        let direction = if distance > f32::EPSILON {
            vec / distance
        } else {
            Vec3::zero()
        };
        Self {
            origin: from,
            direction,
            max_distance: distance,
        }
    }
}

/// 批次射線結果
///
/// `distance <= 0` 表示射線在整段長度內沒有遇到遮擋
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub distance: f32,
}

impl RaycastHit {
    pub const NONE: RaycastHit = RaycastHit { distance: 0.0 };

    pub fn is_clear(&self) -> bool {
        self.distance <= 0.0
    }
}

impl From<Option<f32>> for RaycastHit {
    fn from(hit: Option<f32>) -> Self {
        match hit {
            // 距離 0 的接觸也算遮擋，不可落到無命中的表示
            Some(distance) => RaycastHit { distance: distance.max(f32::MIN_POSITIVE) },
            None => RaycastHit::NONE,
        }
    }
}

/// 場景射線相交介面
///
/// 實作必須可以跨執行緒共享，批次射線會在工作執行緒上呼叫
pub trait SceneQuery: Send + Sync {
    /// 回傳第一個遮擋物的距離，`None` 表示在 `max_distance` 內沒有命中
    fn raycast(&self, origin: Vec3<f32>, direction: Vec3<f32>, max_distance: f32) -> Option<f32>;

    /// 批次射線，結果與命令一一對應
    fn batch_raycast(&self, commands: &[RaycastCommand]) -> Vec<RaycastHit> {
        commands
            .iter()
            .map(|c| RaycastHit::from(self.raycast(c.origin, c.direction, c.max_distance)))
            .collect()
    }
}

/// 尋路介面
pub trait PathFinder {
    /// 回傳依序排列的路徑點，無法到達時回傳 `None`
    fn compute_path(&self, from: Vec3<f32>, to: Vec3<f32>) -> Option<Vec<Vec3<f32>>>;
}

/// 路徑長度 = 相鄰路徑點距離總和
pub fn path_length(corners: &[Vec3<f32>]) -> f32 {
    corners.windows(2).map(|w| w[0].distance(w[1])).sum()
}
