/// Exposure Map Library
///
/// 以視點即時計算網格曝光圖，提供多種排程模式與最近未曝光格子查詢

pub mod config;
pub mod error;
pub mod exposure;
pub mod scene;
pub mod state;

// Re-export commonly used types
pub use crate::config::{ExposureSetting, Setting, SimulationSetting};
pub use crate::error::{ExposureError, Result};
pub use crate::exposure::*;
pub use crate::scene::{Aabb, BoxScene, DirectPathFinder, PathFinder, RaycastCommand, RaycastHit, SceneQuery};
pub use crate::state::{Clock, State};
