/// 模擬狀態管理模塊
///
/// 負責哨兵、角色與曝光引擎的每 tick 推進，以及固定頻率的時間循環

pub mod core;
pub mod clock;

pub use self::core::{Character, Sentinel, State};
pub use self::clock::Clock;
