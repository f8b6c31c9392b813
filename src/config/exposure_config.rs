/// 曝光系統設定
///
/// 從 TOML 檔載入，邊界值在進入網格狀態前就被拒絕或夾住
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ExposureError, Result};
use crate::exposure::ScheduleMode;

pub const MIN_GRID_DIMENSION: i32 = 10;
pub const MAX_GRID_DIMENSION: i32 = 100;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExposureSetting {
    /// 網格邊長（10 ~ 100）
    pub grid_dimension: i32,
    pub mode: ScheduleMode,
    /// 分時模式下每個 tick 處理的格子百分比（0 ~ 100）
    pub time_slice_percentage: i32,
    pub draw_rays: bool,
    pub draw_exposure: bool,
    /// 射線工作執行緒數量，未設定時為 max(2, 核心數) - 1
    pub worker_threads: Option<usize>,
    /// 單一批次允許的射線上限
    pub max_rays_per_batch: usize,
}

impl Default for ExposureSetting {
    fn default() -> Self {
        Self {
            grid_dimension: 10,
            mode: ScheduleMode::Synchronous,
            time_slice_percentage: 10,
            draw_rays: true,
            draw_exposure: true,
            worker_threads: None,
            max_rays_per_batch: 1 << 16,
        }
    }
}

impl ExposureSetting {
    /// 檢查並夾住設定值
    pub fn validated(mut self) -> Result<Self> {
        if self.grid_dimension <= 0 {
            return Err(ExposureError::InvalidDimension(self.grid_dimension));
        }
        let dimension = self.grid_dimension.clamp(MIN_GRID_DIMENSION, MAX_GRID_DIMENSION);
        if dimension != self.grid_dimension {
            log::warn!("grid_dimension {} 超出範圍，調整為 {}", self.grid_dimension, dimension);
            self.grid_dimension = dimension;
        }
        let percentage = self.time_slice_percentage.clamp(0, 100);
        if percentage != self.time_slice_percentage {
            log::warn!("time_slice_percentage {} 超出範圍，調整為 {}", self.time_slice_percentage, percentage);
            self.time_slice_percentage = percentage;
        }
        if self.worker_threads == Some(0) {
            self.worker_threads = None;
        }
        self.max_rays_per_batch = self.max_rays_per_batch.max(1);
        Ok(self)
    }

    /// 每個時間片的射線數量：max(1, ceil(格子數 × 百分比 / 100))
    pub fn rays_per_slice(&self, num_cells: usize) -> usize {
        let pct = self.time_slice_percentage.clamp(0, 100) as usize;
        ((num_cells * pct + 99) / 100).max(1)
    }

    pub fn default_worker_threads() -> usize {
        num_cpus::get().max(2) - 1
    }

    pub fn worker_thread_count(&self) -> usize {
        self.worker_threads.unwrap_or_else(Self::default_worker_threads)
    }

    /// 執行期可套用的欄位是否相同；`worker_threads` 只在建立執行緒池時使用，不列入比較
    pub fn same_live_values(&self, other: &ExposureSetting) -> bool {
        self.grid_dimension == other.grid_dimension
            && self.mode == other.mode
            && self.time_slice_percentage == other.time_slice_percentage
            && self.draw_rays == other.draw_rays
            && self.draw_exposure == other.draw_exposure
            && self.max_rays_per_batch == other.max_rays_per_batch
    }
}

/// 模擬驅動設定
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationSetting {
    pub tps: u64,
    pub seed: u64,
    pub obstacle_count: usize,
    /// 哨兵繞行半徑與角速度（弧度/秒）
    pub sentinel_radius: f32,
    pub sentinel_height: f32,
    pub sentinel_speed: f32,
    pub character_speed: f32,
    /// 0 表示不限 tick 數
    pub max_ticks: u64,
}

impl Default for SimulationSetting {
    fn default() -> Self {
        Self {
            tps: 30,
            seed: 1,
            obstacle_count: 12,
            sentinel_radius: 4.0,
            sentinel_height: 1.5,
            sentinel_speed: 0.5,
            character_speed: 3.0,
            max_ticks: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Setting {
    #[serde(default)]
    pub exposure: ExposureSetting,
    #[serde(default)]
    pub simulation: SimulationSetting,
}

impl Setting {
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut setting: Setting = toml::from_str(text)?;
        setting.exposure = setting.exposure.validated()?;
        Ok(setting)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)?;
        Self::from_toml(&str_val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_setting() {
        let text = r#"
            [exposure]
            grid_dimension = 40
            mode = "time_sliced"
            time_slice_percentage = 25
            draw_rays = false
            worker_threads = 3

            [simulation]
            tps = 60
            seed = 9
        "#;
        let setting = Setting::from_toml(text).unwrap();
        assert_eq!(setting.exposure.grid_dimension, 40);
        assert_eq!(setting.exposure.mode, ScheduleMode::TimeSliced);
        assert_eq!(setting.exposure.time_slice_percentage, 25);
        assert!(!setting.exposure.draw_rays);
        assert!(setting.exposure.draw_exposure);
        assert_eq!(setting.exposure.worker_threads, Some(3));
        assert_eq!(setting.simulation.tps, 60);
        assert_eq!(setting.simulation.seed, 9);
        assert_eq!(setting.simulation.obstacle_count, 12);
    }

    #[test]
    fn test_live_values_ignore_worker_threads() {
        let base = ExposureSetting::default();
        let other_pool = ExposureSetting { worker_threads: Some(7), ..Default::default() };
        assert!(base.same_live_values(&other_pool));

        let other_mode = ExposureSetting { mode: ScheduleMode::TimeSliced, ..Default::default() };
        assert!(!base.same_live_values(&other_mode));
        let other_limit = ExposureSetting { max_rays_per_batch: 10, ..Default::default() };
        assert!(!base.same_live_values(&other_limit));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let setting = Setting::from_toml("").unwrap();
        assert_eq!(setting.exposure, ExposureSetting::default());
        assert_eq!(setting.simulation, SimulationSetting::default());
    }

    #[test]
    fn test_reject_non_positive_dimension() {
        let setting = ExposureSetting { grid_dimension: 0, ..Default::default() };
        assert!(matches!(setting.validated(), Err(ExposureError::InvalidDimension(0))));

        let text = "[exposure]\ngrid_dimension = -4\n";
        assert!(Setting::from_toml(text).is_err());
    }

    #[test]
    fn test_clamp_out_of_range_values() {
        let setting = ExposureSetting {
            grid_dimension: 250,
            time_slice_percentage: 400,
            worker_threads: Some(0),
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(setting.grid_dimension, MAX_GRID_DIMENSION);
        assert_eq!(setting.time_slice_percentage, 100);
        assert_eq!(setting.worker_threads, None);

        let small = ExposureSetting { grid_dimension: 3, time_slice_percentage: -5, ..Default::default() }
            .validated()
            .unwrap();
        assert_eq!(small.grid_dimension, MIN_GRID_DIMENSION);
        assert_eq!(small.time_slice_percentage, 0);
    }

    #[test]
    fn test_rays_per_slice() {
        let mut setting = ExposureSetting::default();
        setting.time_slice_percentage = 10;
        assert_eq!(setting.rays_per_slice(100), 10);
        assert_eq!(setting.rays_per_slice(121), 13);
        setting.time_slice_percentage = 0;
        assert_eq!(setting.rays_per_slice(100), 1);
        setting.time_slice_percentage = 100;
        assert_eq!(setting.rays_per_slice(10_000), 10_000);
    }

    #[test]
    fn test_default_worker_threads_at_least_one() {
        assert!(ExposureSetting::default_worker_threads() >= 1);
    }
}
