/// 曝光引擎
///
/// 擁有網格、雙緩衝與排程器，對外提供每 tick 推進與查詢介面。
/// 尺寸或模式改變時一定先收回未完成批次，再釋放或重建緩衝。
use std::ops::Range;
use std::sync::Arc;

use rayon::ThreadPool;
use vek::Vec3;

use super::debug_draw::{self, DebugDraw};
use super::finder::NearestUnexposedFinder;
use super::grid::GridModel;
use super::pipeline::{create_worker_pool, RayBatchPipeline};
use super::scheduler::{ExposureScheduler, ScheduleMode, TickReport, TimeSliceCursor};
use super::store::ExposureStore;
use crate::config::ExposureSetting;
use crate::error::{ExposureError, Result};
use crate::scene::{PathFinder, SceneQuery};

pub struct ExposureEngine {
    setting: ExposureSetting,
    scene: Arc<dyn SceneQuery>,
    pathfinder: Box<dyn PathFinder>,
    scheduler: ExposureScheduler,
    grid: GridModel,
    store: ExposureStore,
    pipeline: RayBatchPipeline,
}

impl ExposureEngine {
    /// 建立引擎並配置自己的工作執行緒池
    pub fn new(
        setting: ExposureSetting,
        scene: Arc<dyn SceneQuery>,
        pathfinder: Box<dyn PathFinder>,
    ) -> Result<Self> {
        let setting = setting.validated()?;
        let pool = create_worker_pool(setting.worker_thread_count())?;
        Self::with_pool(setting, scene, pathfinder, pool)
    }

    /// 使用外部提供的執行緒池建立引擎
    pub fn with_pool(
        setting: ExposureSetting,
        scene: Arc<dyn SceneQuery>,
        pathfinder: Box<dyn PathFinder>,
        pool: Arc<ThreadPool>,
    ) -> Result<Self> {
        let setting = setting.validated()?;
        let grid = GridModel::new(setting.grid_dimension, scene.as_ref())?;
        let store = ExposureStore::new(grid.num_cells());
        let pipeline = RayBatchPipeline::new(Arc::clone(&scene), pool, setting.max_rays_per_batch);
        let scheduler = ExposureScheduler::new(setting.mode);
        log::info!(
            "exposure engine ready: {}x{} grid, mode {:?}",
            setting.grid_dimension,
            setting.grid_dimension,
            setting.mode
        );
        Ok(Self {
            setting,
            scene,
            pathfinder,
            scheduler,
            grid,
            store,
            pipeline,
        })
    }

    /// 套用新的設定；尺寸改變走重建路徑，模式改變走重啟路徑
    pub fn apply_setting(&mut self, setting: &ExposureSetting) -> Result<()> {
        let setting = setting.clone().validated()?;
        self.set_grid_dimension(setting.grid_dimension)?;
        self.set_mode(setting.mode);
        self.pipeline.set_max_rays_per_batch(setting.max_rays_per_batch);
        self.setting.time_slice_percentage = setting.time_slice_percentage;
        self.setting.draw_rays = setting.draw_rays;
        self.setting.draw_exposure = setting.draw_exposure;
        self.setting.max_rays_per_batch = setting.max_rays_per_batch;
        Ok(())
    }

    /// 改變網格尺寸，格子數不變時不做任何事
    ///
    /// 回傳是否真的重建
    pub fn set_grid_dimension(&mut self, dimension: i32) -> Result<bool> {
        if dimension <= 0 {
            return Err(ExposureError::InvalidDimension(dimension));
        }
        if (dimension as usize).pow(2) == self.grid.num_cells() {
            return Ok(false);
        }

        // 先收回在途批次，再丟棄舊緩衝
        self.scheduler.reboot(self.scheduler.mode());
        self.grid.resize(dimension, self.scene.as_ref())?;
        self.store = ExposureStore::new(self.grid.num_cells());
        self.setting.grid_dimension = dimension;
        Ok(true)
    }

    pub fn set_mode(&mut self, mode: ScheduleMode) {
        if mode == self.scheduler.mode() {
            return;
        }
        log::info!("exposure mode {:?} -> {:?}", self.scheduler.mode(), mode);
        self.scheduler.reboot(mode);
        self.setting.mode = mode;
    }

    /// 強制收回在途批次並回到一輪開始，模式不變
    pub fn reboot(&mut self) {
        self.scheduler.reboot(self.scheduler.mode());
    }

    /// 推進一個 tick
    pub fn tick(&mut self, eye_pos: Vec3<f32>) -> Result<TickReport> {
        let budget = self.setting.rays_per_slice(self.grid.num_cells());
        let result = self.scheduler.advance(eye_pos, budget, &self.grid, &mut self.store, &self.pipeline);
        if let Err(e) = &result {
            log::warn!("exposure tick failed in {:?}: {}", self.scheduler.mode(), e);
        }
        result
    }

    /// 世界座標是否曝光；網格外或尚未完成任何一輪時為 `false`
    pub fn is_exposed(&self, pos: Vec3<f32>) -> bool {
        self.grid
            .cell_at(pos)
            .map_or(false, |index| self.store.read(index))
    }

    pub fn find_nearest_unexposed(&mut self, pos: Vec3<f32>) -> Option<Vec3<f32>> {
        NearestUnexposedFinder::find_nearest_unexposed(
            pos,
            &self.grid,
            &mut self.store,
            self.pathfinder.as_ref(),
        )
    }

    /// 繪製本 tick 涵蓋範圍的射線
    pub fn draw_rays(&self, eye_pos: Vec3<f32>, cells: Range<usize>, sink: &mut dyn DebugDraw) {
        let end = cells.end.min(self.grid.num_cells());
        let start = cells.start.min(end);
        debug_draw::draw_rays(eye_pos, start..end, &self.grid, &self.store, sink);
    }

    pub fn draw_exposure(&self, sink: &mut dyn DebugDraw) {
        debug_draw::draw_exposure_map(&self.grid, &self.store, sink);
    }

    pub fn setting(&self) -> &ExposureSetting {
        &self.setting
    }

    pub fn mode(&self) -> ScheduleMode {
        self.scheduler.mode()
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn store(&self) -> &ExposureStore {
        &self.store
    }

    /// 目前提交給查詢的曝光結果
    pub fn exposure_map(&self) -> &[bool] {
        self.store.front()
    }

    pub fn has_pending_batch(&self) -> bool {
        self.scheduler.has_pending()
    }

    pub fn time_slice_cursor(&self) -> Option<TimeSliceCursor> {
        self.scheduler.cursor()
    }
}

impl Drop for ExposureEngine {
    fn drop(&mut self) {
        // 執行緒池可能隨 pipeline 一起釋放，批次要先收回
        self.reboot();
    }
}
