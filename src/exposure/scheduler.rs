/// 曝光排程器
///
/// 每個 tick 依照目前模式推進一次曝光計算。跨 tick 的狀態（未完成批次、
/// 分時游標、該輪的視點）只存在於需要它們的模式變體裡。
use std::ops::Range;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vek::Vec3;

use super::grid::GridModel;
use super::pipeline::{PendingBatch, RayBatchPipeline};
use super::store::ExposureStore;
use crate::error::Result;

/// 排程策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// 呼叫端執行緒逐格測試，直接寫前緩衝
    Synchronous,
    /// 平行批次，同一 tick 內等待完成
    ParallelSameTick,
    /// 平行批次，下一個 tick 才收回並交換（延遲一個 tick）
    ParallelDeferred,
    /// 每個 tick 只處理一段格子，整輪完成後交換
    TimeSliced,
}

impl ScheduleMode {
    pub const ALL: [ScheduleMode; 4] = [
        ScheduleMode::Synchronous,
        ScheduleMode::ParallelSameTick,
        ScheduleMode::ParallelDeferred,
        ScheduleMode::TimeSliced,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScheduleMode::Synchronous => "synchronous",
            ScheduleMode::ParallelSameTick => "parallel_same_tick",
            ScheduleMode::ParallelDeferred => "parallel_deferred",
            ScheduleMode::TimeSliced => "time_sliced",
        }
    }
}

impl std::str::FromStr for ScheduleMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        ScheduleMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.name() == key)
            .ok_or_else(|| format!("unknown mode '{}', expected one of: synchronous, parallel_same_tick, parallel_deferred, time_sliced", s))
    }
}

/// 分時游標
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSliceCursor {
    /// 下一段從這個格子索引開始
    At(usize),
    /// 本輪已全部提交，下次呼叫先交換緩衝再開新的一輪
    PassComplete,
}

impl Default for TimeSliceCursor {
    fn default() -> Self {
        TimeSliceCursor::At(0)
    }
}

enum SchedulerState {
    Synchronous,
    ParallelSameTick,
    ParallelDeferred {
        pending: Option<PendingBatch>,
    },
    TimeSliced {
        pending: Option<PendingBatch>,
        cursor: TimeSliceCursor,
        /// 本輪開始時鎖定的視點
        pass_eye: Vec3<f32>,
    },
}

impl SchedulerState {
    fn fresh(mode: ScheduleMode) -> Self {
        match mode {
            ScheduleMode::Synchronous => SchedulerState::Synchronous,
            ScheduleMode::ParallelSameTick => SchedulerState::ParallelSameTick,
            ScheduleMode::ParallelDeferred => SchedulerState::ParallelDeferred { pending: None },
            ScheduleMode::TimeSliced => SchedulerState::TimeSliced {
                pending: None,
                cursor: TimeSliceCursor::At(0),
                pass_eye: Vec3::zero(),
            },
        }
    }

    fn mode(&self) -> ScheduleMode {
        match self {
            SchedulerState::Synchronous => ScheduleMode::Synchronous,
            SchedulerState::ParallelSameTick => ScheduleMode::ParallelSameTick,
            SchedulerState::ParallelDeferred { .. } => ScheduleMode::ParallelDeferred,
            SchedulerState::TimeSliced { .. } => ScheduleMode::TimeSliced,
        }
    }
}

/// 單一 tick 的執行結果
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mode: ScheduleMode,
    /// 本 tick 測試或提交的射線數
    pub rays: usize,
    /// 本 tick 新工作涵蓋的格子範圍
    pub cells: Range<usize>,
    /// 前緩衝是否在本 tick 更新成新的一輪結果
    pub committed: bool,
    pub elapsed: Duration,
}

pub struct ExposureScheduler {
    state: SchedulerState,
}

impl ExposureScheduler {
    pub fn new(mode: ScheduleMode) -> Self {
        Self {
            state: SchedulerState::fresh(mode),
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.state.mode()
    }

    pub fn has_pending(&self) -> bool {
        match &self.state {
            SchedulerState::ParallelDeferred { pending } => pending.is_some(),
            SchedulerState::TimeSliced { pending, .. } => pending.is_some(),
            _ => false,
        }
    }

    /// 分時游標，非分時模式回傳 `None`
    pub fn cursor(&self) -> Option<TimeSliceCursor> {
        match &self.state {
            SchedulerState::TimeSliced { cursor, .. } => Some(*cursor),
            _ => None,
        }
    }

    /// 等待並丟棄未完成批次，回到一輪開始的狀態
    pub fn reboot(&mut self, mode: ScheduleMode) {
        let previous = std::mem::replace(&mut self.state, SchedulerState::fresh(mode));
        match previous {
            SchedulerState::ParallelDeferred { pending: Some(batch) }
            | SchedulerState::TimeSliced { pending: Some(batch), .. } => batch.discard(),
            _ => {}
        }
        log::debug!("exposure scheduler rebooted into {:?}", mode);
    }

    /// 推進一個 tick
    ///
    /// `slice_budget` 只在分時模式使用
    pub fn advance(
        &mut self,
        eye_pos: Vec3<f32>,
        slice_budget: usize,
        grid: &GridModel,
        store: &mut ExposureStore,
        pipeline: &RayBatchPipeline,
    ) -> Result<TickReport> {
        let start = Instant::now();
        let num_cells = grid.num_cells();
        let mode = self.mode();

        let (rays, cells, committed) = match &mut self.state {
            SchedulerState::Synchronous => {
                let rays = pipeline.cast_inline(eye_pos, 0..num_cells, grid, store.front_mut());
                (rays, 0..num_cells, true)
            }
            SchedulerState::ParallelSameTick => {
                let batch = pipeline.build_and_submit(eye_pos, 0..num_cells, grid)?;
                let rays = batch.ray_count();
                batch.join(store.front_mut())?;
                (rays, 0..num_cells, true)
            }
            SchedulerState::ParallelDeferred { pending } => {
                let mut committed = false;
                if let Some(batch) = pending.take() {
                    batch.join(store.back_mut())?;
                    store.swap();
                    committed = true;
                }
                let batch = pipeline.build_and_submit(eye_pos, 0..num_cells, grid)?;
                let rays = batch.ray_count();
                *pending = Some(batch);
                (rays, 0..num_cells, committed)
            }
            SchedulerState::TimeSliced { pending, cursor, pass_eye } => {
                if let Some(batch) = pending.take() {
                    if let Err(e) = batch.join(store.back_mut()) {
                        // 本輪作廢，下個 tick 從頭開始（提交失敗同樣處理）
                        *cursor = TimeSliceCursor::At(0);
                        return Err(e);
                    }
                }

                let mut committed = false;
                if *cursor == TimeSliceCursor::PassComplete {
                    store.swap();
                    *cursor = TimeSliceCursor::At(0);
                    committed = true;
                    log::trace!("time-sliced pass committed");
                }

                let base = match *cursor {
                    TimeSliceCursor::At(base) => base.min(num_cells),
                    TimeSliceCursor::PassComplete => 0,
                };
                let budget = slice_budget.max(1).min(num_cells - base);
                if base == 0 {
                    *pass_eye = eye_pos;
                }

                let batch = match pipeline.build_and_submit(*pass_eye, base..base + budget, grid) {
                    Ok(batch) => batch,
                    Err(e) => {
                        *cursor = TimeSliceCursor::At(0);
                        return Err(e);
                    }
                };
                let rays = batch.ray_count();
                *pending = Some(batch);

                let next = base + budget;
                *cursor = if next >= num_cells {
                    TimeSliceCursor::PassComplete
                } else {
                    TimeSliceCursor::At(next)
                };
                (rays, base..base + budget, committed)
            }
        };

        let elapsed = start.elapsed();
        log::trace!("exposure tick {:?}: {} rays over {:?} in {:?}", mode, rays, cells, elapsed);
        Ok(TickReport {
            mode,
            rays,
            cells,
            committed,
            elapsed,
        })
    }
}

impl Drop for ExposureScheduler {
    fn drop(&mut self) {
        let mode = self.mode();
        self.reboot(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        for mode in ScheduleMode::ALL {
            assert_eq!(mode.name().parse::<ScheduleMode>(), Ok(mode));
        }
        assert_eq!("Time-Sliced".parse::<ScheduleMode>(), Ok(ScheduleMode::TimeSliced));
        assert!("async".parse::<ScheduleMode>().is_err());
    }
}
