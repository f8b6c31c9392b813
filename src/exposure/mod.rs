/// 曝光系統模組
///
/// 每個 tick 由視點對網格格子中心做視線測試，維護一份可查詢的曝光圖
pub mod grid;
pub mod store;
pub mod pipeline;
pub mod scheduler;
pub mod finder;
pub mod engine;
pub mod debug_draw;

pub use self::{
    grid::{GridModel, CELL_SIZE, CLEARANCE_PROBE_HEIGHT},
    store::ExposureStore,
    pipeline::{create_worker_pool, PendingBatch, RayBatchPipeline},
    scheduler::{ExposureScheduler, ScheduleMode, TickReport, TimeSliceCursor},
    finder::NearestUnexposedFinder,
    engine::ExposureEngine,
    debug_draw::{DebugDraw, DrawLine, DrawQuad, DrawRecorder},
};
