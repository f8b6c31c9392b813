/// 射線批次管線
///
/// 由一段格子範圍與視點建立射線命令，切成連續區塊丟給工作執行緒池，
/// 再把布林結果收回指定的曝光緩衝。工作執行緒只計算命中結果，
/// 寫入緩衝一律在呼叫端執行緒的 join 階段完成。
use std::ops::Range;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use rayon::{ThreadPool, ThreadPoolBuilder};
use vek::Vec3;

use super::grid::GridModel;
use crate::error::{ExposureError, Result};
use crate::scene::{RaycastCommand, RaycastHit, SceneQuery};

/// 建立射線工作執行緒池
pub fn create_worker_pool(num_threads: usize) -> Result<Arc<ThreadPool>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(move |i| format!("exposure-ray-{}", i))
        .panic_handler(|_| log::error!("ray batch worker panicked, batch will fail to join"))
        .build()?;
    log::info!("exposure worker pool started with {} threads", pool.current_num_threads());
    Ok(Arc::new(pool))
}

struct ChunkResult {
    chunk: usize,
    hits: Vec<RaycastHit>,
}

/// 已提交、尚未收回的射線批次
///
/// 未 join 就被丟棄時會阻塞直到所有工作區塊回報，批次不會被留在工作執行緒底下
pub struct PendingBatch {
    cells: Range<usize>,
    /// 每條射線對應的全域格子索引
    lanes: Vec<usize>,
    chunk_size: usize,
    chunks: Vec<Option<Vec<RaycastHit>>>,
    remaining: usize,
    rx: Receiver<ChunkResult>,
}

impl PendingBatch {
    /// 本批次涵蓋的格子範圍 `[base, base + count)`
    pub fn cells(&self) -> Range<usize> {
        self.cells.clone()
    }

    /// 實際送出的射線數（不含不可通行格子）
    pub fn ray_count(&self) -> usize {
        self.lanes.len()
    }

    /// 非阻塞地收取已完成的區塊，全部完成時回傳 `true`
    pub fn poll(&mut self) -> bool {
        while self.remaining > 0 {
            match self.rx.try_recv() {
                Ok(result) => self.accept(result),
                Err(_) => break,
            }
        }
        self.remaining == 0
    }

    /// 等待全部區塊並把結果寫入 `target`，不可通行格子不會被寫入
    ///
    /// 回傳本批次中曝光的格子數
    pub fn join(mut self, target: &mut [bool]) -> Result<usize> {
        self.wait()?;

        let mut exposed_count = 0;
        for (chunk, hits) in self.chunks.iter().enumerate() {
            let lo = chunk * self.chunk_size;
            let hi = (lo + self.chunk_size).min(self.lanes.len());
            let hits = hits.as_deref().unwrap_or(&[]);
            if hits.len() != hi - lo {
                return Err(ExposureError::ResultCountMismatch {
                    expected: hi - lo,
                    got: hits.len(),
                });
            }
        }
        for (chunk, hits) in self.chunks.iter().enumerate() {
            let lo = chunk * self.chunk_size;
            for (lane, hit) in self.lanes[lo..].iter().zip(hits.iter().flatten()) {
                let exposed = hit.is_clear();
                target[*lane] = exposed;
                exposed_count += exposed as usize;
            }
        }
        Ok(exposed_count)
    }

    /// 等待完成後丟棄結果
    pub fn discard(mut self) {
        if let Err(e) = self.wait() {
            log::warn!("discarded ray batch {:?} had failed: {}", self.cells, e);
        }
    }

    fn wait(&mut self) -> Result<()> {
        while self.remaining > 0 {
            match self.rx.recv() {
                Ok(result) => self.accept(result),
                Err(_) => {
                    let missing = self.remaining;
                    self.remaining = 0;
                    return Err(ExposureError::BatchJoin {
                        missing,
                        total: self.chunks.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn accept(&mut self, result: ChunkResult) {
        let slot = &mut self.chunks[result.chunk];
        if slot.is_none() {
            *slot = Some(result.hits);
            self.remaining -= 1;
        }
    }
}

impl Drop for PendingBatch {
    fn drop(&mut self) {
        if self.remaining > 0 {
            log::debug!("joining unresolved ray batch {:?} before drop", self.cells);
            let _ = self.wait();
        }
    }
}

/// 射線批次管線
pub struct RayBatchPipeline {
    scene: Arc<dyn SceneQuery>,
    pool: Arc<ThreadPool>,
    max_rays_per_batch: usize,
}

impl RayBatchPipeline {
    pub fn new(scene: Arc<dyn SceneQuery>, pool: Arc<ThreadPool>, max_rays_per_batch: usize) -> Self {
        Self {
            scene,
            pool,
            max_rays_per_batch: max_rays_per_batch.max(1),
        }
    }

    pub fn scene(&self) -> &dyn SceneQuery {
        self.scene.as_ref()
    }

    pub fn set_max_rays_per_batch(&mut self, limit: usize) {
        self.max_rays_per_batch = limit.max(1);
    }

    /// 工作數量
    pub fn num_jobs(&self) -> usize {
        self.pool.current_num_threads().max(1)
    }

    /// 每個工作分到的連續射線數
    pub fn job_batch_size(&self, total: usize) -> usize {
        ((total + self.num_jobs() - 1) / self.num_jobs()).max(1)
    }

    /// 在呼叫端執行緒逐格測試射線並直接寫入 `target`
    ///
    /// 回傳送出的射線數
    pub fn cast_inline(
        &self,
        eye_pos: Vec3<f32>,
        cells: Range<usize>,
        grid: &GridModel,
        target: &mut [bool],
    ) -> usize {
        let mut rays = 0;
        for index in cells {
            if !grid.is_navigable(index) {
                continue;
            }
            let cmd = RaycastCommand::between(eye_pos, grid.center(index));
            let hit = RaycastHit::from(self.scene.raycast(cmd.origin, cmd.direction, cmd.max_distance));
            target[index] = hit.is_clear();
            rays += 1;
        }
        rays
    }

    /// 建立射線命令並提交到工作執行緒池，不等待結果
    pub fn build_and_submit(
        &self,
        eye_pos: Vec3<f32>,
        cells: Range<usize>,
        grid: &GridModel,
    ) -> Result<PendingBatch> {
        if cells.len() > self.max_rays_per_batch {
            return Err(ExposureError::BatchTooLarge {
                requested: cells.len(),
                limit: self.max_rays_per_batch,
            });
        }

        let mut lanes = Vec::with_capacity(cells.len());
        let mut commands = Vec::with_capacity(cells.len());
        for index in cells.clone() {
            if !grid.is_navigable(index) {
                continue;
            }
            lanes.push(index);
            commands.push(RaycastCommand::between(eye_pos, grid.center(index)));
        }

        let chunk_size = self.job_batch_size(commands.len());
        let num_chunks = (commands.len() + chunk_size - 1) / chunk_size;
        let commands: Arc<[RaycastCommand]> = commands.into();
        let (tx, rx) = bounded(num_chunks.max(1));

        for chunk in 0..num_chunks {
            let lo = chunk * chunk_size;
            let hi = (lo + chunk_size).min(commands.len());
            let tx = tx.clone();
            let scene = Arc::clone(&self.scene);
            let commands = Arc::clone(&commands);
            self.pool.spawn(move || {
                let hits = scene.batch_raycast(&commands[lo..hi]);
                let _ = tx.send(ChunkResult { chunk, hits });
            });
        }
        drop(tx);

        log::trace!(
            "submitted ray batch {:?}: {} rays in {} chunks",
            cells,
            lanes.len(),
            num_chunks
        );
        Ok(PendingBatch {
            cells,
            lanes,
            chunk_size,
            chunks: vec![None; num_chunks],
            remaining: num_chunks,
            rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Aabb, BoxScene};

    /// 中央一道牆，將地圖分成左右兩半
    fn wall_scene() -> Arc<dyn SceneQuery> {
        Arc::new(BoxScene::new(vec![
            Aabb::new(Vec3::new(0.1, 0.0, -5.0), Vec3::new(0.9, 3.0, 5.0)),
        ]))
    }

    fn pipeline(scene: Arc<dyn SceneQuery>) -> RayBatchPipeline {
        RayBatchPipeline::new(scene, create_worker_pool(3).unwrap(), 1 << 16)
    }

    #[test]
    fn test_batch_matches_inline() {
        let scene = wall_scene();
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let pipeline = pipeline(scene);
        let eye = Vec3::new(-3.2, 1.0, 0.3);

        let mut inline = vec![false; grid.num_cells()];
        let inline_rays = pipeline.cast_inline(eye, 0..grid.num_cells(), &grid, &mut inline);

        let mut batched = vec![false; grid.num_cells()];
        let batch = pipeline.build_and_submit(eye, 0..grid.num_cells(), &grid).unwrap();
        assert_eq!(batch.ray_count(), inline_rays);
        batch.join(&mut batched).unwrap();

        assert_eq!(inline, batched);
        assert!(inline.iter().any(|e| *e));
        assert!(inline.iter().zip(grid.clearance()).any(|(e, nav)| *nav && !*e));
    }

    #[test]
    fn test_non_navigable_cells_left_untouched() {
        let scene = wall_scene();
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let pipeline = pipeline(scene);

        // 先塗上記號，join 後不可通行格子必須保持原值
        let mut target: Vec<bool> = (0..grid.num_cells()).map(|i| i % 2 == 0).collect();
        let before = target.clone();
        pipeline
            .build_and_submit(Vec3::new(-3.0, 1.0, 0.0), 0..grid.num_cells(), &grid)
            .unwrap()
            .join(&mut target)
            .unwrap();
        for i in 0..grid.num_cells() {
            if !grid.is_navigable(i) {
                assert_eq!(target[i], before[i]);
            }
        }
    }

    #[test]
    fn test_partial_range_only_writes_range() {
        let scene: Arc<dyn SceneQuery> = Arc::new(BoxScene::default());
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let pipeline = pipeline(scene);

        let mut target = vec![false; grid.num_cells()];
        let mut batch = pipeline.build_and_submit(Vec3::new(0.0, 1.0, 0.0), 20..35, &grid).unwrap();
        assert_eq!(batch.cells(), 20..35);
        while !batch.poll() {
            std::thread::yield_now();
        }
        assert_eq!(batch.join(&mut target).unwrap(), 15);
        for (i, exposed) in target.iter().enumerate() {
            assert_eq!(*exposed, (20..35).contains(&i));
        }
    }

    #[test]
    fn test_empty_range_resolves_immediately() {
        let scene: Arc<dyn SceneQuery> = Arc::new(BoxScene::default());
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let pipeline = pipeline(scene);
        let mut batch = pipeline.build_and_submit(Vec3::zero(), 5..5, &grid).unwrap();
        assert!(batch.poll());
        let mut target = vec![false; grid.num_cells()];
        assert_eq!(batch.join(&mut target).unwrap(), 0);
    }

    #[test]
    fn test_oversized_batch_is_refused() {
        let scene: Arc<dyn SceneQuery> = Arc::new(BoxScene::default());
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let mut pipeline = pipeline(scene);
        pipeline.set_max_rays_per_batch(50);
        let result = pipeline.build_and_submit(Vec3::zero(), 0..100, &grid);
        assert!(matches!(
            result,
            Err(ExposureError::BatchTooLarge { requested: 100, limit: 50 })
        ));
    }

    #[test]
    fn test_job_batch_size_covers_total() {
        let scene: Arc<dyn SceneQuery> = Arc::new(BoxScene::default());
        let pipeline = pipeline(scene);
        assert_eq!(pipeline.num_jobs(), 3);
        assert_eq!(pipeline.job_batch_size(100), 34);
        assert_eq!(pipeline.job_batch_size(2), 1);
        assert_eq!(pipeline.job_batch_size(0), 1);
    }

    struct PanickingScene;

    impl SceneQuery for PanickingScene {
        fn raycast(&self, _: Vec3<f32>, _: Vec3<f32>, _: f32) -> Option<f32> {
            None
        }

        fn batch_raycast(&self, _: &[RaycastCommand]) -> Vec<RaycastHit> {
            panic!("scene unavailable");
        }
    }

    #[test]
    fn test_worker_panic_fails_join() {
        let scene: Arc<dyn SceneQuery> = Arc::new(PanickingScene);
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let pipeline = pipeline(scene);
        let batch = pipeline.build_and_submit(Vec3::zero(), 0..100, &grid).unwrap();
        let mut target = vec![false; grid.num_cells()];
        assert!(matches!(batch.join(&mut target), Err(ExposureError::BatchJoin { .. })));
        assert!(target.iter().all(|e| !e));
    }

    struct ShortScene;

    impl SceneQuery for ShortScene {
        fn raycast(&self, _: Vec3<f32>, _: Vec3<f32>, _: f32) -> Option<f32> {
            None
        }

        fn batch_raycast(&self, commands: &[RaycastCommand]) -> Vec<RaycastHit> {
            vec![RaycastHit::NONE; commands.len().saturating_sub(1)]
        }
    }

    #[test]
    fn test_short_result_is_rejected() {
        let scene: Arc<dyn SceneQuery> = Arc::new(ShortScene);
        let grid = GridModel::new(10, scene.as_ref()).unwrap();
        let pipeline = pipeline(scene);
        let batch = pipeline.build_and_submit(Vec3::zero(), 0..100, &grid).unwrap();
        let mut target = vec![false; grid.num_cells()];
        assert!(matches!(
            batch.join(&mut target),
            Err(ExposureError::ResultCountMismatch { .. })
        ));
        assert!(target.iter().all(|e| !e));
    }
}
