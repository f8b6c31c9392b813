/// 模擬狀態核心結構
///
/// 哨兵繞圈移動作為視點，角色在目的地曝光時改找最近的未曝光格子

use std::sync::Arc;
use std::time::Duration;
use vek::Vec3;

use crate::config::{ExposureSetting, Setting, SimulationSetting};
use crate::error::Result;
use crate::exposure::{DrawRecorder, ExposureEngine, TickReport};
use crate::scene::{BoxScene, DirectPathFinder, SceneQuery};

/// 單一 tick 允許的最大時間步長
const MAX_DELTA_TIME: f32 = 0.25;

/// 哨兵（視點）
#[derive(Debug, Clone)]
pub struct Sentinel {
    pub center: Vec3<f32>,
    pub radius: f32,
    pub height: f32,
    /// 弧度/秒
    pub angular_speed: f32,
    pub angle: f32,
}

impl Sentinel {
    pub fn eye_pos(&self) -> Vec3<f32> {
        self.center + Vec3::new(self.angle.cos() * self.radius, self.height, self.angle.sin() * self.radius)
    }

    pub fn advance(&mut self, dt: f32) {
        self.angle = (self.angle + self.angular_speed * dt) % std::f32::consts::TAU;
    }
}

/// 會躲避視線的角色
#[derive(Debug, Clone)]
pub struct Character {
    pub position: Vec3<f32>,
    pub destination: Vec3<f32>,
    pub speed: f32,
}

impl Character {
    /// 直接放到指定位置並停下
    pub fn place(&mut self, pos: Vec3<f32>) {
        self.position = pos;
        self.destination = pos;
    }

    pub fn set_destination(&mut self, destination: Vec3<f32>) {
        self.destination = destination;
    }

    pub fn arrived(&self) -> bool {
        self.position.distance(self.destination) <= f32::EPSILON
    }

    pub fn advance(&mut self, dt: f32) {
        let to = self.destination - self.position;
        let distance = to.magnitude();
        let step = self.speed * dt;
        if distance <= step {
            self.position = self.destination;
        } else {
            self.position += to / distance * step;
        }
    }
}

/// 模擬核心狀態
pub struct State {
    engine: ExposureEngine,
    /// 期望的設定，下個 tick 開始時套用到引擎
    setting: ExposureSetting,
    sentinel: Sentinel,
    character: Character,
    draw: DrawRecorder,
    last_report: Option<TickReport>,
    ticks: u64,
    passes: u64,
    failed_ticks: u64,
    retargets: u64,
}

impl State {
    /// 以設定的種子產生隨機障礙物場景
    pub fn new(setting: &Setting) -> Result<Self> {
        let sim = &setting.simulation;
        let extent = (setting.exposure.grid_dimension as f32 * 0.5 - 1.0).max(1.0);
        let scene = BoxScene::random(sim.seed, sim.obstacle_count, extent);
        log::info!("generated scene with {} obstacles (seed {})", scene.boxes().len(), sim.seed);
        Self::with_scene(setting, Arc::new(scene))
    }

    pub fn with_scene(setting: &Setting, scene: Arc<dyn SceneQuery>) -> Result<Self> {
        let exposure = setting.exposure.clone().validated()?;
        let sim: &SimulationSetting = &setting.simulation;
        let pathfinder = Box::new(DirectPathFinder::new(Arc::clone(&scene)));
        let engine = ExposureEngine::new(exposure.clone(), scene, pathfinder)?;

        let quarter = engine.grid().dimension() / 4;
        let start = engine.grid().cell_center(quarter, quarter);
        Ok(Self {
            engine,
            setting: exposure,
            sentinel: Sentinel {
                center: Vec3::zero(),
                radius: sim.sentinel_radius,
                height: sim.sentinel_height,
                angular_speed: sim.sentinel_speed,
                angle: 0.0,
            },
            character: Character {
                position: start,
                destination: start,
                speed: sim.character_speed,
            },
            draw: DrawRecorder::default(),
            last_report: None,
            ticks: 0,
            passes: 0,
            failed_ticks: 0,
            retargets: 0,
        })
    }

    /// 模擬主循環 tick
    pub fn tick(&mut self, dt: Duration) -> Result<()> {
        let dt = dt.as_secs_f32().min(MAX_DELTA_TIME);

        // 尺寸或模式改變時走重建/重啟路徑
        if !self.setting.same_live_values(self.engine.setting()) {
            self.engine.apply_setting(&self.setting)?;
        }

        self.draw.clear();
        self.sentinel.advance(dt);
        let eye = self.sentinel.eye_pos();

        match self.engine.tick(eye) {
            Ok(report) => {
                if report.committed {
                    self.passes += 1;
                }
                if self.setting.draw_rays {
                    self.engine.draw_rays(eye, report.cells.clone(), &mut self.draw);
                }
                self.last_report = Some(report);
            }
            Err(e) => {
                // 本輪放棄，下個 tick 重新提交
                self.failed_ticks += 1;
                log::warn!("曝光計算失敗，下個 tick 重試: {}", e);
            }
        }

        if self.engine.is_exposed(self.character.destination) {
            if let Some(hidden) = self.engine.find_nearest_unexposed(self.character.destination) {
                log::debug!(
                    "destination ({:.1}, {:.1}) exposed, retarget to ({:.1}, {:.1})",
                    self.character.destination.x,
                    self.character.destination.z,
                    hidden.x,
                    hidden.z
                );
                self.character.set_destination(hidden);
                self.retargets += 1;
            }
        }
        self.character.advance(dt);

        if self.setting.draw_exposure {
            self.engine.draw_exposure(&mut self.draw);
        }
        self.ticks += 1;
        Ok(())
    }

    /// 更新期望設定，無效的設定直接拒絕
    pub fn set_setting(&mut self, setting: ExposureSetting) -> Result<()> {
        self.setting = setting.validated()?;
        Ok(())
    }

    pub fn setting(&self) -> &ExposureSetting {
        &self.setting
    }

    pub fn engine(&self) -> &ExposureEngine {
        &self.engine
    }

    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    pub fn sentinel_mut(&mut self) -> &mut Sentinel {
        &mut self.sentinel
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }

    pub fn draw(&self) -> &DrawRecorder {
        &self.draw
    }

    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 已提交到前緩衝的完整輪數
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks
    }

    pub fn retargets(&self) -> u64 {
        self.retargets
    }
}
