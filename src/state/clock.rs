/// 固定頻率時鐘
use std::time::{Duration, Instant};

pub struct Clock {
    target_dt: Duration,
    last_tick: Instant,
    dt: Duration,
    total_ticks: u64,
}

impl Clock {
    pub fn new(target_dt: Duration) -> Self {
        Self {
            target_dt,
            last_tick: Instant::now(),
            dt: target_dt,
            total_ticks: 0,
        }
    }

    /// 上一個 tick 實際經過的時間
    pub fn dt(&self) -> Duration {
        self.dt
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// 睡到下一個 tick
    pub fn tick(&mut self) {
        let busy = self.last_tick.elapsed();
        if let Some(remaining) = self.target_dt.checked_sub(busy) {
            spin_sleep::sleep(remaining);
        } else {
            log::debug!("tick over budget by {:?}", busy - self.target_dt);
        }
        let now = Instant::now();
        self.dt = now - self.last_tick;
        self.last_tick = now;
        self.total_ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_waits_for_target() {
        let mut clock = Clock::new(Duration::from_millis(5));
        clock.tick();
        clock.tick();
        assert_eq!(clock.total_ticks(), 2);
        assert!(clock.dt() >= Duration::from_millis(4));
    }
}
