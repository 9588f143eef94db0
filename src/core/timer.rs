//! 帧计时器
//!
//! 每帧调用一次 `tick`，得到与上一帧之间的时间间隔。

use std::time::{Duration, Instant};

/// 帧计时器
#[derive(Debug)]
pub struct Timer {
    last: Instant,
    delta: Duration,
    frame_count: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            delta: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// 推进一帧，返回间隔秒数
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta = now.duration_since(self.last);
        self.last = now;
        self.frame_count += 1;
        self.delta.as_secs_f32()
    }

    /// 上一帧的时间间隔（秒）
    pub fn delta_time(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = Timer::new();
        assert_eq!(timer.delta_time(), 0.0);

        std::thread::sleep(Duration::from_millis(2));
        let dt = timer.tick();
        assert!(dt > 0.0);
        assert_eq!(timer.frame_count(), 1);
    }
}
