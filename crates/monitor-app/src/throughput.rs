//! Processed frame rate tracking

use std::time::Instant;

/// Counts processed frames and reports the average rate periodically
#[derive(Debug, Clone)]
pub struct Throughput {
    started: Instant,
    frames: u64,
    report_every: u64,
}

impl Throughput {
    pub fn new(started: Instant, report_every: u64) -> Self {
        Self {
            started,
            frames: 0,
            report_every: report_every.max(1),
        }
    }

    /// Count one frame; every `report_every` frames returns FPS since start
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames % self.report_every != 0 {
            return None;
        }
        Some(self.fps(now))
    }

    pub fn fps(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reports_every_n_frames() {
        let t0 = Instant::now();
        let mut meter = Throughput::new(t0, 30);
        let mut reports = Vec::new();
        for i in 1..=90u32 {
            if let Some(fps) = meter.record(t0 + Duration::from_millis(100) * i) {
                reports.push(fps);
            }
        }
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|fps| (fps - 10.0).abs() < 1e-6));
    }

    #[test]
    fn test_zero_elapsed() {
        let t0 = Instant::now();
        let meter = Throughput::new(t0, 1);
        assert_eq!(meter.fps(t0), 0.0);
    }
}
