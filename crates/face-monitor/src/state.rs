//! Subject state tracking

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Eye closure verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EyeVerdict {
    #[default]
    Open,
    Sleeping,
}

/// Drowsiness state, mutated once per observed frame
#[derive(Debug, Clone, Default)]
pub struct DrowsinessState {
    /// When the current run of closed-eye frames began
    pub closure_start: Option<Instant>,
    /// Whether the closure has outlasted the sleep threshold
    pub is_sleeping: bool,
}

/// Debounced sleep detector
///
/// Eyes must stay below the closed threshold for longer than the sleep
/// threshold before `Sleeping` is reported. A single open observation
/// resets the timer and the verdict immediately.
#[derive(Debug, Clone)]
pub struct DrowsinessDetector {
    eye_closed_threshold: f64,
    sleep_threshold: Duration,
    state: DrowsinessState,
}

impl DrowsinessDetector {
    pub fn new(eye_closed_threshold: f64, sleep_threshold: Duration) -> Self {
        Self {
            eye_closed_threshold,
            sleep_threshold,
            state: DrowsinessState::default(),
        }
    }

    /// Feed one openness ratio observed at `now`; returns `is_sleeping`
    pub fn update(&mut self, ratio: f64, now: Instant) -> bool {
        if ratio < self.eye_closed_threshold {
            match self.state.closure_start {
                None => {
                    debug!("Eye closure started (ratio {:.3})", ratio);
                    self.state.closure_start = Some(now);
                }
                Some(start) => {
                    let closed_for = now.saturating_duration_since(start);
                    if closed_for > self.sleep_threshold && !self.state.is_sleeping {
                        info!("Eyes closed for {:.1}s, subject sleeping", closed_for.as_secs_f64());
                        self.state.is_sleeping = true;
                    }
                }
            }
        } else {
            self.mark_open();
        }

        self.state.is_sleeping
    }

    /// Treat the current frame as an open-eye observation
    pub fn mark_open(&mut self) {
        if self.state.is_sleeping {
            info!("Eyes opened, subject awake");
        }
        self.state.closure_start = None;
        self.state.is_sleeping = false;
    }

    pub fn is_sleeping(&self) -> bool {
        self.state.is_sleeping
    }

    pub fn verdict(&self) -> EyeVerdict {
        if self.state.is_sleeping {
            EyeVerdict::Sleeping
        } else {
            EyeVerdict::Open
        }
    }

    /// How long the eyes have been continuously closed as of `now`
    pub fn closed_for(&self, now: Instant) -> Option<Duration> {
        self.state
            .closure_start
            .map(|start| now.saturating_duration_since(start))
    }

    pub fn state(&self) -> &DrowsinessState {
        &self.state
    }

    /// Reset state (on subject change)
    pub fn reset(&mut self) {
        self.state = DrowsinessState::default();
    }
}
