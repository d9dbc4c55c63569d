//! Sliding-window averaging of tracking signals.
//!
//! Larger windows are steadier but lag behind head movement; smaller
//! windows react faster and jitter more.

use crate::{constants::DEFAULT_SMOOTHING_WINDOW, signal::ExtractedSignal, Error, Result};
use nalgebra::Point2;
use std::collections::VecDeque;

/// Component-wise mean of the signal history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedSignal {
    pub eye_middle: Point2<f64>,
    pub face_area: f64,
}

/// Moving average over the most recent signals
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    window_size: usize,
    history: VecDeque<ExtractedSignal>,
}

impl TemporalSmoother {
    /// Create a smoother keeping at most `window_size` signals
    ///
    /// # Errors
    ///
    /// Returns an error if `window_size` is zero
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::InvalidInput("Window size must be greater than 0".to_string()));
        }

        Ok(Self {
            window_size,
            history: VecDeque::with_capacity(window_size),
        })
    }

    /// Add a signal, evicting the oldest one if the window is full
    pub fn push(&mut self, signal: ExtractedSignal) -> SmoothedSignal {
        if self.history.len() >= self.window_size {
            self.history.pop_front();
        }
        self.history.push_back(signal);

        let n = self.history.len() as f64;
        let (x, y, area) = self.history.iter().fold((0.0, 0.0, 0.0), |(x, y, area), s| {
            (x + s.eye_middle.x, y + s.eye_middle.y, area + s.face_area)
        });

        SmoothedSignal {
            eye_middle: Point2::new(x / n, y / n),
            face_area: area / n,
        }
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Number of signals currently averaged
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_SMOOTHING_WINDOW,
            history: VecDeque::with_capacity(DEFAULT_SMOOTHING_WINDOW),
        }
    }
}
