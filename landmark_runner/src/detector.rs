//! Contract for the external hand-landmark detector, plus the clock used to
//! timestamp video and live-stream submissions.

use std::time::Instant;

use hand_flow::DetectionResult;
use thiserror::Error;

use crate::frame::{Image, TransformHints};

/// Per-call options forwarded to the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageProcessingOptions {
    pub rotation_degrees: i32,
}

impl From<TransformHints> for ImageProcessingOptions {
    fn from(h: TransformHints) -> Self {
        ImageProcessingOptions { rotation_degrees: h.rotation_degrees }
    }
}

/// Invoked by a live-stream detector, on whatever thread it likes, with the
/// result, the image it was computed from and the submission timestamp.
pub type ResultCallback = Box<dyn FnMut(DetectionResult, Image, i64) + Send>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector rejected the frame: {0}")]
    Rejected(String),

    #[error("detector is closed")]
    Closed,
}

pub trait Detector {
    /// Synchronous detection for image and video modes.  `timestamp_ms` is
    /// `None` in image mode.  Fills `out` and returns whether any hand was
    /// found; on `false` the contents of `out` are unspecified.
    fn detect(
        &mut self,
        image: &Image,
        timestamp_ms: Option<i64>,
        options: &ImageProcessingOptions,
        out: &mut DetectionResult,
    ) -> bool;

    /// Asynchronous detection for live-stream mode.  The result arrives via
    /// the callback registered when the detector was built.
    fn detect_async(
        &mut self,
        image: Image,
        timestamp_ms: i64,
        options: &ImageProcessingOptions,
    ) -> Result<(), DetectorError>;
}

pub trait Clock {
    /// Milliseconds since the session started.
    fn elapsed_ms(&self) -> i64;
}

#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed_ms(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_is_forwarded() {
        let hints = TransformHints { flip_horizontally: true, flip_vertically: false, rotation_degrees: 90 };
        assert_eq!(ImageProcessingOptions::from(hints).rotation_degrees, 90);
    }

    #[test]
    fn monotonic_clock_does_not_go_back() {
        let c = MonotonicClock::new();
        let a = c.elapsed_ms();
        let b = c.elapsed_ms();
        assert!(a >= 0 && b >= a);
    }
}
