//! Per-refresh acquisition and detection dispatch.
//!
//! The dispatcher is a tick-driven state machine.  The host calls
//! [`Dispatcher::step`] with [`Wake::Refresh`] at the start of every display
//! refresh and with [`Wake::EndOfFrame`] once rendering has finished.  Each
//! call either makes progress or reports the suspension point it is parked
//! on; nothing blocks.
//!
//! ```text
//!             Refresh                 EndOfFrame
//!   Idle ──────────────► FrameEnd ─────────────────► submit ──► Idle
//!     │  (gpu, cpu)                                    ▲
//!     │                                               │ ready
//!     └────────────────► Readback ── poll ────────────┘
//!        (cpu-async)        │ error
//!                           └──────► skip ──► Idle
//! ```
//!
//! The frame buffer travels inside the state as a [`FrameLease`], so it is
//! returned to the pool on every path out of a state, including `stop`.

use std::task::Poll;

use hand_flow::DetectionResult;
use tracing::{debug, info, warn};

use crate::config::{AcquisitionMode, RunnerConfig, RunningMode};
use crate::detector::{Clock, Detector, ImageProcessingOptions, MonotonicClock};
use crate::error::RunnerError;
use crate::frame::{FrameSource, GpuContext, Image, PendingReadback};
use crate::pool::{FrameLease, FramePool};
use crate::relay::FlowPublisher;

// ════════════════════════════════════════════════════════════════════════════
// Public step vocabulary
// ════════════════════════════════════════════════════════════════════════════

/// What the host is telling the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// A new display refresh has begun.
    Refresh,
    /// Rendering for the current refresh has finished.
    EndOfFrame,
}

/// Where the dispatcher is parked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suspension {
    Paused,
    AwaitingRefresh,
    AwaitingBuffer,
    AwaitingFrameEnd,
    AwaitingReadback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    ReadbackFailed,
    FrameUnavailable,
    DetectorRejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectOutcome {
    Found { hands: usize },
    NotFound,
    /// Submitted to a live-stream detector; the result arrives on the relay.
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Submission {
    pub timestamp_ms: Option<i64>,
    pub outcome:      DetectOutcome,
    /// Flow published for synchronous modes.
    pub flow:         Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    Suspended(Suspension),
    Submitted(Submission),
    Skipped(SkipReason),
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub submitted: u64,
    pub skipped:   u64,
    /// Refreshes on which no buffer was free.
    pub exhausted: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// State
// ════════════════════════════════════════════════════════════════════════════

enum State {
    Idle,
    /// GPU image already uploaded, or CPU read still to do.
    FrameEnd { lease: FrameLease, image: Option<Image> },
    Readback { lease: FrameLease, pending: Box<dyn PendingReadback> },
    Stopped,
}

pub struct Dispatcher<S: FrameSource, D: Detector> {
    config:         RunnerConfig,
    source:         S,
    detector:       D,
    pool:           FramePool,
    publisher:      FlowPublisher,
    gpu:            Option<Box<dyn GpuContext>>,
    clock:          Box<dyn Clock>,
    result:         DetectionResult,
    state:          State,
    paused:         bool,
    last_timestamp: Option<i64>,
    stats:          DispatchStats,
}

impl<S: FrameSource, D: Detector> Dispatcher<S, D> {
    /// Validate the configuration against the injected collaborators.
    /// GPU acquisition without a [`GpuContext`] is rejected here, never
    /// discovered mid-session.
    pub fn new(
        config:    RunnerConfig,
        source:    S,
        detector:  D,
        publisher: FlowPublisher,
        gpu:       Option<Box<dyn GpuContext>>,
    ) -> Result<Self, RunnerError> {
        if config.pool_size == 0 {
            return Err(RunnerError::EmptyPool);
        }
        if config.acquisition == AcquisitionMode::Gpu && gpu.is_none() {
            return Err(RunnerError::GpuReadUnsupported);
        }
        if !source.is_ready() {
            return Err(RunnerError::SourceNotReady);
        }

        let (width, height) = source.dimensions();
        let opts = config.detector_options();
        info!(
            acquisition = %config.acquisition,
            running_mode = %config.running_mode,
            pool_size = config.pool_size,
            num_hands = opts.num_hands,
            min_hand_detection_confidence = opts.min_hand_detection_confidence,
            min_hand_presence_confidence = opts.min_hand_presence_confidence,
            min_tracking_confidence = opts.min_tracking_confidence,
            width,
            height,
            "landmark runner configured"
        );

        Ok(Dispatcher {
            pool: FramePool::new(config.pool_size, width, height),
            result: DetectionResult::default(),
            config,
            source,
            detector,
            publisher,
            gpu,
            clock: Box::new(MonotonicClock::new()),
            state: State::Idle,
            paused: false,
            last_timestamp: None,
            stats: DispatchStats::default(),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &RunnerConfig     { &self.config }
    pub fn source(&self) -> &S                { &self.source }
    pub fn source_mut(&mut self) -> &mut S    { &mut self.source }
    pub fn detector_mut(&mut self) -> &mut D  { &mut self.detector }
    pub fn pool(&self) -> &FramePool          { &self.pool }
    pub fn stats(&self) -> DispatchStats      { self.stats }
    pub fn is_paused(&self) -> bool           { self.paused }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, State::Stopped)
    }

    /// Suspend before the next acquisition.  A frame already in flight
    /// still completes.
    pub fn pause(&mut self)  { self.paused = true; }
    pub fn resume(&mut self) { self.paused = false; }

    /// Leave the loop for good: the in-flight lease (if any) is released and
    /// the pool closed.
    pub fn stop(&mut self) {
        if !self.is_stopped() {
            self.state = State::Stopped;
            self.pool.close();
            info!(submitted = self.stats.submitted, skipped = self.stats.skipped, "landmark runner stopped");
        }
    }

    /// Advance by one wake-up.  An `Err` is fatal: the dispatcher has
    /// already stopped when it is returned.
    pub fn step(&mut self, wake: Wake) -> Result<Step, RunnerError> {
        match self.advance(wake) {
            Ok(step) => Ok(step),
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    fn advance(&mut self, wake: Wake) -> Result<Step, RunnerError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Stopped => {
                self.state = State::Stopped;
                Ok(Step::Stopped)
            }
            State::Idle => self.acquire(wake),
            State::FrameEnd { lease, image } => {
                if wake != Wake::EndOfFrame {
                    self.state = State::FrameEnd { lease, image };
                    return Ok(Step::Suspended(Suspension::AwaitingFrameEnd));
                }
                let image = match image {
                    Some(img) => img,
                    None => match self.read_cpu(lease) {
                        Some(img) => img,
                        None => return Ok(self.skip(SkipReason::FrameUnavailable)),
                    },
                };
                Ok(self.submit(image))
            }
            State::Readback { mut lease, mut pending } => match pending.poll() {
                Poll::Pending => {
                    self.state = State::Readback { lease, pending };
                    Ok(Step::Suspended(Suspension::AwaitingReadback))
                }
                Poll::Ready(Err(e)) => {
                    warn!(error = %e, "async readback failed; frame skipped");
                    drop(lease);
                    Ok(self.skip(SkipReason::ReadbackFailed))
                }
                Poll::Ready(Ok(data)) => {
                    let hints = self.source.transform_hints();
                    if let Err(e) = lease.write_readback(&data, hints) {
                        warn!(error = %e, "async readback returned a malformed frame; frame skipped");
                        return Ok(self.skip(SkipReason::ReadbackFailed));
                    }
                    let image = lease.to_image();
                    drop(lease);
                    Ok(self.submit(image))
                }
            },
        }
    }

    fn acquire(&mut self, wake: Wake) -> Result<Step, RunnerError> {
        if self.paused {
            return Ok(Step::Suspended(Suspension::Paused));
        }
        if wake != Wake::Refresh {
            return Ok(Step::Suspended(Suspension::AwaitingRefresh));
        }
        let Some(mut lease) = self.pool.try_acquire() else {
            self.stats.exhausted += 1;
            debug!(capacity = self.pool.capacity(), "frame pool exhausted; retrying next refresh");
            return Ok(Step::Suspended(Suspension::AwaitingBuffer));
        };

        match self.config.acquisition {
            AcquisitionMode::Gpu => {
                if !self.source.is_ready() {
                    return Ok(self.skip(SkipReason::FrameUnavailable));
                }
                let hints = self.source.transform_hints();
                if let Err(e) = lease.read_from(&self.source.current_frame(), hints) {
                    warn!(error = %e, "frame read failed; frame skipped");
                    return Ok(self.skip(SkipReason::FrameUnavailable));
                }
                let gpu = self.gpu.as_mut().ok_or(RunnerError::GpuReadUnsupported)?;
                let texture = gpu.upload(&lease)?;
                let image = Image::gpu(lease.width(), lease.height(), texture);
                self.state = State::FrameEnd { lease, image: Some(image) };
            }
            AcquisitionMode::Cpu => {
                self.state = State::FrameEnd { lease, image: None };
            }
            AcquisitionMode::CpuAsync => {
                let pending = self.source.request_readback();
                self.state = State::Readback { lease, pending };
                return Ok(Step::Suspended(Suspension::AwaitingReadback));
            }
        }
        Ok(Step::Suspended(Suspension::AwaitingFrameEnd))
    }

    /// Synchronous read at end of frame.  The lease is released as soon as
    /// the pixels are copied out.
    fn read_cpu(&mut self, mut lease: FrameLease) -> Option<Image> {
        if !self.source.is_ready() {
            debug!("image source not ready; frame skipped");
            return None;
        }
        let hints = self.source.transform_hints();
        if let Err(e) = lease.read_from(&self.source.current_frame(), hints) {
            warn!(error = %e, "frame read failed; frame skipped");
            return None;
        }
        Some(lease.to_image())
    }

    fn skip(&mut self, reason: SkipReason) -> Step {
        self.stats.skipped += 1;
        Step::Skipped(reason)
    }

    fn next_timestamp(&mut self) -> i64 {
        let now = self.clock.elapsed_ms();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn submit(&mut self, image: Image) -> Step {
        let options = ImageProcessingOptions::from(self.source.transform_hints());

        let timestamp_ms = match self.config.running_mode {
            RunningMode::Image => None,
            RunningMode::Video => Some(self.next_timestamp()),
            RunningMode::LiveStream => {
                let ts = self.next_timestamp();
                return match self.detector.detect_async(image, ts, &options) {
                    Ok(()) => {
                        self.stats.submitted += 1;
                        debug!(timestamp_ms = ts, "frame submitted to live-stream detector");
                        Step::Submitted(Submission { timestamp_ms: Some(ts), outcome: DetectOutcome::Pending, flow: None })
                    }
                    Err(e) => {
                        warn!(error = %e, timestamp_ms = ts, "live-stream detector refused the frame");
                        self.skip(SkipReason::DetectorRejected)
                    }
                };
            }
        };

        let found = self.detector.detect(&image, timestamp_ms, &options, &mut self.result);
        if !found {
            self.result.clear();
        }
        let outcome = if found && !self.result.is_empty() {
            DetectOutcome::Found { hands: self.result.hands.len() }
        } else {
            DetectOutcome::NotFound
        };

        let event_ts = timestamp_ms.unwrap_or_else(|| self.clock.elapsed_ms());
        // the event takes the detector's output; the slot starts the next frame empty
        let result = std::mem::take(&mut self.result);
        let flow = self.publisher.publish_result(result, event_ts);
        self.stats.submitted += 1;
        debug!(?timestamp_ms, ?outcome, flow, "frame detected");

        Step::Submitted(Submission { timestamp_ms, outcome, flow: Some(flow) })
    }
}
