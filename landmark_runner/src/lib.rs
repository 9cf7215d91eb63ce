//! # landmark_runner
//!
//! Feeds camera frames to an external hand-landmark detector once per display
//! refresh and hands the resulting flow signal to whoever drives the wheel.
//!
//! ## Pieces
//!
//! | Module | Role |
//! |---|---|
//! | [`config`] | acquisition / running mode, pool size, detector thresholds |
//! | [`frame`] | `FrameSource` contract, `FrameBuffer`, detector-ready `Image` |
//! | [`pool`] | bounded `FramePool` with RAII `FrameLease`s |
//! | [`detector`] | `Detector` contract and the submission clock |
//! | [`dispatcher`] | tick-driven acquisition → detection state machine |
//! | [`relay`] | latest-value flow handoff across threads |
//!
//! ## Threads
//!
//! The dispatcher, pool and [`FlowRelay`] consumer all live on the render
//! tick.  Only a live-stream detector calls back from elsewhere, and the only
//! thing it touches is the [`FlowPublisher`] end of the relay.

pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod pool;
pub mod relay;

pub use config::{AcquisitionMode, DetectorOptions, RunnerConfig, RunningMode};
pub use detector::{Clock, Detector, DetectorError, ImageProcessingOptions, MonotonicClock, ResultCallback};
pub use dispatcher::{
    DetectOutcome, DispatchStats, Dispatcher, SkipReason, Step, Submission, Suspension, Wake,
};
pub use error::{ConfigError, RunnerError};
pub use frame::{
    FrameBuffer, FrameError, FrameSource, GpuContext, GpuTexture, Image, ImageData,
    PendingReadback, RawImage, ReadbackError, TransformHints, BYTES_PER_PIXEL,
};
pub use pool::{FrameLease, FramePool};
pub use relay::{flow_relay, FlowEvent, FlowPublisher, FlowRelay};
