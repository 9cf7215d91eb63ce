//! Error taxonomy.
//!
//! [`RunnerError`] values returned from the dispatcher are fatal for the
//! session: the dispatcher stops and releases its pool.  Recoverable
//! conditions (pool exhaustion, failed readback, detector declining a frame)
//! never surface as errors; they show up as [`crate::Step`] variants.

use std::path::PathBuf;

use thiserror::Error;

use crate::frame::FrameError;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("GPU image read is not supported by this platform / graphics context")]
    GpuReadUnsupported,

    #[error("image source is not ready")]
    SourceNotReady,

    #[error("frame pool must hold at least one buffer")]
    EmptyPool,

    #[error("GPU upload failed: {0}")]
    Gpu(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown {kind} {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}
