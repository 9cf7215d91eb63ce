//! Runner configuration: acquisition mode, running mode, pool size and the
//! detector thresholds handed to the external hand-landmark model.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// How pixel data is read from the image source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionMode {
    /// Read on the graphics path; needs a GPU context.
    Gpu,
    /// Synchronous CPU read at end of frame.
    Cpu,
    /// Asynchronous CPU readback.
    #[default]
    CpuAsync,
}

/// How the detector is invoked per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunningMode {
    Image,
    Video,
    #[default]
    LiveStream,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AcquisitionMode::Gpu      => "gpu",
            AcquisitionMode::Cpu      => "cpu",
            AcquisitionMode::CpuAsync => "cpu-async",
        })
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunningMode::Image      => "image",
            RunningMode::Video      => "video",
            RunningMode::LiveStream => "live-stream",
        })
    }
}

impl FromStr for AcquisitionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu"                             => Ok(AcquisitionMode::Gpu),
            "cpu"                             => Ok(AcquisitionMode::Cpu),
            "cpu-async" | "cpuasync" | "async" => Ok(AcquisitionMode::CpuAsync),
            other => Err(ConfigError::UnknownVariant { kind: "acquisition mode", value: other.to_string() }),
        }
    }
}

impl FromStr for RunningMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image"                               => Ok(RunningMode::Image),
            "video"                               => Ok(RunningMode::Video),
            "live-stream" | "livestream" | "live" => Ok(RunningMode::LiveStream),
            other => Err(ConfigError::UnknownVariant { kind: "running mode", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub acquisition:                   AcquisitionMode,
    pub running_mode:                  RunningMode,
    /// Number of reusable frame buffers.
    pub pool_size:                     usize,
    pub num_hands:                     usize,
    pub min_hand_detection_confidence: f32,
    pub min_hand_presence_confidence:  f32,
    pub min_tracking_confidence:       f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            acquisition:                   AcquisitionMode::default(),
            running_mode:                  RunningMode::default(),
            pool_size:                     10,
            num_hands:                     1,
            min_hand_detection_confidence: 0.5,
            min_hand_presence_confidence:  0.5,
            min_tracking_confidence:       0.5,
        }
    }
}

/// Options for constructing the external detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorOptions {
    pub running_mode:                  RunningMode,
    pub num_hands:                     usize,
    pub min_hand_detection_confidence: f32,
    pub min_hand_presence_confidence:  f32,
    pub min_tracking_confidence:       f32,
}

impl RunnerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    /// Thresholds clamped to [0, 1] and at least one hand.
    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            running_mode:                  self.running_mode,
            num_hands:                     self.num_hands.max(1),
            min_hand_detection_confidence: self.min_hand_detection_confidence.clamp(0.0, 1.0),
            min_hand_presence_confidence:  self.min_hand_presence_confidence.clamp(0.0, 1.0),
            min_tracking_confidence:       self.min_tracking_confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RunnerConfig::default();
        assert_eq!(c.acquisition, AcquisitionMode::CpuAsync);
        assert_eq!(c.running_mode, RunningMode::LiveStream);
        assert_eq!(c.pool_size, 10);
    }

    #[test]
    fn parse_partial_toml() {
        let c = RunnerConfig::from_toml_str(
            "acquisition = \"cpu\"\nrunning_mode = \"video\"\npool_size = 4\n",
        ).unwrap();
        assert_eq!(c.acquisition, AcquisitionMode::Cpu);
        assert_eq!(c.running_mode, RunningMode::Video);
        assert_eq!(c.pool_size, 4);
        assert_eq!(c.num_hands, 1);
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        assert!(RunnerConfig::from_toml_str("acquisition = \"vulkan\"").is_err());
    }

    #[test]
    fn display_names_parse_back() {
        for m in [AcquisitionMode::Gpu, AcquisitionMode::Cpu, AcquisitionMode::CpuAsync] {
            assert_eq!(m.to_string().parse::<AcquisitionMode>().unwrap(), m);
        }
        for m in [RunningMode::Image, RunningMode::Video, RunningMode::LiveStream] {
            assert_eq!(m.to_string().parse::<RunningMode>().unwrap(), m);
        }
        assert!("sideways".parse::<RunningMode>().is_err());
    }

    #[test]
    fn detector_options_are_clamped() {
        let c = RunnerConfig {
            num_hands: 0,
            min_tracking_confidence: 3.0,
            ..RunnerConfig::default()
        };
        let o = c.detector_options();
        assert_eq!(o.num_hands, 1);
        assert_eq!(o.min_tracking_confidence, 1.0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RunnerConfig::from_file("/nonexistent/runner.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
