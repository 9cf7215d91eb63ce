//! # flow_wheel
//!
//! The roller-clamp wheel of an IV line, modelled along a single axis.
//!
//! * [`WheelController`] — driven by the 0–1 flow signal with first-order
//!   exponential smoothing.
//! * [`TouchWheel`] — driven directly by vertical touch drags.
//! * [`readout`] — percentage label and IV flow rate derived from z.
//! * [`WaterDrop`] — drip-chamber animation whose speed follows the
//!   percentage.
//!
//! ## Mapping
//!
//! | z | flow | percentage |
//! |---|---|---|
//! | `z_min` | 1 | 100 % |
//! | `z_max` | 0 | 0 % |
//!
//! ```rust
//! use flow_wheel::{Transform, WheelConfig, WheelController};
//!
//! let mut wheel = WheelController::new(WheelConfig::default(), Transform::at(0.0, 0.0, 0.266));
//! for _ in 0..120 {
//!     wheel.tick(Some(1.0), 1.0 / 30.0);
//! }
//! assert!(wheel.percentage() > 99.9);
//! ```

pub mod readout;
pub mod wheel;
pub mod touch;
pub mod drop;

pub use readout::{
    flow_rate_ml_per_hour, format_flow_rate, format_percentage, percentage, DEFAULT_MAX_FLOW_RATE,
};
pub use wheel::{Transform, WheelBody, WheelConfig, WheelController, WheelUpdate};
pub use touch::{TouchPhase, TouchWheel};
pub use drop::{DropConfig, DropEvent, WaterDrop};
