//! The flow-driven wheel: first-order smoothing of z toward a flow target,
//! with rolling rotation coupled to linear motion.
//!
//! ```text
//! target = lerp(z_min, z_max, 1 − flow)          flow 1 → z_min, flow 0 → z_max
//! z'     = lerp(z, target, dt · smoothing_speed)
//! pitch += −(z' − z_prev) · rotation_speed
//! ```

use serde::Deserialize;
use tracing::{debug, warn};

use crate::readout::{format_percentage, lerp, percentage};

// ════════════════════════════════════════════════════════════════════════════
// WheelConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    /// z at 100 % (flow = 1, thumb on the index finger).
    pub z_min: f32,
    /// z at 0 % (flow = 0, thumb on the little finger).
    pub z_max: f32,
    /// Degrees of roll per unit of z travel.
    pub rotation_speed: f32,
    /// Rate constant of the exponential approach (per second).
    pub smoothing_speed: f32,
    /// Touch sensitivity, used by [`crate::TouchWheel`] only.
    pub move_speed: f32,
}

impl Default for WheelConfig {
    fn default() -> Self {
        WheelConfig {
            z_min:           -0.212,
            z_max:            0.266,
            rotation_speed:   1.0,
            smoothing_speed:  5.0,
            move_speed:       0.001,
        }
    }
}

impl WheelConfig {
    /// `(low, high)` regardless of how `z_min`/`z_max` were supplied.
    pub fn bounds(&self) -> (f32, f32) {
        (self.z_min.min(self.z_max), self.z_min.max(self.z_max))
    }

    pub fn clamp_z(&self, z: f32) -> f32 {
        let (lo, hi) = self.bounds();
        z.clamp(lo, hi)
    }

    /// z the wheel heads toward for a given flow.
    pub fn target_z(&self, flow: f32) -> f32 {
        let t = 1.0 - flow.clamp(0.0, 1.0);
        lerp(self.z_min, self.z_max, t)
    }

    pub fn percentage(&self, z: f32) -> f32 {
        percentage(z, self.z_min, self.z_max)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transform / WheelUpdate
// ════════════════════════════════════════════════════════════════════════════

/// Local pose of the control.  `pitch_deg` is the accumulated roll about
/// the local x axis, kept in [0, 360).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    pub position:  [f32; 3],
    pub pitch_deg: f32,
}

impl Transform {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Transform { position: [x, y, z], pitch_deg: 0.0 }
    }

    pub fn z(&self) -> f32 { self.position[2] }

    /// Relative rotation about the local x axis.
    pub fn rotate_pitch(&mut self, degrees: f32) {
        self.pitch_deg = (self.pitch_deg + degrees).rem_euclid(360.0);
    }
}

/// What changed on one wheel move, ready to be pushed to the display.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelUpdate {
    pub z:                  f32,
    pub rotation_delta_deg: f32,
    pub percentage:         f32,
    pub text:               String,
}

// ════════════════════════════════════════════════════════════════════════════
// WheelBody: state shared by the flow and touch controllers
// ════════════════════════════════════════════════════════════════════════════

/// Single-axis body: x/y pinned to their initial values, z bounded.
#[derive(Clone, Debug)]
pub struct WheelBody {
    transform:  Transform,
    initial_xy: (f32, f32),
    previous_z: f32,
    percentage: f32,
}

impl WheelBody {
    pub fn new(cfg: &WheelConfig, initial: Transform) -> Self {
        let mut transform = initial;
        let z = if initial.z().is_finite() {
            cfg.clamp_z(initial.z())
        } else {
            warn!("initial wheel z {} is not finite, starting closed", initial.z());
            cfg.z_max
        };
        if initial.z().is_finite() && z != initial.z() {
            warn!("initial wheel z {:.4} outside [{:.4}, {:.4}], clamped", initial.z(), cfg.z_min, cfg.z_max);
        }
        transform.position[2] = z;
        let body = WheelBody {
            transform,
            initial_xy: (initial.position[0], initial.position[1]),
            previous_z: z,
            percentage: cfg.percentage(z),
        };
        debug!(
            "initial wheel position {:?}, initial percentage {:.1}%",
            body.transform.position, body.percentage
        );
        body
    }

    pub fn z(&self) -> f32                { self.transform.z() }
    pub fn previous_z(&self) -> f32       { self.previous_z }
    pub fn initial_xy(&self) -> (f32, f32) { self.initial_xy }
    pub fn transform(&self) -> &Transform { &self.transform }
    pub fn percentage(&self) -> f32       { self.percentage }
    pub fn percentage_text(&self) -> String { format_percentage(self.percentage) }

    /// Reset x/y to their initial values.
    pub fn pin(&mut self) {
        self.transform.position[0] = self.initial_xy.0;
        self.transform.position[1] = self.initial_xy.1;
    }

    /// Move to `new_z` (clamped), roll by the z change since the last move
    /// and refresh the percentage.
    pub fn move_to(&mut self, cfg: &WheelConfig, new_z: f32) -> WheelUpdate {
        let new_z = cfg.clamp_z(new_z);
        self.transform.position[2] = new_z;
        self.pin();

        let rotation = -(new_z - self.previous_z) * cfg.rotation_speed;
        self.transform.rotate_pitch(rotation);
        self.previous_z = new_z;

        self.percentage = cfg.percentage(new_z);
        WheelUpdate {
            z:                  new_z,
            rotation_delta_deg: rotation,
            percentage:         self.percentage,
            text:               format_percentage(self.percentage),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// WheelController
// ════════════════════════════════════════════════════════════════════════════

/// Distance at which the wheel snaps onto its target.
const SETTLE_EPS: f32 = 1e-6;

/// Flow-driven wheel.  Feed it the newest flow value (if any) once per tick.
#[derive(Clone, Debug)]
pub struct WheelController {
    cfg:  WheelConfig,
    body: WheelBody,
}

impl WheelController {
    pub fn new(cfg: WheelConfig, initial: Transform) -> Self {
        let body = WheelBody::new(&cfg, initial);
        WheelController { cfg, body }
    }

    pub fn config(&self) -> &WheelConfig { &self.cfg }
    pub fn body(&self) -> &WheelBody     { &self.body }
    pub fn z(&self) -> f32               { self.body.z() }
    pub fn percentage(&self) -> f32      { self.body.percentage() }

    /// One simulation tick.  `None` means no new signal: the wheel keeps
    /// its place (x/y still pinned).
    pub fn tick(&mut self, latest_flow: Option<f32>, dt: f32) -> Option<WheelUpdate> {
        match latest_flow {
            Some(flow) => Some(self.apply_flow(flow, dt)),
            None => {
                self.body.pin();
                None
            }
        }
    }

    /// Smooth toward the target for `flow` over a tick of `dt` seconds.
    pub fn apply_flow(&mut self, flow: f32, dt: f32) -> WheelUpdate {
        let flow = if flow.is_finite() { flow.clamp(0.0, 1.0) } else { 0.0 };
        let target = self.cfg.target_z(flow);
        let mut new_z = lerp(self.body.z(), target, dt.max(0.0) * self.cfg.smoothing_speed);
        // rounding can park the lerp one ulp short of its target
        if (target - new_z).abs() <= SETTLE_EPS {
            new_z = target;
        }
        let update = self.body.move_to(&self.cfg, new_z);
        debug!(
            "flow {:.3}, wheel z {:.4}, percentage {}",
            flow, update.z, update.text
        );
        update
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
