//! Touch-driven wheel: vertical drags move z directly, no smoothing.

use tracing::debug;

use crate::wheel::{Transform, WheelBody, WheelConfig, WheelUpdate};

/// Extra scale applied to `move_speed` so pixel deltas map to small z steps.
const DRAG_SCALE: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Began,
    Moved,
    Ended,
    Canceled,
}

/// Wheel driven by the first touch.  Dragging up (screen y increasing)
/// moves toward `z_min` (100 %); dragging down moves toward `z_max`.
#[derive(Clone, Debug)]
pub struct TouchWheel {
    cfg:        WheelConfig,
    body:       WheelBody,
    drag_start: Option<f32>,
}

impl TouchWheel {
    pub fn new(cfg: WheelConfig, initial: Transform) -> Self {
        let body = WheelBody::new(&cfg, initial);
        TouchWheel { cfg, body, drag_start: None }
    }

    pub fn body(&self) -> &WheelBody { &self.body }
    pub fn z(&self) -> f32           { self.body.z() }
    pub fn percentage(&self) -> f32  { self.body.percentage() }
    pub fn is_dragging(&self) -> bool { self.drag_start.is_some() }

    /// Feed one touch sample.  Returns an update only for a move while
    /// dragging.
    pub fn touch(&mut self, phase: TouchPhase, screen_y: f32) -> Option<WheelUpdate> {
        match phase {
            TouchPhase::Began => {
                self.drag_start = Some(screen_y);
                None
            }
            TouchPhase::Moved => {
                let start = self.drag_start?;
                let delta_y = start - screen_y;
                let new_z = self.body.z() + delta_y * self.cfg.move_speed * DRAG_SCALE;
                let update = self.body.move_to(&self.cfg, new_z);
                self.drag_start = Some(screen_y);
                debug!("drag Δy {:.1}, wheel z {:.4}, percentage {}", delta_y, update.z, update.text);
                Some(update)
            }
            TouchPhase::Ended | TouchPhase::Canceled => {
                self.drag_start = None;
                None
            }
        }
    }

    /// Per-tick housekeeping: x/y stay pinned.
    pub fn tick(&mut self) {
        self.body.pin();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_wheel() -> TouchWheel {
        let cfg = WheelConfig { move_speed: 0.1, rotation_speed: 10.0, ..WheelConfig::default() };
        TouchWheel::new(cfg, Transform::at(0.0, 0.0, 0.0))
    }

    #[test]
    fn move_without_begin_is_ignored() {
        let mut w = touch_wheel();
        assert!(w.touch(TouchPhase::Moved, 10.0).is_none());
        assert_eq!(w.z(), 0.0);
    }

    #[test]
    fn drag_direction_and_scale() {
        let mut w = touch_wheel();
        w.touch(TouchPhase::Began, 100.0);
        // start − y = +50 → z grows by 50 · 0.1 · 0.01
        let u = w.touch(TouchPhase::Moved, 50.0).unwrap();
        assert!((u.z - 0.05).abs() < 1e-6);
        assert!((u.rotation_delta_deg + 0.5).abs() < 1e-4);
    }

    #[test]
    fn drag_origin_follows_finger() {
        let mut w = touch_wheel();
        w.touch(TouchPhase::Began, 100.0);
        w.touch(TouchPhase::Moved, 90.0);
        let before = w.z();
        w.touch(TouchPhase::Moved, 90.0);
        assert_eq!(w.z(), before);
    }

    #[test]
    fn drag_is_clamped() {
        let mut w = touch_wheel();
        w.touch(TouchPhase::Began, 0.0);
        w.touch(TouchPhase::Moved, 100_000.0);
        assert_eq!(w.z(), -0.212);
        assert_eq!(w.percentage(), 100.0);
        w.touch(TouchPhase::Moved, -100_000.0);
        assert_eq!(w.z(), 0.266);
    }

    #[test]
    fn end_stops_dragging() {
        let mut w = touch_wheel();
        w.touch(TouchPhase::Began, 0.0);
        assert!(w.is_dragging());
        w.touch(TouchPhase::Canceled, 0.0);
        assert!(!w.is_dragging());
        assert!(w.touch(TouchPhase::Moved, 50.0).is_none());
    }
}
