//! Drip-chamber animation: one drop at a time falls at a speed proportional
//! to the wheel's opening percentage.

use serde::Deserialize;
use tracing::debug;

use crate::readout::lerp;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DropConfig {
    pub y_start:     f32,
    pub y_end:       f32,
    /// Fall speed at 0 %.
    pub min_speed:   f32,
    /// Fall speed at 100 %.
    pub max_speed:   f32,
    /// Seconds between a drop finishing and the next one appearing.
    pub cycle_delay: f32,
}

impl Default for DropConfig {
    fn default() -> Self {
        DropConfig {
            y_start:     2.0,
            y_end:       1.0,
            min_speed:   0.0,
            max_speed:   2.0,
            cycle_delay: 1.0,
        }
    }
}

/// What happened to the drop on one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DropEvent {
    Spawned,
    Falling { y: f32 },
    /// Reached the bottom of the chamber.
    Landed,
    /// Removed because the clamp closed (0 %).
    Cleared,
    /// No drop; counting down or the clamp is closed.
    Waiting,
    /// A drop exists but the fall speed is zero.
    Stalled,
}

#[derive(Clone, Debug)]
pub struct WaterDrop {
    cfg:      DropConfig,
    origin_y: f32,
    drop_y:   Option<f32>,
    timer:    f32,
}

impl WaterDrop {
    /// Starts with a drop already at `origin_y` when the clamp is open.
    pub fn new(cfg: DropConfig, origin_y: f32, percentage: f32) -> Self {
        let mut d = WaterDrop { cfg, origin_y, drop_y: None, timer: 0.0 };
        d.spawn(percentage);
        d
    }

    pub fn drop_y(&self) -> Option<f32> { self.drop_y }
    pub fn origin_y(&self) -> f32       { self.origin_y }

    /// y at which a falling drop is removed.
    pub fn floor_y(&self) -> f32 {
        self.origin_y + self.cfg.y_end - self.cfg.y_start
    }

    pub fn speed_for(&self, percentage: f32) -> f32 {
        lerp(self.cfg.min_speed, self.cfg.max_speed, percentage / 100.0)
    }

    pub fn tick(&mut self, percentage: f32, dt: f32) -> DropEvent {
        let speed = self.speed_for(percentage);

        match self.drop_y {
            Some(_) if percentage <= 0.0 => {
                self.finish();
                debug!("percentage is 0%, water drop cleared");
                DropEvent::Cleared
            }
            Some(y) if speed > 0.0 => {
                let y = y - speed * dt;
                if y <= self.floor_y() {
                    self.finish();
                    DropEvent::Landed
                } else {
                    self.drop_y = Some(y);
                    DropEvent::Falling { y }
                }
            }
            Some(_) => DropEvent::Stalled,
            None => {
                self.timer -= dt;
                if self.timer <= 0.0 && self.spawn(percentage) {
                    DropEvent::Spawned
                } else {
                    DropEvent::Waiting
                }
            }
        }
    }

    fn finish(&mut self) {
        self.drop_y = None;
        self.timer = self.cfg.cycle_delay;
    }

    fn spawn(&mut self, percentage: f32) -> bool {
        if self.drop_y.is_some() || percentage <= 0.0 {
            return false;
        }
        self.drop_y = Some(self.origin_y);
        debug!("new water drop at y = {:.2}", self.origin_y);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wheel::{Transform, WheelConfig, WheelController};

    #[test]
    fn closed_clamp_never_spawns() {
        let mut d = WaterDrop::new(DropConfig::default(), 0.0, 0.0);
        assert!(d.drop_y().is_none());
        for _ in 0..100 {
            assert_eq!(d.tick(0.0, 0.1), DropEvent::Waiting);
        }
    }

    #[test]
    fn drop_falls_and_lands_then_waits() {
        let mut d = WaterDrop::new(DropConfig::default(), 0.0, 100.0);
        assert_eq!(d.drop_y(), Some(0.0));
        // full speed 2.0/s, chamber height 1.0 → lands within 0.5 s
        assert_eq!(d.tick(100.0, 0.25), DropEvent::Falling { y: -0.5 });
        assert_eq!(d.tick(100.0, 0.25), DropEvent::Landed);
        // cycle delay 1.0 s
        assert_eq!(d.tick(100.0, 0.5), DropEvent::Waiting);
        assert_eq!(d.tick(100.0, 0.5), DropEvent::Spawned);
    }

    #[test]
    fn closing_clears_drop() {
        let mut d = WaterDrop::new(DropConfig::default(), 0.0, 50.0);
        assert_eq!(d.tick(0.0, 0.1), DropEvent::Cleared);
        assert!(d.drop_y().is_none());
    }

    #[test]
    fn speed_follows_percentage() {
        let d = WaterDrop::new(DropConfig::default(), 0.0, 0.0);
        assert_eq!(d.speed_for(0.0), 0.0);
        assert_eq!(d.speed_for(50.0), 1.0);
        assert_eq!(d.speed_for(100.0), 2.0);
    }

    #[test]
    fn open_clamp_with_zero_speed_stalls() {
        let cfg = DropConfig { max_speed: 0.0, ..DropConfig::default() };
        let mut d = WaterDrop::new(cfg, 0.0, 40.0);
        assert_eq!(d.tick(40.0, 0.1), DropEvent::Stalled);
    }

    #[test]
    fn wheel_closing_under_zero_flow_clears_the_drop() {
        // slow enough that the drop is still in the chamber when the clamp shuts
        let cfg = DropConfig { max_speed: 0.001, ..DropConfig::default() };
        let mut wheel = WheelController::new(WheelConfig::default(), Transform::at(0.0, 0.0, 0.0));
        let mut drop = WaterDrop::new(cfg, 0.0, wheel.percentage());
        assert!(drop.drop_y().is_some());

        let mut cleared = 0;
        for _ in 0..300 {
            wheel.tick(Some(0.0), 1.0 / 30.0);
            if drop.tick(wheel.percentage(), 1.0 / 30.0) == DropEvent::Cleared {
                cleared += 1;
            }
        }
        assert_eq!(wheel.percentage(), 0.0);
        assert_eq!(cleared, 1);
        assert!(drop.drop_y().is_none());
        assert_eq!(drop.tick(wheel.percentage(), 1.0 / 30.0), DropEvent::Waiting);
    }
}
