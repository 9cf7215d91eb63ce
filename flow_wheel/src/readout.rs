//! Derived readouts: percentage text and IV flow rate.

/// Flow rate shown at 100 %, in mL/h.
pub const DEFAULT_MAX_FLOW_RATE: f32 = 1500.0;

/// Linear interpolation with `t` clamped to [0, 1].  Exact at both ends.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    a * (1.0 - t) + b * t
}

/// Percentage readout for a wheel at `z`: `z_min` → 100 %, `z_max` → 0 %.
///
/// A zero-width range reads 0 %.
pub fn percentage(z: f32, z_min: f32, z_max: f32) -> f32 {
    let span = z_max - z_min;
    if span == 0.0 || !span.is_finite() {
        return 0.0;
    }
    (100.0 * ((z_max - z) / span)).clamp(0.0, 100.0)
}

/// `"{:.1}%"` — the on-screen percentage label.
pub fn format_percentage(p: f32) -> String {
    format!("{:.1}%", p)
}

/// IV flow rate for a given opening percentage.
pub fn flow_rate_ml_per_hour(percentage: f32, max_rate: f32) -> f32 {
    (percentage.clamp(0.0, 100.0) / 100.0) * max_rate
}

pub fn format_flow_rate(rate: f32) -> String {
    format!("Flow Rate: {:.0} mL/h", rate)
}
