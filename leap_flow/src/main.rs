//! leap_flow — interactive entry point.

use leap_flow::app::{run, AppConfig, ControlMode};
use flow_wheel::WheelConfig;
use landmark_runner::{AcquisitionMode, RunningMode};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Leap Flow — Hand-Driven IV Roller Clamp             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware + keyboard simulation");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Keyboard simulation  (use --features leap for hardware)");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let cfg = if let Some(path) = args.iter().position(|a| a == "--config").and_then(|i| args.get(i + 1)) {
        println!("  Config: {}\n", path);
        match AppConfig::from_file(path) {
            Ok(cfg) => cfg,
            Err(e)  => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    } else if args.iter().any(|a| a == "--quick") {
        println!("  Quick-start: hand control, live stream, async CPU readback\n");
        AppConfig::default()
    } else {
        configure_interactively()
    };

    println!();
    println!("  Opening visualizer window…");
    println!();

    if let Err(e) = run(cfg) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn configure_interactively() -> AppConfig {
    let mut cfg = AppConfig::default();

    println!("  Wheel control:  1.Hand landmarks  2.Mouse drag");
    cfg.control = match read_line("  Choice (1–2, default 1): ").trim() {
        "2" => ControlMode::Touch,
        _   => ControlMode::Hand,
    };

    println!("  Detector mode:  1.Live stream  2.Video  3.Image");
    cfg.runner.running_mode = match read_line("  Choice (1–3, default 1): ").trim() {
        "2" => RunningMode::Video,
        "3" => RunningMode::Image,
        _   => RunningMode::LiveStream,
    };

    println!("  Frame read:  1.Async CPU readback  2.Sync CPU read  3.GPU");
    cfg.runner.acquisition = match read_line("  Choice (1–3, default 1): ").trim() {
        "2" => AcquisitionMode::Cpu,
        "3" => AcquisitionMode::Gpu,
        _   => AcquisitionMode::CpuAsync,
    };

    let smoothing = read_line(&format!("  Wheel smoothing speed (default {}): ", cfg.wheel.smoothing_speed));
    let drag = if cfg.control == ControlMode::Touch {
        read_line(&format!("  Drag sensitivity (default {}): ", cfg.wheel.move_speed))
    } else {
        String::new()
    };
    tune_wheel(&mut cfg.wheel, &smoothing, &drag);

    let default_rate = cfg.max_flow_rate;
    let rate: f32 = read_line(&format!("  Max flow rate mL/h (default {}): ", default_rate))
        .trim().parse().unwrap_or(default_rate);
    cfg.max_flow_rate = rate.max(0.0);

    cfg
}

/// Apply the smoothing and drag answers; blank or invalid answers keep the
/// current values.
fn tune_wheel(wheel: &mut WheelConfig, smoothing: &str, drag: &str) {
    wheel.smoothing_speed = positive_or(smoothing, wheel.smoothing_speed);
    wheel.move_speed = positive_or(drag, wheel.move_speed).min(1.0);
}

/// Parsed value when it is a finite number above zero, else `default`.
fn positive_or(input: &str, default: f32) -> f32 {
    match input.trim().parse::<f32>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_or_accepts_positive_numbers() {
        assert_eq!(positive_or("8\n", 5.0), 8.0);
        assert_eq!(positive_or("  0.25 ", 5.0), 0.25);
    }

    #[test]
    fn smoothing_answer_sets_smoothing_speed() {
        let mut wheel = AppConfig::default().wheel;
        let drag = wheel.move_speed;
        tune_wheel(&mut wheel, "12\n", "");
        assert_eq!(wheel.smoothing_speed, 12.0);
        assert_eq!(wheel.move_speed, drag);
    }

    #[test]
    fn drag_answer_sets_move_speed_only() {
        let mut wheel = AppConfig::default().wheel;
        let smoothing = wheel.smoothing_speed;
        tune_wheel(&mut wheel, "\n", "0.5\n");
        assert_eq!(wheel.smoothing_speed, smoothing);
        assert_eq!(wheel.move_speed, 0.5);
        tune_wheel(&mut wheel, "", "40");
        assert_eq!(wheel.move_speed, 1.0);
    }

    #[test]
    fn positive_or_falls_back() {
        assert_eq!(positive_or("\n", 5.0), 5.0);
        assert_eq!(positive_or("fast", 5.0), 5.0);
        assert_eq!(positive_or("0", 5.0), 5.0);
        assert_eq!(positive_or("-3", 5.0), 5.0);
        assert_eq!(positive_or("NaN", 5.0), 5.0);
    }
}
