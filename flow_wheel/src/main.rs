//! Interactive wheel menu: hold flows, drag, and watch the readouts.

use flow_wheel::{
    flow_rate_ml_per_hour, format_flow_rate, DropConfig, DropEvent, TouchPhase, TouchWheel,
    Transform, WaterDrop, WheelConfig, WheelController, DEFAULT_MAX_FLOW_RATE,
};
use std::io::{self, Write};

const DT: f32 = 1.0 / 30.0;

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║             Roller Clamp Wheel — Tick Explorer           ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let cfg = WheelConfig::default();
    let start = Transform::at(0.0, 0.0, cfg.z_max);
    let mut wheel = WheelController::new(cfg, start);
    let mut touch = TouchWheel::new(cfg, start);
    let mut drop  = WaterDrop::new(DropConfig::default(), 0.0, wheel.percentage());

    println!("  z ∈ [{:.3}, {:.3}]  smoothing {:.1}/s  tick {:.4}s\n", cfg.z_min, cfg.z_max, cfg.smoothing_speed, DT);

    loop {
        print_menu();
        match read_line("Command: ").trim() {
            "1" => {
                let flow: f32 = read_line("  Flow 0–1: ").trim().parse().unwrap_or(1.0);
                let n: usize  = read_line("  Ticks (default 30): ").trim().parse().unwrap_or(30);
                let mut landed = 0;
                for _ in 0..n {
                    wheel.tick(Some(flow), DT);
                    if drop.tick(wheel.percentage(), DT) == DropEvent::Landed { landed += 1; }
                }
                show("flow", wheel.z(), wheel.body().transform().pitch_deg, wheel.percentage());
                println!("  drops landed: {}", landed);
            }
            "2" => {
                let n: usize = read_line("  Idle ticks (default 30): ").trim().parse().unwrap_or(30);
                for _ in 0..n {
                    wheel.tick(None, DT);
                    drop.tick(wheel.percentage(), DT);
                }
                show("flow", wheel.z(), wheel.body().transform().pitch_deg, wheel.percentage());
            }
            "3" => {
                let from: f32 = read_line("  Drag from screen y: ").trim().parse().unwrap_or(0.0);
                let to:   f32 = read_line("  Drag to screen y:   ").trim().parse().unwrap_or(0.0);
                touch.touch(TouchPhase::Began, from);
                touch.touch(TouchPhase::Moved, to);
                touch.touch(TouchPhase::Ended, to);
                touch.tick();
                show("touch", touch.z(), touch.body().transform().pitch_deg, touch.percentage());
            }
            "4" => {
                match drop.drop_y() {
                    Some(y) => println!("  drop at y = {:.3} (floor {:.3})", y, drop.floor_y()),
                    None    => println!("  no drop in the chamber"),
                }
            }
            "q" | "Q" | "" => break,
            other => println!("  ⚠  unknown command {:?}", other),
        }
        println!();
    }
}

fn show(label: &str, z: f32, pitch: f32, pct: f32) {
    println!("  [{}] z = {:.4}  pitch = {:.3}°  {:.1}%", label, z, pitch, pct);
    println!("  {}", format_flow_rate(flow_rate_ml_per_hour(pct, DEFAULT_MAX_FLOW_RATE)));
}

fn print_menu() {
    println!("  1. Hold a flow value for N ticks");
    println!("  2. Run N ticks with no signal");
    println!("  3. Touch drag (separate touch wheel)");
    println!("  4. Show drip chamber");
    println!("  Q. Quit");
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
