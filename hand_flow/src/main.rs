//! flow_probe — type three landmark positions, see the flow they produce.

use hand_flow::{extract_flow, flow_geometry, Hand, Landmark};
use std::io::{self, Write};

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              Hand Flow Probe (thumb slider)              ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
    println!("  Coordinates are normalized image positions, e.g. `0.42 0.57`.");
    println!("  Empty input at the thumb prompt quits.");
    println!();

    let mut index  = Landmark::xy(0.30, 0.50);
    let mut little = Landmark::xy(0.70, 0.50);

    loop {
        let line = read_line("  Thumb tip (x y): ");
        let Some(thumb) = parse_point(&line) else {
            if line.trim().is_empty() { break; }
            println!("  ⚠  expected two numbers.");
            continue;
        };

        if let Some(p) = parse_point(&read_line(&format!(
            "  Index DIP (x y) [{:.2} {:.2}]: ", index.x, index.y
        ))) {
            index = p;
        }
        if let Some(p) = parse_point(&read_line(&format!(
            "  Little tip (x y) [{:.2} {:.2}]: ", little.x, little.y
        ))) {
            little = p;
        }

        let hand = Hand::with_key_points(thumb, index, little);
        if let Some(g) = flow_geometry(&hand) {
            println!("    unit (per cm)    : {:.4}", g.unit);
            println!("    adjusted index   : ({:.3}, {:.3})", g.adjusted_index.0, g.adjusted_index.1);
            println!("    adjusted little  : ({:.3}, {:.3})", g.adjusted_little.0, g.adjusted_little.1);
            println!("    dist index/little: {:.4} / {:.4}", g.dist_index, g.dist_little);
        }
        let flow = extract_flow(std::slice::from_ref(&hand));
        println!("    flow             : {:.3}  ({:.1}%)", flow, flow * 100.0);
        println!();
    }
}

fn parse_point(s: &str) -> Option<Landmark> {
    let mut it = s.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty());
    let x = it.next()?.parse::<f32>().ok()?;
    let y = it.next()?.parse::<f32>().ok()?;
    Some(Landmark::xy(x, y))
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
