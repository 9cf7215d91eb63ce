//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────┬────────────────┬──────────────────┐
//! │  CAMERA                  │  ROLLER CLAMP  │  DRIP CHAMBER    │
//! │  [preview + markers]     │   ║            │   ┌──────┐       │
//! │                          │   ║  (wheel)   │   │  ◆   │       │
//! │  flow / hands            │   ║            │   └──────┘       │
//! │                          │   42.5%        │  Flow Rate: …    │
//! │  status bar                                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;

use flow_wheel::{WaterDrop, WheelConfig};
use landmark_runner::FrameSource;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::app::{AppState, Control};
use crate::tracking::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:       usize = 900;
pub const WIN_H:       usize = 440;
const CAM_X:           usize = 20;
const CAM_Y:           usize = 40;
const CAM_W:           usize = 320;
const CAM_H:           usize = 240;
const TRACK_X:         usize = 470;
const TRACK_TOP:       usize = 70;
const TRACK_H:         usize = 220;
const WHEEL_R:         usize = 28;
const CHAMBER_X:       usize = 680;
const CHAMBER_Y:       usize = 60;
const CHAMBER_W:       usize = 140;
const CHAMBER_H:       usize = 230;
const STATUS_Y:        usize = WIN_H - 36;
const BG_COLOR:        u32   = 0xFF1A1A2E;
const PANEL_BG:        u32   = 0xFF16213E;
const TEXT_BG:         u32   = 0xFF0F3460;
const TRACK_COLOR:     u32   = 0xFF556080;
const WHEEL_COLOR:     u32   = 0xFFDDE3F0;
const SPOKE_COLOR:     u32   = 0xFF8899BB;
const WATER_COLOR:     u32   = 0xFF4FA3FF;
const REF_COLOR:       u32   = 0xFFFFD700;  // gold
const ALERT_COLOR:     u32   = 0xFFFF5555;

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "Leap Flow — Roller Clamp",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
        })
    }

    /// Returns false when the window should close.
    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keyboard inputs and translate to SimInput events.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        // Keys that trigger on first press only
        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        // Keys that repeat while held
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        if one_shot(Key::Q) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::Quit));
            return false;
        }

        let mut keys = Vec::new();
        if held(Key::Left)      { keys.push(SimKey::Left);       }
        if held(Key::Right)     { keys.push(SimKey::Right);      }
        if held(Key::Up)        { keys.push(SimKey::Up);         }
        if held(Key::Down)      { keys.push(SimKey::Down);       }
        if one_shot(Key::H)     { keys.push(SimKey::SnapIndex);  }
        if one_shot(Key::L)     { keys.push(SimKey::SnapLittle); }
        if one_shot(Key::Space) { keys.push(SimKey::Hide);       }
        if one_shot(Key::P)     { keys.push(SimKey::Pause);      }

        for k in keys {
            let _ = self.sim_tx.send(SimInput::KeyDown(k));
        }
        true
    }

    /// Left button state and pointer height (pixels from the bottom edge),
    /// or `None` while the pointer is outside the window.
    pub fn pointer(&self) -> Option<(bool, f32)> {
        let (_, y) = self.window.get_mouse_pos(MouseMode::Discard)?;
        Some((self.window.get_mouse_down(MouseButton::Left), WIN_H as f32 - y))
    }

    /// Render one frame.
    pub fn render(&mut self, app: &AppState) {
        // Clear
        self.buf.fill(BG_COLOR);

        // ── Camera preview ────────────────────────────────────────────────
        self.draw_label("CAMERA", CAM_X, CAM_Y - 14, 0xFFAADDFF);
        self.draw_camera(app);
        let flow = match app.last_flow() {
            Some(f) => format!("flow {:.3}  hands {}", f, app.hands_seen()),
            None    => "flow -".to_string(),
        };
        self.draw_label(&flow, CAM_X, CAM_Y + CAM_H + 10, 0xFFEEEEEE);
        if app.is_paused() {
            self.draw_text("PAUSED", CAM_X + 8, CAM_Y + 8, REF_COLOR, 2);
        }

        // ── Roller clamp ──────────────────────────────────────────────────
        self.draw_label("ROLLER CLAMP", TRACK_X - 60, CAM_Y - 14, 0xFFAADDFF);
        self.draw_clamp(app);
        let pct = app.percentage_text();
        self.draw_text(&pct, TRACK_X - 50, TRACK_TOP + TRACK_H + 50, 0xFFFFFFFF, 4);

        // ── Drip chamber ──────────────────────────────────────────────────
        self.draw_label("DRIP CHAMBER", CHAMBER_X, CAM_Y - 14, 0xFFAADDFF);
        self.draw_chamber(app.water_drop());
        let rate = app.flow_rate_text();
        self.draw_text(&rate, CHAMBER_X - 20, CHAMBER_Y + CHAMBER_H + 20, 0xFFEEEEEE, 2);

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        let status_color = if app.tracking_error().is_some() { ALERT_COLOR } else { 0xFFEEEEEE };
        self.draw_label(&app.status, 10, STATUS_Y + 10, status_color);

        // ── Key legend ────────────────────────────────────────────────────
        let legend = match app.control() {
            Control::Hand(_)  => "ARROWS=move thumb  H/L=snap to index/little  SPACE=hide hand  P=pause  Q=quit",
            Control::Touch(_) => "DRAG up/down=turn wheel  P=pause tracking  Q=quit",
        };
        self.draw_label(legend, 10, WIN_H - 12, 0xFF888888);

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── Camera ────────────────────────────────────────────────────────────

    fn draw_camera(&mut self, app: &AppState) {
        self.fill_rect(CAM_X, CAM_Y, CAM_W, CAM_H, PANEL_BG);
        let Some(cam) = app.camera() else {
            self.draw_text("NO SIGNAL", CAM_X + 110, CAM_Y + 110, ALERT_COLOR, 2);
            self.draw_border(CAM_X, CAM_Y, CAM_W, CAM_H, ALERT_COLOR);
            return;
        };

        let frame = cam.current_frame();
        let (w, h) = (frame.width as usize, frame.height as usize);
        if w > 0 && h > 0 {
            // nearest-neighbour scale into the panel
            for py in 0..CAM_H {
                let sy = py * h / CAM_H;
                for px in 0..CAM_W {
                    let sx = px * w / CAM_W;
                    let i = (sy * w + sx) * 4;
                    if let Some(p) = frame.pixels.get(i..i + 3) {
                        let argb = 0xFF000000 | (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32;
                        self.set_pixel(CAM_X + px, CAM_Y + py, argb);
                    }
                }
            }
        }

        // reference points the thumb is measured against
        if let Some(pose) = cam.pose() {
            for (x, y) in [pose.index_reference(), pose.little_reference()] {
                let cx = CAM_X + (x.clamp(0.0, 1.0) * (CAM_W - 1) as f32) as usize;
                let cy = CAM_Y + (y.clamp(0.0, 1.0) * (CAM_H - 1) as f32) as usize;
                self.draw_diamond(cx, cy, 4, REF_COLOR);
            }
        }
        self.draw_border(CAM_X, CAM_Y, CAM_W, CAM_H, 0xFF000000);
    }

    // ── Roller clamp ──────────────────────────────────────────────────────

    fn draw_clamp(&mut self, app: &AppState) {
        // housing and slot
        self.fill_rect(TRACK_X - 50, TRACK_TOP - 40, 100, TRACK_H + 80, PANEL_BG);
        self.fill_rect(TRACK_X - 3, TRACK_TOP, 6, TRACK_H, TRACK_COLOR);
        self.draw_label("100", TRACK_X + 34, TRACK_TOP - 2, 0xFF888888);
        self.draw_label("0",   TRACK_X + 34, TRACK_TOP + TRACK_H - 2, 0xFF888888);

        let body = app.wheel();
        let cy = TRACK_TOP + track_offset(body.z(), app.wheel_config());
        let pitch = body.transform().pitch_deg.to_radians();

        for k in 0..6 {
            let a = pitch + k as f32 * std::f32::consts::FRAC_PI_3;
            let r = (WHEEL_R - 3) as f32;
            let x1 = TRACK_X as f32 + a.cos() * r;
            let y1 = cy as f32 + a.sin() * r;
            self.draw_line(TRACK_X as f32, cy as f32, x1, y1, SPOKE_COLOR);
        }
        self.draw_ring(TRACK_X, cy, WHEEL_R, WHEEL_COLOR);
        self.draw_ring(TRACK_X, cy, WHEEL_R - 1, WHEEL_COLOR);
    }

    // ── Drip chamber ──────────────────────────────────────────────────────

    fn draw_chamber(&mut self, drop: &WaterDrop) {
        self.fill_rect(CHAMBER_X, CHAMBER_Y, CHAMBER_W, CHAMBER_H, PANEL_BG);
        self.draw_border(CHAMBER_X, CHAMBER_Y, CHAMBER_W, CHAMBER_H, TRACK_COLOR);
        // pooled fluid at the bottom
        self.fill_rect(CHAMBER_X + 1, CHAMBER_Y + CHAMBER_H - 24, CHAMBER_W - 2, 23, 0xFF2A5C99);

        if let Some(y) = drop.drop_y() {
            let cy = CHAMBER_Y + 8 + chamber_offset(y, drop, CHAMBER_H - 40);
            self.draw_drop(CHAMBER_X + CHAMBER_W / 2, cy);
        }
    }

    fn draw_drop(&mut self, cx: usize, cy: usize) {
        for r in 0..=5usize {
            self.draw_diamond(cx, cy, r, WATER_COLOR);
        }
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x+w).min(WIN_W) {
            if y < WIN_H           { self.buf[y           * WIN_W + col] = color; }
            if y+h-1 < WIN_H       { self.buf[(y+h-1)     * WIN_W + col] = color; }
        }
        for row in y..(y+h).min(WIN_H) {
            if x < WIN_W           { self.buf[row * WIN_W + x    ] = color; }
            if x+w-1 < WIN_W       { self.buf[row * WIN_W + x+w-1] = color; }
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    fn set_pixel_f(&mut self, x: f32, y: f32, color: u32) {
        if x >= 0.0 && y >= 0.0 {
            self.set_pixel(x.round() as usize, y.round() as usize, color);
        }
    }

    fn draw_diamond(&mut self, cx: usize, cy: usize, r: usize, color: u32) {
        for dy in 0..=r as isize {
            let dx = r as isize - dy;
            for &(sx, sy) in &[
                (cx as isize + dx, cy as isize + dy),
                (cx as isize - dx, cy as isize + dy),
                (cx as isize + dx, cy as isize - dy),
                (cx as isize - dx, cy as isize - dy),
            ] {
                if sx >= 0 && sy >= 0 {
                    self.set_pixel(sx as usize, sy as usize, color);
                }
            }
        }
    }

    fn draw_ring(&mut self, cx: usize, cy: usize, r: usize, color: u32) {
        let steps = (r * 8).max(16);
        for i in 0..steps {
            let a = i as f32 / steps as f32 * std::f32::consts::TAU;
            self.set_pixel_f(cx as f32 + a.cos() * r as f32, cy as f32 + a.sin() * r as f32, color);
        }
    }

    fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: u32) {
        let n = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        for i in 0..=n {
            let t = i as f32 / n as f32;
            self.set_pixel_f(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, color);
        }
    }

    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        self.draw_text(text, x, y, color, 1);
    }

    /// Minimal bitmap font — 3×5 characters, each pixel drawn as a
    /// `scale`×`scale` block.
    fn draw_text(&mut self, text: &str, x: usize, y: usize, color: u32, scale: usize) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > WIN_W { break; }
        }
    }
}

/// Pixels from the top of the track: `z_min` (100 %) at the top.
fn track_offset(z: f32, cfg: &WheelConfig) -> usize {
    let span = cfg.z_max - cfg.z_min;
    if !(span > 0.0) {
        return TRACK_H;
    }
    let t = ((z - cfg.z_min) / span).clamp(0.0, 1.0);
    (t * TRACK_H as f32).round() as usize
}

/// Pixels from the top of the chamber for a drop at world height `y`.
fn chamber_offset(y: f32, drop: &WaterDrop, height: usize) -> usize {
    let fall = drop.origin_y() - drop.floor_y();
    if !(fall > 0.0) {
        return 0;
    }
    let t = ((drop.origin_y() - y) / fall).clamp(0.0, 1.0);
    (t * height as f32).round() as usize
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}
