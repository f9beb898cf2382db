//! Execution context — the named scalar state shared with the renderer.
//!
//! The VM never sees the renderer's concrete state. It talks to an
//! [`EvalContext`], and the renderer hands it a [`FrameContext`] it updated
//! with fresh audio levels before the frame and reads transform/color
//! fields back from afterwards.

use std::collections::HashMap;

/// Capability the VM needs from its variable store: read and write scalars
/// by name. Reads of names never written must return 0.0.
pub trait EvalContext {
    fn get(&self, name: &str) -> f64;
    fn set(&mut self, name: &str, value: f64);
}

/// Per-frame variable state for one running preset.
///
/// Built-in names resolve to dedicated fields, `q1`..`q32` to the indexed
/// slot array, and anything else to the open `custom` map. Built-ins and
/// `q` slots always win over the map, regardless of what a preset inserted
/// there first.
#[derive(Debug, Clone)]
pub struct FrameContext {
    // Audio levels, written by the analyzer before each frame.
    pub bass: f64,
    pub mid: f64,
    pub treb: f64,
    pub bass_att: f64,
    pub mid_att: f64,
    pub treb_att: f64,

    // Time.
    pub time: f64,
    pub frame: f64,
    pub fps: f64,

    // Warp-mesh transform, read back by the renderer after each frame.
    pub zoom: f64,
    pub rot: f64,
    pub cx: f64,
    pub cy: f64,
    pub dx: f64,
    pub dy: f64,
    pub warp: f64,
    pub sx: f64,
    pub sy: f64,

    // Waveform color.
    pub wave_r: f64,
    pub wave_g: f64,
    pub wave_b: f64,
    pub wave_a: f64,

    // Per-pixel coordinates, driven by the per-pixel evaluation path.
    pub x: f64,
    pub y: f64,
    pub rad: f64,
    pub ang: f64,

    /// General-purpose preset slots, addressed as `q1`..`q32`.
    pub q: [f64; 32],

    /// Fallback for every other identifier a preset author invents.
    pub custom: HashMap<String, f64>,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            bass: 0.0,
            mid: 0.0,
            treb: 0.0,
            bass_att: 0.0,
            mid_att: 0.0,
            treb_att: 0.0,
            time: 0.0,
            frame: 0.0,
            fps: 60.0,
            zoom: 1.0,
            rot: 0.0,
            cx: 0.5,
            cy: 0.5,
            dx: 0.0,
            dy: 0.0,
            warp: 1.0,
            sx: 1.0,
            sy: 1.0,
            wave_r: 1.0,
            wave_g: 1.0,
            wave_b: 1.0,
            wave_a: 1.0,
            x: 0.0,
            y: 0.0,
            rad: 0.0,
            ang: 0.0,
            q: [0.0; 32],
            custom: HashMap::new(),
        }
    }
}

impl FrameContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Map `q1`..`q32` to a zero-based slot index.
///
/// Names like `q0`, `q33` or `quality` do not match and fall through to
/// the custom map.
fn q_slot(name: &str) -> Option<usize> {
    let digits = name.strip_prefix('q')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: usize = digits.parse().ok()?;
    if (1..=32).contains(&n) {
        Some(n - 1)
    } else {
        None
    }
}

impl EvalContext for FrameContext {
    fn get(&self, name: &str) -> f64 {
        match name {
            "bass" => self.bass,
            "mid" => self.mid,
            "treb" => self.treb,
            "bass_att" => self.bass_att,
            "mid_att" => self.mid_att,
            "treb_att" => self.treb_att,
            "time" => self.time,
            "frame" => self.frame,
            "fps" => self.fps,
            "zoom" => self.zoom,
            "rot" => self.rot,
            "cx" => self.cx,
            "cy" => self.cy,
            "dx" => self.dx,
            "dy" => self.dy,
            "warp" => self.warp,
            "sx" => self.sx,
            "sy" => self.sy,
            "wave_r" => self.wave_r,
            "wave_g" => self.wave_g,
            "wave_b" => self.wave_b,
            "wave_a" => self.wave_a,
            "x" => self.x,
            "y" => self.y,
            "rad" => self.rad,
            "ang" => self.ang,
            _ => {
                if let Some(slot) = q_slot(name) {
                    self.q[slot]
                } else {
                    self.custom.get(name).copied().unwrap_or(0.0)
                }
            }
        }
    }

    fn set(&mut self, name: &str, value: f64) {
        match name {
            "bass" => self.bass = value,
            "mid" => self.mid = value,
            "treb" => self.treb = value,
            "bass_att" => self.bass_att = value,
            "mid_att" => self.mid_att = value,
            "treb_att" => self.treb_att = value,
            "time" => self.time = value,
            "frame" => self.frame = value,
            "fps" => self.fps = value,
            "zoom" => self.zoom = value,
            "rot" => self.rot = value,
            "cx" => self.cx = value,
            "cy" => self.cy = value,
            "dx" => self.dx = value,
            "dy" => self.dy = value,
            "warp" => self.warp = value,
            "sx" => self.sx = value,
            "sy" => self.sy = value,
            "wave_r" => self.wave_r = value,
            "wave_g" => self.wave_g = value,
            "wave_b" => self.wave_b = value,
            "wave_a" => self.wave_a = value,
            "x" => self.x = value,
            "y" => self.y = value,
            "rad" => self.rad = value,
            "ang" => self.ang = value,
            _ => {
                if let Some(slot) = q_slot(name) {
                    self.q[slot] = value;
                } else {
                    self.custom.insert(name.to_string(), value);
                }
            }
        }
    }
}
