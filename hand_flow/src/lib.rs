//! # hand_flow
//!
//! Hand-landmark data model and the **flow** signal derived from it.
//!
//! A detected hand is an ordered list of 21 normalized keypoints.  Three of
//! them drive the flow signal:
//!
//! | Index | Keypoint | Role |
//! |---|---|---|
//! | 4  | Thumb tip        | The moving "slider" |
//! | 7  | Index finger DIP | Reference for flow = 1 |
//! | 20 | Little finger tip| Reference for flow = 0 |
//!
//! ## Algorithm
//!
//! ```text
//! unit      = |I − L| / 7          (I–L is taken to span ~7 cm)
//! I'        = I + (−0.5·unit, −0.5·unit)
//! L'        = L + (+0.5·unit, +0.5·unit)
//! flow      = clamp01( |T − L'| / (|T − I'| + |T − L'|) )
//! ```
//!
//! Both axes of each reference receive the same scalar offset.  That is the
//! observed calibration behaviour and is reproduced as-is.
//!
//! Degenerate input (no hand, fewer than 21 points, zero denominator, or
//! non-finite coordinates) yields `0.0`, never an error.

use tracing::debug;

// ════════════════════════════════════════════════════════════════════════════
// Landmark indices
// ════════════════════════════════════════════════════════════════════════════

/// Number of landmarks in a complete hand.
pub const LANDMARK_COUNT: usize = 21;
pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_DIP: usize = 7;
pub const PINKY_TIP: usize = 20;

/// Real-world span assumed between index DIP and little tip, in cm.
pub const REFERENCE_SPAN_CM: f32 = 7.0;

// ════════════════════════════════════════════════════════════════════════════
// Data model
// ════════════════════════════════════════════════════════════════════════════

/// A single normalized keypoint.  `x`/`y` are in image space (0–1);
/// `z` is relative depth and is ignored by the flow computation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }

    pub const fn xy(x: f32, y: f32) -> Self {
        Landmark { x, y, z: 0.0 }
    }

    /// Euclidean distance in the image plane (depth ignored).
    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn lerp(&self, other: &Landmark, t: f32) -> Landmark {
        Landmark {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// One detected hand.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hand {
    pub landmarks: Vec<Landmark>,
}

impl Hand {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Hand { landmarks }
    }

    /// Build a complete 21-point hand from the three points the flow signal
    /// reads.  The remaining points lie on the index–little segment, with
    /// the wrist at the centroid of the three.
    pub fn with_key_points(thumb_tip: Landmark, index_dip: Landmark, little_tip: Landmark) -> Self {
        let mut landmarks: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| index_dip.lerp(&little_tip, i as f32 / (LANDMARK_COUNT - 1) as f32))
            .collect();
        landmarks[WRIST] = Landmark::new(
            (thumb_tip.x + index_dip.x + little_tip.x) / 3.0,
            (thumb_tip.y + index_dip.y + little_tip.y) / 3.0,
            (thumb_tip.z + index_dip.z + little_tip.z) / 3.0,
        );
        landmarks[THUMB_TIP] = thumb_tip;
        landmarks[INDEX_DIP] = index_dip;
        landmarks[PINKY_TIP] = little_tip;
        Hand { landmarks }
    }

    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }

    pub fn thumb_tip(&self) -> Option<&Landmark>  { self.landmarks.get(THUMB_TIP) }
    pub fn index_dip(&self) -> Option<&Landmark>  { self.landmarks.get(INDEX_DIP) }
    pub fn little_tip(&self) -> Option<&Landmark> { self.landmarks.get(PINKY_TIP) }
}

/// Output of the hand-landmark detector for one frame.
///
/// Detectors write into a caller-owned result; [`DetectionResult::clear`]
/// empties one without giving up its allocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub hands: Vec<Hand>,
}

impl DetectionResult {
    pub fn with_capacity(num_hands: usize) -> Self {
        DetectionResult { hands: Vec::with_capacity(num_hands) }
    }

    pub fn single(hand: Hand) -> Self {
        DetectionResult { hands: vec![hand] }
    }

    pub fn clear(&mut self) {
        self.hands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// Flow of the first hand; see [`extract_flow`].
    pub fn flow(&self) -> f32 {
        extract_flow(&self.hands)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Flow geometry
// ════════════════════════════════════════════════════════════════════════════

/// Intermediate values of the flow computation for one hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowGeometry {
    pub thumb_tip:       Landmark,
    pub index_dip:       Landmark,
    pub little_tip:      Landmark,
    /// Normalized units per cm.
    pub unit:            f32,
    pub adjusted_index:  (f32, f32),
    pub adjusted_little: (f32, f32),
    pub dist_index:      f32,
    pub dist_little:     f32,
}

impl FlowGeometry {
    /// Flow in [0, 1], or 0.0 when the geometry is degenerate.
    pub fn flow(&self) -> f32 {
        let total = self.dist_index + self.dist_little;
        if total == 0.0 {
            debug!("total distance is zero, flow: 0%");
            return 0.0;
        }
        let flow = self.dist_little / total;
        if !flow.is_finite() {
            debug!("non-finite flow from landmarks, flow: 0%");
            return 0.0;
        }
        flow.clamp(0.0, 1.0)
    }
}

/// Compute the calibrated reference points and distances for `hand`.
/// `None` when the hand has fewer than 21 landmarks.
pub fn flow_geometry(hand: &Hand) -> Option<FlowGeometry> {
    if !hand.is_complete() {
        return None;
    }
    let t = hand.landmarks[THUMB_TIP];
    let i = hand.landmarks[INDEX_DIP];
    let l = hand.landmarks[PINKY_TIP];

    let unit = i.distance_2d(&l) / REFERENCE_SPAN_CM;
    let offset_index  = -0.5 * unit;
    let offset_little =  0.5 * unit;

    let adjusted_index  = (i.x + offset_index,  i.y + offset_index);
    let adjusted_little = (l.x + offset_little, l.y + offset_little);

    let dist_index  = t.distance_2d(&Landmark::xy(adjusted_index.0,  adjusted_index.1));
    let dist_little = t.distance_2d(&Landmark::xy(adjusted_little.0, adjusted_little.1));

    Some(FlowGeometry {
        thumb_tip: t,
        index_dip: i,
        little_tip: l,
        unit,
        adjusted_index,
        adjusted_little,
        dist_index,
        dist_little,
    })
}

/// Convert a detection into the flow signal using the first hand only.
///
/// Returns 0.0 for an empty sequence, an incomplete first hand, or a
/// degenerate geometry.
pub fn extract_flow(hands: &[Hand]) -> f32 {
    let Some(hand) = hands.first() else {
        debug!("no hands detected, flow: 0%");
        return 0.0;
    };
    let Some(g) = flow_geometry(hand) else {
        debug!(landmarks = hand.landmarks.len(), "insufficient landmarks, flow: 0%");
        return 0.0;
    };

    debug!(
        "thumb tip ({:.3}, {:.3})  index dip ({:.3}, {:.3})  little tip ({:.3}, {:.3})",
        g.thumb_tip.x, g.thumb_tip.y, g.index_dip.x, g.index_dip.y, g.little_tip.x, g.little_tip.y,
    );
    debug!(
        "adjusted index ({:.3}, {:.3})  adjusted little ({:.3}, {:.3})  unit {:.3}",
        g.adjusted_index.0, g.adjusted_index.1, g.adjusted_little.0, g.adjusted_little.1, g.unit,
    );
    debug!("distance to index {:.3}, distance to little {:.3}", g.dist_index, g.dist_little);

    let flow = g.flow();
    debug!("flow: {:.1}%", flow * 100.0);
    flow
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
