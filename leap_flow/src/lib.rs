//! # leap_flow
//!
//! Hand-driven IV roller clamp.  A hand pose (keyboard simulation, or a real
//! LeapMotion controller) is painted as coloured markers into a simulated
//! camera; the landmark runner reads those frames, the marker detector finds
//! the thumb tip, index DIP and little-finger tip, and the resulting flow
//! signal turns the roller-clamp wheel.
//!
//! ## Pose → Flow mapping
//!
//! | Thumb position | Flow | Clamp |
//! |---|---|---|
//! | On the adjusted index reference | 1.0 | fully open (`z_min`, 100 %) |
//! | Halfway between the references | 0.5 | half open |
//! | On the adjusted little-finger reference | 0.0 | closed (`z_max`, 0 %) |
//! | No hand in view | 0.0 | closes |
//!
//! ## Visualization
//!
//! The left panel shows the camera preview with the two adjusted reference
//! points in gold.  The middle panel is the roller clamp: the wheel slides
//! along its track and its spokes turn as it moves.  The right panel is the
//! drip chamber; drops fall faster as the clamp opens.  The percentage and
//! the flow rate (`Flow Rate: N mL/h`) are printed under each.
//!
//! ## Feature flags
//!
//! * (default) — **Simulation mode**: keyboard and mouse drive the hand.
//! * `leap` — **Hardware mode**: also polls a real LeapMotion controller.
//!
//! ### Simulation controls
//!
//! | Input | Effect |
//! |---|---|
//! | Arrow keys / hold | Move the thumb |
//! | `H` | Snap the thumb to the index reference (full flow) |
//! | `L` | Snap the thumb to the little-finger reference (no flow) |
//! | `Space` | Hide / show the hand |
//! | `P` | Pause / resume detection |
//! | Mouse drag | Turn the wheel directly (touch control mode) |
//! | `Q` | Quit |

pub mod tracking;
pub mod camera;
pub mod app;
pub mod visualizer;
