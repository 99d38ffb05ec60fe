//! Marker correspondence across frames.
//!
//! The tracker turns up to sixteen anonymous detections per frame into four
//! labelled markers: top-left, top-right, bottom-left, bottom-right. Identity
//! is sticky; a marker keeps its label for as long as it can be matched to
//! its previous position, and only falls back to geometric identification
//! when matching comes up short.

pub mod identify;
pub mod marker;
pub mod tracker;

pub use identify::{CandidatePolicy, identify_corners};
pub use marker::{Corner, MarkerSlot, Point};
pub use tracker::{MarkerTracker, TrackedFrame, TrackingOutcome};
