//! Geometric identification of the four markers from scratch.
//!
//! The markers sit on the corners of a rectangle that is wider than it is
//! tall. Starting from any corner, its nearest neighbour lies along the short
//! (vertical) edge. The corner farthest from the start closes the second
//! vertical edge with its own nearest neighbour. Ordering the two vertical
//! edges by midpoint x, and each edge by y, labels every corner.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::marker::{Corner, Point};
use crate::sensor::Frame;

/// What to do when more than four detections are on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidatePolicy {
    /// Keep the four largest detections; equal areas prefer the lower slot.
    #[default]
    LargestArea,
    /// Refuse to identify.
    Reject,
}

impl CandidatePolicy {
    /// Pick four detection slots to identify, in ascending slot order.
    pub fn select(self, frame: &Frame) -> Option<[usize; 4]> {
        let mut visible: Vec<(usize, u16)> = frame.on_screen().map(|(i, o)| (i, o.area)).collect();
        if visible.len() < 4 {
            return None;
        }
        if visible.len() > 4 {
            match self {
                CandidatePolicy::Reject => {
                    debug!("{} detections on screen, refusing to identify", visible.len());
                    return None;
                }
                CandidatePolicy::LargestArea => {
                    visible.sort_by(|a, b| b.1.cmp(&a.1));
                    visible.truncate(4);
                    visible.sort_by_key(|&(i, _)| i);
                }
            }
        }
        Some([visible[0].0, visible[1].0, visible[2].0, visible[3].0])
    }
}

#[derive(Debug, Clone, Copy)]
struct VerticalEdge {
    top: usize,
    bottom: usize,
    x_sum: i64,
}

impl VerticalEdge {
    fn new(a: usize, b: usize, points: &[Point; 4]) -> Self {
        let (top, bottom) = if points[a].y < points[b].y { (a, b) } else { (b, a) };
        Self { top, bottom, x_sum: i64::from(points[a].x) + i64::from(points[b].x) }
    }
}

/// The other three candidates ordered by distance from `base`. Ties keep candidate order.
fn neighbours_by_distance(base: usize, points: &[Point; 4]) -> [usize; 3] {
    let mut neighbours = [0usize; 3];
    let mut j = 0;
    for i in 0..4 {
        if i != base {
            neighbours[j] = i;
            j += 1;
        }
    }
    neighbours.sort_by_key(|&i| points[base].distance_squared(points[i]));
    neighbours
}

/// Label four candidate detections as corners.
///
/// Returns the detection slot for each corner in canonical order, or `None`
/// when the geometry does not form two disjoint vertical edges.
pub fn identify_corners(frame: &Frame, candidates: [usize; 4]) -> Option<[usize; 4]> {
    let points = candidates.map(|slot| Point::from(&frame.objects[slot]));

    let first = neighbours_by_distance(0, &points);
    let left = VerticalEdge::new(0, first[0], &points);

    let far = first[2];
    let second = neighbours_by_distance(far, &points);
    let right = VerticalEdge::new(far, second[0], &points);

    if second[0] != first[1] {
        debug!("Candidate geometry is degenerate, both vertical edges share a corner");
        return None;
    }

    let (left, right) = if left.x_sum > right.x_sum { (right, left) } else { (left, right) };

    let mut corners = [0usize; 4];
    corners[Corner::TopLeft.index()] = candidates[left.top];
    corners[Corner::TopRight.index()] = candidates[right.top];
    corners[Corner::BottomLeft.index()] = candidates[left.bottom];
    corners[Corner::BottomRight.index()] = candidates[right.bottom];
    Some(corners)
}
