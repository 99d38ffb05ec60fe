//! Frame-to-frame marker correspondence.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::identify::{CandidatePolicy, identify_corners};
use super::marker::{MarkerSlot, Point, initial_slots};
use crate::sensor::{Frame, OBJECT_SLOTS};

/// How the markers of a frame were resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TrackingOutcome {
    /// All four matched their previous positions.
    Tracked,
    /// Identified from geometry after matching fell short.
    Reidentified,
    /// Only `assigned` markers could be matched this frame.
    Partial { assigned: usize },
}

impl TrackingOutcome {
    pub fn is_locked(&self) -> bool {
        !matches!(self, TrackingOutcome::Partial { .. })
    }
}

/// A frame together with the marker assignment made for it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFrame {
    /// Frames seen by the tracker before this one.
    pub sequence: u64,
    pub frame: Frame,
    pub markers: [MarkerSlot; 4],
    pub outcome: TrackingOutcome,
}

impl TrackedFrame {
    /// Marker positions in canonical order, if every marker is assigned.
    pub fn image_points(&self) -> Option<[Point; 4]> {
        image_points(&self.markers)
    }
}

pub(crate) fn image_points(markers: &[MarkerSlot; 4]) -> Option<[Point; 4]> {
    if !markers.iter().all(MarkerSlot::is_assigned) {
        return None;
    }
    let mut points = [Point::default(); 4];
    for (point, marker) in points.iter_mut().zip(markers) {
        *point = marker.position?;
    }
    Some(points)
}

/// Keeps the identity of the four markers across frames.
///
/// Each frame first matches every marker with a known position to the
/// nearest unclaimed detection within a quarter of the shortest squared
/// distance between known markers. Markers are matched in canonical order
/// and the lowest detection slot wins equal distances. If any marker is left
/// over, all four are identified again from the rectangle geometry.
#[derive(Debug, Clone)]
pub struct MarkerTracker {
    slots: [MarkerSlot; 4],
    policy: CandidatePolicy,
    frames: u64,
    locked: bool,
}

impl Default for MarkerTracker {
    fn default() -> Self {
        Self::new(CandidatePolicy::default())
    }
}

impl MarkerTracker {
    pub fn new(policy: CandidatePolicy) -> Self {
        Self { slots: initial_slots(), policy, frames: 0, locked: false }
    }

    pub fn slots(&self) -> &[MarkerSlot; 4] {
        &self.slots
    }

    pub fn policy(&self) -> CandidatePolicy {
        self.policy
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Forget all marker positions.
    pub fn reset(&mut self) {
        self.slots = initial_slots();
        self.locked = false;
    }

    /// Update marker assignments for `frame`.
    pub fn update(&mut self, frame: &Frame) -> TrackingOutcome {
        self.frames += 1;

        let matched = self.match_to_prior(frame);
        let outcome = if matched == self.slots.len() {
            TrackingOutcome::Tracked
        } else if self.reidentify(frame) {
            TrackingOutcome::Reidentified
        } else {
            TrackingOutcome::Partial { assigned: matched }
        };

        if outcome.is_locked() != self.locked {
            self.locked = outcome.is_locked();
            if self.locked {
                debug!("Marker lock acquired at frame {}", self.frames);
            } else {
                debug!("Marker lock lost at frame {} ({} of 4 matched)", self.frames, matched);
            }
        }
        trace!("Frame {}: {:?}", self.frames, outcome);
        outcome
    }

    /// Update and package the result with its frame.
    pub fn track(&mut self, frame: Frame) -> TrackedFrame {
        let sequence = self.frames;
        let outcome = self.update(&frame);
        TrackedFrame { sequence, frame, markers: self.slots, outcome }
    }

    fn match_threshold(&self) -> u64 {
        let mut shortest = u64::MAX;
        for (i, a) in self.slots.iter().enumerate() {
            let Some(a) = a.position else { continue };
            for b in &self.slots[i + 1..] {
                if let Some(b) = b.position {
                    shortest = shortest.min(a.distance_squared(b));
                }
            }
        }
        // Squared distances: a quarter is half the linear distance.
        shortest / 4
    }

    fn match_to_prior(&mut self, frame: &Frame) -> usize {
        let threshold = self.match_threshold();
        let mut claimed = [false; OBJECT_SLOTS];
        let mut matched = 0;

        for slot in &mut self.slots {
            slot.object = None;
            let Some(prior) = slot.position else { continue };

            let mut best: Option<(usize, Point, u64)> = None;
            for (index, object) in frame.on_screen() {
                if claimed[index] {
                    continue;
                }
                let point = Point::from(object);
                let distance = prior.distance_squared(point);
                if distance < threshold && best.is_none_or(|(_, _, d)| distance < d) {
                    best = Some((index, point, distance));
                }
            }

            if let Some((index, point, _)) = best {
                claimed[index] = true;
                slot.assign(index, point);
                matched += 1;
            }
        }
        matched
    }

    fn reidentify(&mut self, frame: &Frame) -> bool {
        let Some(candidates) = self.policy.select(frame) else {
            return false;
        };
        let Some(corners) = identify_corners(frame, candidates) else {
            return false;
        };
        for (slot, index) in self.slots.iter_mut().zip(corners) {
            slot.assign(index, Point::from(&frame.objects[index]));
        }
        trace!("Re-identified markers from detections {:?}", corners);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{CENTROID_ABSENT, DetectedObject};
    use crate::test_utils::frame_with_points;
    use crate::tracking::Corner;
    use proptest::prelude::*;

    const TL: (u16, u16) = (1000, 1000);
    const TR: (u16, u16) = (1400, 1000);
    const BL: (u16, u16) = (1000, 1150);
    const BR: (u16, u16) = (1400, 1150);

    fn positions(tracker: &MarkerTracker) -> Vec<Option<(i32, i32)>> {
        tracker.slots().iter().map(|s| s.position.map(|p| (p.x, p.y))).collect()
    }

    fn locked_tracker() -> MarkerTracker {
        let mut tracker = MarkerTracker::default();
        let frame = frame_with_points(&[(0, TL.0, TL.1), (1, TR.0, TR.1), (2, BL.0, BL.1), (3, BR.0, BR.1)]);
        assert_eq!(tracker.update(&frame), TrackingOutcome::Reidentified);
        tracker
    }

    #[test]
    fn cold_start_identifies_shuffled_corners() {
        let mut tracker = MarkerTracker::default();
        let frame = frame_with_points(&[(9, 70, 56), (3, 30, 40), (12, 30, 56), (4, 70, 40)]);

        let tracked = tracker.track(frame);
        assert_eq!(tracked.sequence, 0);
        assert_eq!(tracked.outcome, TrackingOutcome::Reidentified);

        let objects: Vec<_> = tracked.markers.iter().map(|m| m.object).collect();
        assert_eq!(objects, vec![Some(3), Some(4), Some(12), Some(9)]);
        assert_eq!(
            tracked.image_points(),
            Some([Point::new(30, 40), Point::new(70, 40), Point::new(30, 56), Point::new(70, 56)])
        );
        assert_eq!(tracked.markers[3].corner, Corner::BottomRight);
    }

    #[test]
    fn matched_markers_follow_their_detection() {
        let mut tracker = locked_tracker();

        // Same corners, new slots, small motion.
        let frame = frame_with_points(&[
            (15, BR.0 + 3, BR.1 - 1),
            (6, TL.0 + 2, TL.1 + 2),
            (8, BL.0, BL.1 + 4),
            (1, TR.0 - 5, TR.1),
        ]);
        assert_eq!(tracker.update(&frame), TrackingOutcome::Tracked);

        let objects: Vec<_> = tracker.slots().iter().map(|m| m.object).collect();
        assert_eq!(objects, vec![Some(6), Some(1), Some(8), Some(15)]);
    }

    #[test]
    fn sentinel_slots_are_never_matched() {
        let mut tracker = MarkerTracker::default();
        // Bottom-right marker parked next to the sentinel coordinate.
        let start = frame_with_points(&[(0, 3600, 4000), (1, 4094, 4000), (2, 3600, 4094), (3, 4094, 4094)]);
        assert_eq!(tracker.update(&start), TrackingOutcome::Reidentified);

        let mut frame = frame_with_points(&[(0, 3600, 4000), (1, 4094, 4000), (2, 3600, 4094)]);
        frame.objects[3] = DetectedObject { area: 50, ..DetectedObject::ABSENT };
        frame.objects[4] = DetectedObject { area: 50, cx: 4094, cy: CENTROID_ABSENT, ..DetectedObject::default() };

        assert_eq!(tracker.update(&frame), TrackingOutcome::Partial { assigned: 3 });
        let br = tracker.slots()[Corner::BottomRight.index()];
        assert_eq!(br.object, None);
        assert_eq!(br.position, Some(Point::new(4094, 4094)));
    }

    #[test]
    fn lost_marker_is_reacquired_and_others_keep_identity() {
        let mut tracker = locked_tracker();

        for step in 0..5u16 {
            // Top-right marker hidden; others drift a little.
            let frame = frame_with_points(&[
                (0, TL.0 + step, TL.1),
                (2, BL.0 + step, BL.1),
                (3, BR.0 + step, BR.1),
            ]);
            assert_eq!(tracker.update(&frame), TrackingOutcome::Partial { assigned: 3 });

            let slots = tracker.slots();
            assert_eq!(slots[Corner::TopLeft.index()].object, Some(0));
            assert_eq!(slots[Corner::TopRight.index()].object, None);
            assert_eq!(slots[Corner::BottomLeft.index()].object, Some(2));
            assert_eq!(slots[Corner::BottomRight.index()].object, Some(3));
            assert_eq!(slots[Corner::TopRight.index()].position, Some(Point::new(1400, 1000)));
        }

        let frame = frame_with_points(&[
            (0, TL.0 + 5, TL.1),
            (9, TR.0 + 4, TR.1 + 1),
            (2, BL.0 + 5, BL.1),
            (3, BR.0 + 5, BR.1),
        ]);
        assert_eq!(tracker.update(&frame), TrackingOutcome::Tracked);
        assert_eq!(tracker.slots()[Corner::TopRight.index()].object, Some(9));
        assert_eq!(
            positions(&tracker),
            vec![Some((1005, 1000)), Some((1404, 1001)), Some((1005, 1150)), Some((1405, 1150))]
        );
    }

    #[test]
    fn far_jump_falls_back_to_identification() {
        let mut tracker = locked_tracker();
        let frame = frame_with_points(&[(4, 200, 300), (5, 600, 300), (6, 200, 450), (7, 600, 450)]);

        assert_eq!(tracker.update(&frame), TrackingOutcome::Reidentified);
        let objects: Vec<_> = tracker.slots().iter().map(|m| m.object).collect();
        assert_eq!(objects, vec![Some(4), Some(5), Some(6), Some(7)]);
    }

    #[test]
    fn equidistant_detections_prefer_lower_slot() {
        let mut tracker = locked_tracker();
        // Two detections 3 px either side of the top-left marker.
        let frame = frame_with_points(&[
            (7, TL.0 + 3, TL.1),
            (5, TL.0 - 3, TL.1),
            (1, TR.0, TR.1),
            (2, BL.0, BL.1),
            (3, BR.0, BR.1),
        ]);
        assert_eq!(tracker.update(&frame), TrackingOutcome::Tracked);
        assert_eq!(tracker.slots()[Corner::TopLeft.index()].object, Some(5));
    }

    #[test]
    fn empty_frames_keep_stale_positions() {
        let mut tracker = locked_tracker();
        let before = positions(&tracker);

        assert_eq!(tracker.update(&Frame::default()), TrackingOutcome::Partial { assigned: 0 });
        assert!(tracker.slots().iter().all(|s| !s.is_assigned()));
        assert_eq!(positions(&tracker), before);
        assert_eq!(tracker.frames(), 2);

        tracker.reset();
        assert!(positions(&tracker).iter().all(Option::is_none));
    }

    proptest! {
        #[test]
        fn small_jitter_never_swaps_identities(
            jitter in prop::collection::vec((-2i32..=2, -2i32..=2), 400)
        ) {
            let corners = [TL, TR, BL, BR];
            let mut tracker = MarkerTracker::default();

            for frame_index in 0..100usize {
                let mut points = Vec::new();
                for (corner, &(x, y)) in corners.iter().enumerate() {
                    let (dx, dy) = jitter[frame_index * 4 + corner];
                    // Slot assignment rotates every frame.
                    let slot = (corner * 3 + frame_index) % OBJECT_SLOTS;
                    points.push((slot, (x as i32 + dx) as u16, (y as i32 + dy) as u16));
                }
                let frame = frame_with_points(&points);
                let outcome = tracker.update(&frame);

                if frame_index == 0 {
                    prop_assert_eq!(outcome, TrackingOutcome::Reidentified);
                } else {
                    prop_assert_eq!(outcome, TrackingOutcome::Tracked);
                }
                for (corner, slot) in tracker.slots().iter().enumerate() {
                    prop_assert_eq!(slot.object, Some(points[corner].0));
                }
            }
        }
    }
}
