//! Marker identities and their per-frame state.

use serde::{Deserialize, Serialize};

use crate::sensor::DetectedObject;

/// Sensor-space pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(self, other: Point) -> u64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

impl From<&DetectedObject> for Point {
    fn from(object: &DetectedObject) -> Self {
        Point::new(i32::from(object.cx), i32::from(object.cy))
    }
}

/// Physical marker position on the target, as seen facing the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Canonical order: scan order top to bottom, left to right.
    pub const ALL: [Corner; 4] = [Corner::TopLeft, Corner::TopRight, Corner::BottomLeft, Corner::BottomRight];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One of the four tracked markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSlot {
    pub corner: Corner,
    /// Last known position. Kept while the marker is unassigned.
    pub position: Option<Point>,
    /// Slot of the detection matched in the current frame.
    pub object: Option<usize>,
}

impl MarkerSlot {
    pub const fn new(corner: Corner) -> Self {
        Self { corner, position: None, object: None }
    }

    pub fn is_assigned(&self) -> bool {
        self.object.is_some()
    }

    pub(crate) fn assign(&mut self, object: usize, position: Point) {
        self.object = Some(object);
        self.position = Some(position);
    }
}

/// Fresh slots in canonical order.
pub fn initial_slots() -> [MarkerSlot; 4] {
    Corner::ALL.map(MarkerSlot::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_do_not_overflow() {
        let a = Point::new(i32::MIN, i32::MIN);
        let b = Point::new(i32::MAX, i32::MAX);
        assert!(a.distance_squared(b) > u64::from(u32::MAX));
        assert_eq!(Point::new(3, 4).distance_squared(Point::new(0, 0)), 25);
    }

    #[test]
    fn slots_start_unknown_in_canonical_order() {
        let slots = initial_slots();
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.corner.index(), i);
            assert!(slot.position.is_none());
            assert!(!slot.is_assigned());
        }
    }
}
