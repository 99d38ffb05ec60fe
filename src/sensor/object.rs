//! Bit-packed object records produced by the sensor.
//!
//! Every report is 16 slots of 16 bytes. All formats start with area and
//! centroid; what follows depends on the format the sensor was asked for:
//!
//! | Format | Bytes 6-8 (brightness) | Bounding box / aspect / velocity |
//! |--------|------------------------|----------------------------------|
//! | 1      | yes                    | bytes 9-15                       |
//! | 2      | no                     | no                               |
//! | 3      | yes                    | no                               |
//! | 4      | no                     | bytes 6-12                       |
//!
//! Fields a format does not carry are zero.

use serde::{Deserialize, Serialize};

/// Bytes per object slot in a report.
pub const OBJECT_SLOT_BYTES: usize = 16;

/// Centroid coordinate the sensor writes into slots with no object.
///
/// A slot is empty when either axis is at or above this value.
pub const CENTROID_ABSENT: u16 = 0xfff;

/// Layout of the object data in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Everything: brightness, bounding box, aspect and velocity.
    #[default]
    Full,
    /// Area and centroid only.
    Compact,
    /// Area, centroid and brightness.
    Brightness,
    /// Area, centroid, bounding box, aspect and velocity.
    Shape,
}

impl ReportFormat {
    /// Format for a wire code. Codes outside 1-4 decode as area and centroid only.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ReportFormat::Full,
            3 => ReportFormat::Brightness,
            4 => ReportFormat::Shape,
            _ => ReportFormat::Compact,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            ReportFormat::Full => 1,
            ReportFormat::Compact => 2,
            ReportFormat::Brightness => 3,
            ReportFormat::Shape => 4,
        }
    }

    /// Register bank the sensor exposes this format's object data in.
    pub const fn bank(self) -> u8 {
        match self {
            ReportFormat::Full => 5,
            ReportFormat::Compact => 9,
            ReportFormat::Brightness => 10,
            ReportFormat::Shape => 11,
        }
    }

    /// Length of the burst read that fetches a report in this format.
    pub const fn report_bytes(self) -> usize {
        match self {
            ReportFormat::Full => 256,
            ReportFormat::Compact => 96,
            ReportFormat::Brightness => 144,
            ReportFormat::Shape => 208,
        }
    }

    fn has_brightness(self) -> bool {
        matches!(self, ReportFormat::Full | ReportFormat::Brightness)
    }

    /// Byte offset of the bounding box, if the format carries one.
    fn shape_offset(self) -> Option<usize> {
        match self {
            ReportFormat::Full => Some(9),
            ReportFormat::Shape => Some(6),
            _ => None,
        }
    }
}

/// One detected object slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Pixel area (14 bits).
    pub area: u16,
    /// Centroid x (12 bits).
    pub cx: u16,
    /// Centroid y (12 bits).
    pub cy: u16,
    pub average_brightness: u8,
    pub max_brightness: u8,
    /// Dynamic range (4 bits).
    pub range: u8,
    /// Radius (4 bits).
    pub radius: u8,
    /// Bounding box edges (7 bits each).
    pub boundary_left: u8,
    pub boundary_right: u8,
    pub boundary_top: u8,
    pub boundary_bottom: u8,
    pub aspect_ratio: u8,
    /// Raw velocity bytes as reported by the sensor.
    pub vx: u8,
    pub vy: u8,
}

impl DetectedObject {
    /// Slot with the absent-centroid marker in both axes.
    pub const ABSENT: DetectedObject = DetectedObject {
        area: 0,
        cx: CENTROID_ABSENT,
        cy: CENTROID_ABSENT,
        average_brightness: 0,
        max_brightness: 0,
        range: 0,
        radius: 0,
        boundary_left: 0,
        boundary_right: 0,
        boundary_top: 0,
        boundary_bottom: 0,
        aspect_ratio: 0,
        vx: 0,
        vy: 0,
    };

    /// Decode one 16 byte slot. Total for every format code.
    pub fn decode(slot: &[u8; OBJECT_SLOT_BYTES], format: ReportFormat) -> Self {
        let mut object = DetectedObject {
            area: u16::from(slot[0]) | (u16::from(slot[1] & 0x3f) << 8),
            cx: u16::from(slot[2]) | (u16::from(slot[3] & 0x0f) << 8),
            cy: u16::from(slot[4]) | (u16::from(slot[5] & 0x0f) << 8),
            ..DetectedObject::default()
        };

        if format.has_brightness() {
            object.average_brightness = slot[6];
            object.max_brightness = slot[7];
            object.range = slot[8] >> 4;
            object.radius = slot[8] & 0x0f;
        }

        if let Some(offset) = format.shape_offset() {
            object.boundary_left = slot[offset] & 0x7f;
            object.boundary_right = slot[offset + 1] & 0x7f;
            object.boundary_top = slot[offset + 2] & 0x7f;
            object.boundary_bottom = slot[offset + 3] & 0x7f;
            object.aspect_ratio = slot[offset + 4];
            object.vx = slot[offset + 5];
            object.vy = slot[offset + 6];
        }

        object
    }

    /// Whether the slot holds a real detection.
    pub fn is_on_screen(&self) -> bool {
        self.cx < CENTROID_ABSENT && self.cy < CENTROID_ABSENT
    }
}
