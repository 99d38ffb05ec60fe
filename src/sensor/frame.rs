//! One decoded object report.

use super::object::{DetectedObject, OBJECT_SLOT_BYTES, ReportFormat};
use crate::packet::{ObjectReport, REPORT_DATA_BYTES};

/// Number of object slots in a report.
pub const OBJECT_SLOTS: usize = REPORT_DATA_BYTES / OBJECT_SLOT_BYTES;

/// The 16 detections of one report, in slot order.
///
/// Slot order carries no identity; the sensor may report the same blob in a
/// different slot every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub objects: [DetectedObject; OBJECT_SLOTS],
    pub format: ReportFormat,
}

impl Default for Frame {
    fn default() -> Self {
        Self { objects: [DetectedObject::ABSENT; OBJECT_SLOTS], format: ReportFormat::default() }
    }
}

impl Frame {
    pub fn decode(data: &[u8; REPORT_DATA_BYTES], format: ReportFormat) -> Self {
        let mut objects = [DetectedObject::ABSENT; OBJECT_SLOTS];
        for (object, slot) in objects.iter_mut().zip(data.chunks_exact(OBJECT_SLOT_BYTES)) {
            let mut bytes = [0u8; OBJECT_SLOT_BYTES];
            bytes.copy_from_slice(slot);
            *object = DetectedObject::decode(&bytes, format);
        }
        Self { objects, format }
    }

    pub fn from_report(report: &ObjectReport) -> Self {
        Self::decode(&report.data, ReportFormat::from_code(report.format))
    }

    /// On-screen detections with their slot index.
    pub fn on_screen(&self) -> impl Iterator<Item = (usize, &DetectedObject)> + '_ {
        self.objects.iter().enumerate().filter(|(_, object)| object.is_on_screen())
    }

    pub fn on_screen_count(&self) -> usize {
        self.on_screen().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::CENTROID_ABSENT;
    use crate::test_utils::{encode_object_slot, report_with_centroids};

    #[test]
    fn default_frame_is_empty() {
        let frame = Frame::default();
        assert_eq!(frame.on_screen_count(), 0);
        assert!(frame.objects.iter().all(|o| o.cx == CENTROID_ABSENT));
    }

    #[test]
    fn slots_decode_at_their_stride() {
        let mut data = [0xffu8; REPORT_DATA_BYTES];
        data[3 * OBJECT_SLOT_BYTES..4 * OBJECT_SLOT_BYTES]
            .copy_from_slice(&encode_object_slot(321, 100, 200));
        data[15 * OBJECT_SLOT_BYTES..].copy_from_slice(&encode_object_slot(7, 4094, 1));

        let frame = Frame::decode(&data, ReportFormat::Compact);
        let visible: Vec<_> = frame.on_screen().map(|(i, o)| (i, o.area, o.cx, o.cy)).collect();
        assert_eq!(visible, vec![(3, 321, 100, 200), (15, 7, 4094, 1)]);
    }

    #[test]
    fn report_format_code_is_honoured() {
        let report = report_with_centroids(&[(10, 20), (30, 40)], 3);
        let frame = Frame::from_report(&report);
        assert_eq!(frame.format, ReportFormat::Brightness);
        assert_eq!(frame.on_screen_count(), 2);
        assert_eq!((frame.objects[1].cx, frame.objects[1].cy), (30, 40));
    }
}
