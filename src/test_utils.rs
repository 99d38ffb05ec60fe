//! Fixture builders shared by unit tests and benchmarks.
//!
//! Everything here produces in-memory byte streams and frames; nothing reads
//! from disk.

#![cfg(any(test, feature = "benchmark"))]

use crate::packet::{ObjectReport, Packet, REPORT_DATA_BYTES};
use crate::sensor::{DetectedObject, Frame, OBJECT_SLOT_BYTES};

/// Area given to detections built by the helpers below.
pub const FIXTURE_AREA: u16 = 40;

/// Concatenate the wire encoding of `packets`.
pub fn encode_stream(packets: &[Packet]) -> Vec<u8> {
    let mut out = Vec::new();
    for packet in packets {
        packet.encode_into(&mut out);
    }
    out
}

/// Pack area and centroid into one report slot, other fields zero.
pub fn encode_object_slot(area: u16, cx: u16, cy: u16) -> [u8; OBJECT_SLOT_BYTES] {
    let mut slot = [0u8; OBJECT_SLOT_BYTES];
    slot[0] = area as u8;
    slot[1] = (area >> 8) as u8 & 0x3f;
    slot[2] = cx as u8;
    slot[3] = (cx >> 8) as u8 & 0x0f;
    slot[4] = cy as u8;
    slot[5] = (cy >> 8) as u8 & 0x0f;
    slot
}

/// Report with one detection per centroid in the leading slots; the rest are empty.
pub fn report_with_centroids(centroids: &[(u16, u16)], format: u8) -> ObjectReport {
    let mut data = [0xffu8; REPORT_DATA_BYTES];
    for (slot, &(cx, cy)) in data.chunks_exact_mut(OBJECT_SLOT_BYTES).zip(centroids) {
        slot.copy_from_slice(&encode_object_slot(FIXTURE_AREA, cx, cy));
    }
    ObjectReport { data, format }
}

/// Frame with detections at the given `(slot, cx, cy)` positions.
pub fn frame_with_points(points: &[(usize, u16, u16)]) -> Frame {
    let mut frame = Frame::default();
    for &(slot, cx, cy) in points {
        frame.objects[slot] = DetectedObject { area: FIXTURE_AREA, cx, cy, ..DetectedObject::default() };
    }
    frame
}

/// Wrap each chunk as one recorded block.
pub fn capture_from_chunks<'a, I>(chunks: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut capture = Vec::new();
    for chunk in chunks {
        capture.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        capture.extend_from_slice(chunk);
    }
    capture
}

/// Marker rectangle drifting one pixel right per frame, as a packet stream.
///
/// Corners are written in a different slot order every frame and each report
/// is preceded by a report request echo.
pub fn drifting_rectangle_stream(frames: usize) -> Vec<u8> {
    let mut packets = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let dx = i as u16;
        let mut corners = [(1000 + dx, 1000), (1400 + dx, 1000), (1000 + dx, 1150), (1400 + dx, 1150)];
        corners.rotate_left(i % 4);
        packets.push(Packet::ObjectReportRequest);
        packets.push(Packet::ObjectReport(Box::new(report_with_centroids(&corners, 1))));
    }
    encode_stream(&packets)
}

/// [`drifting_rectangle_stream`] recorded with reads of `chunk_size` bytes.
pub fn drifting_rectangle_capture(frames: usize, chunk_size: usize) -> Vec<u8> {
    let stream = drifting_rectangle_stream(frames);
    capture_from_chunks(stream.chunks(chunk_size.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_encoding_matches_decoder() {
        let slot = encode_object_slot(0x3fff, 0xabc, 0x123);
        let object = DetectedObject::decode(&slot, crate::sensor::ReportFormat::Compact);
        assert_eq!((object.area, object.cx, object.cy), (0x3fff, 0xabc, 0x123));
    }

    #[test]
    fn drifting_capture_replays_every_frame() {
        let capture = drifting_rectangle_capture(3, 17);
        let stream = drifting_rectangle_stream(3);
        // 4 length bytes per block on top of the stream itself.
        assert_eq!(capture.len(), stream.len() + stream.len().div_ceil(17) * 4);
    }
}
