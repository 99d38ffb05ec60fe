//! Packet layout and stream reassembly for the sensor link.

pub mod format;
pub mod framer;

pub use format::{
    HEADER_BYTES, MAX_KNOWN_WORDS, MAX_PAYLOAD_BYTES, ObjectReport, Packet, PacketHeader, PacketKind,
    REPORT_DATA_BYTES, RawPacket, Register, RegisterValue,
};
pub use framer::{FramerState, PacketHandler, StreamFramer};
