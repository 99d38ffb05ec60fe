//! Wire layout of every packet kind.
//!
//! A packet is a two byte header followed by its payload:
//!
//! 1. **Word count** (`u8`) - payload length in 16-bit words
//! 2. **Kind** (`u8`) - one of [`PacketKind`]
//! 3. **Payload** - `2 * words` bytes, layout fixed per kind
//!
//! Payload sizes are checked at compile time: each must be a whole number of
//! words and fit in the 255 word limit of the header. The word count written
//! into a header is always derived from the kind, never supplied by callers.

use crate::{Result, TrackingError};

/// Size of the packet header in bytes.
pub const HEADER_BYTES: usize = 2;

/// Largest payload a header can describe (255 words).
pub const MAX_PAYLOAD_BYTES: usize = u8::MAX as usize * 2;

/// Packed object data carried by an object report (16 slots of 16 bytes).
pub const REPORT_DATA_BYTES: usize = 256;

const REGISTER_WRITE_BYTES: usize = 4;
const REGISTER_READ_BYTES: usize = 2;
const REPORT_PAYLOAD_BYTES: usize = REPORT_DATA_BYTES + 2;

/// Closed set of packet kinds understood by both ends of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    WriteRegister = 0,
    ReadRegister = 1,
    ReadRegisterResponse = 2,
    ObjectReportRequest = 3,
    ObjectReport = 4,
}

impl PacketKind {
    pub const ALL: [PacketKind; 5] = [
        PacketKind::WriteRegister,
        PacketKind::ReadRegister,
        PacketKind::ReadRegisterResponse,
        PacketKind::ObjectReportRequest,
        PacketKind::ObjectReport,
    ];

    /// Fixed payload size of this kind in bytes.
    pub const fn payload_bytes(self) -> usize {
        match self {
            PacketKind::WriteRegister => REGISTER_WRITE_BYTES,
            PacketKind::ReadRegister => REGISTER_READ_BYTES,
            PacketKind::ReadRegisterResponse => REGISTER_WRITE_BYTES,
            PacketKind::ObjectReportRequest => 0,
            PacketKind::ObjectReport => REPORT_PAYLOAD_BYTES,
        }
    }

    /// Header word count for this kind.
    pub const fn words(self) -> u8 {
        checked_words(self.payload_bytes())
    }

    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::WriteRegister => "WriteRegister",
            PacketKind::ReadRegister => "ReadRegister",
            PacketKind::ReadRegisterResponse => "ReadRegisterResponse",
            PacketKind::ObjectReportRequest => "ObjectReportRequest",
            PacketKind::ObjectReport => "ObjectReport",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = TrackingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PacketKind::WriteRegister),
            1 => Ok(PacketKind::ReadRegister),
            2 => Ok(PacketKind::ReadRegisterResponse),
            3 => Ok(PacketKind::ObjectReportRequest),
            4 => Ok(PacketKind::ObjectReport),
            id => Err(TrackingError::UnknownPacketKind { id }),
        }
    }
}

const fn checked_words(bytes: usize) -> u8 {
    assert!(bytes % 2 == 0, "packet payload must be a whole number of 16-bit words");
    assert!(bytes <= MAX_PAYLOAD_BYTES, "packet payload must not exceed 255 words");
    (bytes / 2) as u8
}

/// Largest word count of any known packet kind.
pub const MAX_KNOWN_WORDS: u8 = {
    let mut max = 0;
    let mut i = 0;
    while i < PacketKind::ALL.len() {
        // Fails the build if any kind violates the size rules.
        let words = PacketKind::ALL[i].words();
        if words > max {
            max = words;
        }
        i += 1;
    }
    max
};

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    words: u8,
    id: u8,
}

impl PacketHeader {
    /// Header for a packet of the given kind.
    pub const fn for_kind(kind: PacketKind) -> Self {
        Self { words: kind.words(), id: kind as u8 }
    }

    /// Interpret two raw header bytes as received from the wire.
    pub fn from_bytes(bytes: [u8; HEADER_BYTES]) -> Self {
        Self { words: bytes[0], id: bytes[1] }
    }

    pub fn to_bytes(self) -> [u8; HEADER_BYTES] {
        [self.words, self.id]
    }

    pub fn words(&self) -> u8 {
        self.words
    }

    /// Raw kind byte, which may name a kind this library does not know.
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::try_from(self.id).ok()
    }

    pub fn payload_bytes(&self) -> usize {
        self.words as usize * 2
    }

    /// Header plus payload.
    pub fn packet_bytes(&self) -> usize {
        HEADER_BYTES + self.payload_bytes()
    }
}

/// A sensor register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register {
    pub bank: u8,
    pub address: u8,
}

impl Register {
    pub const fn new(bank: u8, address: u8) -> Self {
        Self { bank, address }
    }
}

/// A register together with the byte written to or read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue {
    pub register: Register,
    pub data: u8,
}

/// Raw object data as sent by the sensor for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReport {
    pub data: [u8; REPORT_DATA_BYTES],
    /// Format code the data was captured with (1-4).
    pub format: u8,
}

/// A fully decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    WriteRegister(RegisterValue),
    ReadRegister(Register),
    ReadRegisterResponse(RegisterValue),
    ObjectReportRequest,
    ObjectReport(Box<ObjectReport>),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::WriteRegister(_) => PacketKind::WriteRegister,
            Packet::ReadRegister(_) => PacketKind::ReadRegister,
            Packet::ReadRegisterResponse(_) => PacketKind::ReadRegisterResponse,
            Packet::ObjectReportRequest => PacketKind::ObjectReportRequest,
            Packet::ObjectReport(_) => PacketKind::ObjectReport,
        }
    }

    /// Encode header and payload into a new buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.kind().payload_bytes());
        self.encode_into(&mut out);
        out
    }

    /// Append header and payload to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&PacketHeader::for_kind(self.kind()).to_bytes());
        match self {
            Packet::WriteRegister(value) | Packet::ReadRegisterResponse(value) => {
                out.extend_from_slice(&[value.register.bank, value.register.address, value.data, 0]);
            }
            Packet::ReadRegister(register) => {
                out.extend_from_slice(&[register.bank, register.address]);
            }
            Packet::ObjectReportRequest => {}
            Packet::ObjectReport(report) => {
                out.extend_from_slice(&report.data);
                out.extend_from_slice(&[report.format, 0]);
            }
        }
    }

    /// Decode a payload of a known kind.
    pub fn decode(kind: PacketKind, payload: &[u8]) -> Result<Self> {
        let expected = kind.payload_bytes();
        if payload.len() != expected {
            return Err(TrackingError::PacketSize {
                kind: kind.name(),
                expected,
                found: payload.len(),
            });
        }

        let packet = match kind {
            PacketKind::WriteRegister => Packet::WriteRegister(register_value(payload)),
            PacketKind::ReadRegister => {
                Packet::ReadRegister(Register::new(payload[0], payload[1]))
            }
            PacketKind::ReadRegisterResponse => {
                Packet::ReadRegisterResponse(register_value(payload))
            }
            PacketKind::ObjectReportRequest => Packet::ObjectReportRequest,
            PacketKind::ObjectReport => {
                let mut data = [0u8; REPORT_DATA_BYTES];
                data.copy_from_slice(&payload[..REPORT_DATA_BYTES]);
                Packet::ObjectReport(Box::new(ObjectReport {
                    data,
                    format: payload[REPORT_DATA_BYTES],
                }))
            }
        };
        Ok(packet)
    }
}

fn register_value(payload: &[u8]) -> RegisterValue {
    RegisterValue { register: Register::new(payload[0], payload[1]), data: payload[2] }
}

/// A complete packet as delivered by the framer, borrowed from its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPacket<'a> {
    /// Raw kind byte from the header.
    pub id: u8,
    pub payload: &'a [u8],
}

impl RawPacket<'_> {
    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::try_from(self.id).ok()
    }

    pub fn decode(&self) -> Result<Packet> {
        Packet::decode(PacketKind::try_from(self.id)?, self.payload)
    }
}
