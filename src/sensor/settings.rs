//! Sensor configuration readout over the register protocol.
//!
//! The host sends one [`Packet::ReadRegister`] per register in
//! [`SETTINGS_REGISTERS`] and collects the responses with a
//! [`SettingsCollector`]. Multi-byte values are spread over consecutive
//! registers, least significant byte first.
//!
//! The interpolated output resolution is the one setting written back, see
//! [`SensorSettings::resolution_writes`].

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::packet::{Packet, PacketKind, RawPacket, Register, RegisterValue, StreamFramer};
use crate::source::ByteSource;
use crate::{Result, TrackingError};

/// Product id reported by the supported sensor.
pub const PRODUCT_ID: u16 = 0x7025;

/// Frame period register resolution.
const FRAME_PERIOD_UNIT: Duration = Duration::from_nanos(100);

const PRODUCT_ID_REGS: [Register; 2] = [Register::new(0x00, 0x02), Register::new(0x00, 0x03)];
const NOISE_THRESHOLD_REG: Register = Register::new(0x00, 0x0f);
const MAX_AREA_THRESHOLD_REGS: [Register; 2] = [Register::new(0x00, 0x0b), Register::new(0x00, 0x0c)];
const ORIENTATION_RATIO_REG: Register = Register::new(0x00, 0x10);
const ORIENTATION_FACTOR_REG: Register = Register::new(0x00, 0x11);
const MAX_OBJECTS_REG: Register = Register::new(0x00, 0x19);
const GAIN_1_REG: Register = Register::new(0x01, 0x05);
const GAIN_2_REG: Register = Register::new(0x01, 0x06);
const EXPOSURE_REGS: [Register; 2] = [Register::new(0x01, 0x0e), Register::new(0x01, 0x0f)];
const RESOLUTION_X_REGS: [Register; 2] = [Register::new(0x0c, 0x60), Register::new(0x0c, 0x61)];
const RESOLUTION_Y_REGS: [Register; 2] = [Register::new(0x0c, 0x62), Register::new(0x0c, 0x63)];
const FRAME_PERIOD_REGS: [Register; 3] =
    [Register::new(0x0c, 0x07), Register::new(0x0c, 0x08), Register::new(0x0c, 0x09)];

/// Every register read to build [`SensorSettings`], in request order.
pub const SETTINGS_REGISTERS: [Register; 19] = [
    PRODUCT_ID_REGS[0],
    PRODUCT_ID_REGS[1],
    NOISE_THRESHOLD_REG,
    MAX_AREA_THRESHOLD_REGS[0],
    MAX_AREA_THRESHOLD_REGS[1],
    ORIENTATION_RATIO_REG,
    ORIENTATION_FACTOR_REG,
    MAX_OBJECTS_REG,
    GAIN_1_REG,
    GAIN_2_REG,
    EXPOSURE_REGS[0],
    EXPOSURE_REGS[1],
    RESOLUTION_X_REGS[0],
    RESOLUTION_X_REGS[1],
    RESOLUTION_Y_REGS[0],
    RESOLUTION_Y_REGS[1],
    FRAME_PERIOD_REGS[0],
    FRAME_PERIOD_REGS[1],
    FRAME_PERIOD_REGS[2],
];

/// Packet handler that gathers register read responses.
///
/// Accepts each settings register the first time it is answered; repeats
/// and unrelated packets are rejected.
#[derive(Debug, Default, Clone)]
pub struct SettingsCollector {
    values: BTreeMap<Register, u8>,
}

impl SettingsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &BTreeMap<Register, u8> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<Register, u8> {
        self.values
    }
}

impl crate::packet::PacketHandler for SettingsCollector {
    fn on_packet(&mut self, packet: RawPacket<'_>) -> bool {
        if packet.kind() != Some(PacketKind::ReadRegisterResponse) {
            return false;
        }
        match packet.decode() {
            Ok(Packet::ReadRegisterResponse(value)) => {
                if !SETTINGS_REGISTERS.contains(&value.register) {
                    trace!("Ignoring response for unrelated register {:?}", value.register);
                    return false;
                }
                self.values.insert(value.register, value.data).is_none()
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Dropping malformed register response: {}", e);
                false
            }
        }
    }
}

/// Sensor configuration as read back from its registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSettings {
    pub product_id: u16,
    pub noise_threshold: u8,
    pub max_area_threshold: u16,
    pub orientation_ratio: u8,
    pub orientation_factor: u8,
    pub max_objects: u8,
    pub gain_1: u8,
    pub gain_2: u8,
    pub exposure: u16,
    pub resolution_x: u16,
    pub resolution_y: u16,
    /// Raw 24-bit frame period in 100 ns units.
    pub frame_period_raw: u32,
}

impl SensorSettings {
    /// Read requests for every settings register, in order.
    pub fn requests() -> impl Iterator<Item = Packet> {
        SETTINGS_REGISTERS.into_iter().map(Packet::ReadRegister)
    }

    /// Encoded read requests, ready to write to the link.
    pub fn encode_requests() -> Vec<u8> {
        let mut out = Vec::new();
        for request in Self::requests() {
            request.encode_into(&mut out);
        }
        out
    }

    /// Register writes that set the interpolated output resolution.
    ///
    /// High bytes go first and keep only their low nibble, as the sensor
    /// resolution is 12 bits wide.
    pub fn resolution_writes(resolution_x: u16, resolution_y: u16) -> [Packet; 4] {
        let write = |register: Register, data: u16| {
            Packet::WriteRegister(RegisterValue { register, data: data as u8 })
        };
        [
            write(RESOLUTION_X_REGS[1], (resolution_x >> 8) & 0x0f),
            write(RESOLUTION_X_REGS[0], resolution_x & 0xff),
            write(RESOLUTION_Y_REGS[1], (resolution_y >> 8) & 0x0f),
            write(RESOLUTION_Y_REGS[0], resolution_y & 0xff),
        ]
    }

    /// Encoded resolution writes, ready to write to the link.
    pub fn encode_resolution_writes(resolution_x: u16, resolution_y: u16) -> Vec<u8> {
        let mut out = Vec::new();
        for write in Self::resolution_writes(resolution_x, resolution_y) {
            write.encode_into(&mut out);
        }
        out
    }

    /// Build settings from collected register values.
    pub fn from_registers(values: &BTreeMap<Register, u8>) -> Result<Self> {
        let byte = |register: Register| {
            values.get(&register).copied().ok_or_else(|| {
                TrackingError::parse(
                    "sensor settings",
                    format!(
                        "missing register bank {:#04x} address {:#04x}",
                        register.bank, register.address
                    ),
                )
            })
        };
        let word = |registers: [Register; 2]| -> Result<u16> {
            Ok(u16::from_le_bytes([byte(registers[0])?, byte(registers[1])?]))
        };

        let [p0, p1, p2] = FRAME_PERIOD_REGS;
        let frame_period_raw = u32::from_le_bytes([byte(p0)?, byte(p1)?, byte(p2)?, 0]);

        Ok(Self {
            product_id: word(PRODUCT_ID_REGS)?,
            noise_threshold: byte(NOISE_THRESHOLD_REG)?,
            max_area_threshold: word(MAX_AREA_THRESHOLD_REGS)?,
            orientation_ratio: byte(ORIENTATION_RATIO_REG)?,
            orientation_factor: byte(ORIENTATION_FACTOR_REG)?,
            max_objects: byte(MAX_OBJECTS_REG)?,
            gain_1: byte(GAIN_1_REG)?,
            gain_2: byte(GAIN_2_REG)?,
            exposure: word(EXPOSURE_REGS)?,
            resolution_x: word(RESOLUTION_X_REGS)?,
            resolution_y: word(RESOLUTION_Y_REGS)?,
            frame_period_raw,
        })
    }

    /// Drive `framer` until every settings register has been answered.
    ///
    /// The read requests must already have been sent.
    pub fn read<S: ByteSource>(framer: &mut StreamFramer<S, SettingsCollector>) -> Result<Self> {
        let pending = SETTINGS_REGISTERS.len() - framer.handler().values().len();
        framer.wait_for_packets(pending)?;
        let settings = Self::from_registers(framer.handler().values())?;
        debug!(
            "Sensor settings: product {:#06x}, {}x{}, {:.2} Hz",
            settings.product_id,
            settings.resolution_x,
            settings.resolution_y,
            settings.frame_rate_hz()
        );
        Ok(settings)
    }

    pub fn is_known_product(&self) -> bool {
        self.product_id == PRODUCT_ID
    }

    pub fn frame_period(&self) -> Duration {
        FRAME_PERIOD_UNIT * self.frame_period_raw
    }

    /// Frames per second, zero when the period register reads zero.
    pub fn frame_rate_hz(&self) -> f64 {
        let period = self.frame_period().as_secs_f64();
        if period > 0.0 { 1.0 / period } else { 0.0 }
    }
}
