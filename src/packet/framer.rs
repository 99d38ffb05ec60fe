//! Incremental packet assembly over a non-blocking byte source.
//!
//! The framer holds at most one packet in flight. Each step asks the source
//! only for the bytes still missing from the current header or payload, so a
//! short read simply leaves the partial packet in place for the next step.
//!
//! The header is always re-read from the front of the buffer by index; growing
//! the buffer for a large payload never leaves a stale view behind.

use tracing::{trace, warn};

use super::format::{HEADER_BYTES, MAX_KNOWN_WORDS, PacketHeader, RawPacket};
use crate::source::ByteSource;
use crate::{Result, TrackingError};

/// Receives every complete packet.
///
/// Returns `true` when the packet was the one the caller was waiting for.
/// Packets answered with `false` are dropped.
pub trait PacketHandler {
    fn on_packet(&mut self, packet: RawPacket<'_>) -> bool;
}

impl<F> PacketHandler for F
where
    F: FnMut(RawPacket<'_>) -> bool,
{
    fn on_packet(&mut self, packet: RawPacket<'_>) -> bool {
        self(packet)
    }
}

/// Where the framer is within the current packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// `received` of the two header bytes are buffered.
    AwaitingHeader { received: usize },
    /// Header known, `received` payload bytes buffered.
    AwaitingPayload { header: PacketHeader, received: usize },
}

/// Reassembles packets from a [`ByteSource`] and hands them to a [`PacketHandler`].
pub struct StreamFramer<S, H> {
    source: S,
    handler: H,
    buffer: Vec<u8>,
    filled: usize,
    max_words: u8,
    delivered: u64,
    resyncs: u64,
}

impl<S, H> StreamFramer<S, H>
where
    S: ByteSource,
    H: PacketHandler,
{
    pub fn new(source: S, handler: H) -> Self {
        Self {
            source,
            handler,
            buffer: vec![0; HEADER_BYTES],
            filled: 0,
            max_words: MAX_KNOWN_WORDS,
            delivered: 0,
            resyncs: 0,
        }
    }

    /// Override the largest word count accepted in a header.
    ///
    /// Headers above the bound are treated as line noise and trigger a resync.
    /// The bound never drops below the largest known packet.
    pub fn with_max_packet_words(mut self, words: u8) -> Self {
        self.max_words = words.max(MAX_KNOWN_WORDS);
        self
    }

    /// Perform at most one packet-assembly step.
    ///
    /// Returns `true` when a packet completed and the handler accepted it.
    pub fn tick(&mut self) -> Result<bool> {
        self.try_get_packet()
    }

    /// Drive the framer until `count` packets have been accepted by the handler.
    ///
    /// Rejected packets are consumed and do not count. Fails with
    /// [`TrackingError::SourceClosed`] if the source disconnects first.
    pub fn wait_for_packets(&mut self, count: usize) -> Result<()> {
        let mut remaining = count;
        while remaining > 0 {
            if self.try_get_packet()? {
                remaining -= 1;
            } else if !self.source.is_connected() {
                return Err(TrackingError::source_closed(remaining));
            }
        }
        Ok(())
    }

    pub fn state(&self) -> FramerState {
        if self.filled < HEADER_BYTES {
            FramerState::AwaitingHeader { received: self.filled }
        } else {
            FramerState::AwaitingPayload {
                header: self.header(),
                received: self.filled - HEADER_BYTES,
            }
        }
    }

    /// Discard any partially assembled packet.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    /// Packets handed to the handler so far, accepted or not.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Headers rejected by the word-count bound so far.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_parts(self) -> (S, H) {
        (self.source, self.handler)
    }

    fn header(&self) -> PacketHeader {
        PacketHeader::from_bytes([self.buffer[0], self.buffer[1]])
    }

    fn try_get_packet(&mut self) -> Result<bool> {
        if self.filled < HEADER_BYTES {
            if !self.pull(HEADER_BYTES)? {
                return Ok(false);
            }

            let header = self.header();
            if header.words() > self.max_words {
                warn!(
                    "Rejecting header with {} words (max {}), kind {:#04x}; resynchronizing",
                    header.words(),
                    self.max_words,
                    header.id()
                );
                // Slide by one byte: the kind byte may be the start of the real header.
                self.buffer[0] = self.buffer[1];
                self.filled = 1;
                self.resyncs += 1;
                return Ok(false);
            }
        }

        let header = self.header();
        let packet_bytes = header.packet_bytes();
        if self.buffer.len() < packet_bytes {
            self.buffer.resize(packet_bytes, 0);
        }
        if !self.pull(packet_bytes)? {
            return Ok(false);
        }

        self.filled = 0;
        self.delivered += 1;
        trace!("Packet complete: kind={:#04x}, {} payload bytes", header.id(), header.payload_bytes());

        let packet = RawPacket { id: header.id(), payload: &self.buffer[HEADER_BYTES..packet_bytes] };
        Ok(self.handler.on_packet(packet))
    }

    /// Read toward `end` buffered bytes; true once they are all present.
    fn pull(&mut self, end: usize) -> Result<bool> {
        let wanted = end - self.filled;
        if wanted == 0 {
            return Ok(true);
        }
        let received = self.source.read(&mut self.buffer[self.filled..end])?.min(wanted);
        self.filled += received;
        Ok(received == wanted)
    }
}
