//! Byte sources consumed by the stream framer.
//!
//! A [`ByteSource`] fills a caller buffer with whatever bytes are available
//! right now and reports how many it copied. Returning zero is normal and means
//! "nothing yet"; sources never block waiting for data.
//!
//! ## Capture format
//!
//! [`CaptureRecorder`] and [`CaptureReplay`] share a block format that keeps
//! the chunking of the original reads intact:
//!
//! ```text
//! [len: u32 LE][len bytes] [len: u32 LE][len bytes] ...
//! ```
//!
//! Replay never hands out bytes from two blocks in one read, so a framer fed
//! from a replay sees exactly the partial reads the live link produced.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{Result, TrackingError};

const BLOCK_LEN_BYTES: usize = 4;

/// Append-only stream of bytes polled by the framer.
pub trait ByteSource {
    /// Copy up to `buf.len()` available bytes into `buf` and return the count.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether more bytes may still arrive.
    fn is_connected(&self) -> bool {
        true
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Byte source backed by a closure, see [`from_fn`].
pub struct FnSource<F> {
    read: F,
}

/// Wrap a `FnMut(&mut [u8]) -> usize` read function as a [`ByteSource`].
pub fn from_fn<F>(read: F) -> FnSource<F>
where
    F: FnMut(&mut [u8]) -> usize,
{
    FnSource { read }
}

impl<F> ByteSource for FnSource<F>
where
    F: FnMut(&mut [u8]) -> usize,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok((self.read)(buf))
    }
}

/// In-memory source that releases bytes one queued chunk at a time.
#[derive(Debug, Default, Clone)]
pub struct ChunkedSource {
    chunks: VecDeque<Vec<u8>>,
    offset: usize,
}

impl ChunkedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue chunks in order.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut source = Self::new();
        for chunk in chunks {
            source.push(chunk);
        }
        source
    }

    /// Split `bytes` into chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(bytes: &[u8], chunk_size: usize) -> Self {
        Self::from_chunks(bytes.chunks(chunk_size.max(1)).map(<[u8]>::to_vec))
    }

    /// Queue another chunk. Empty chunks become reads that return zero.
    pub fn push(&mut self, chunk: Vec<u8>) {
        self.chunks.push_back(chunk);
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum::<usize>() - self.offset
    }
}

impl ByteSource for ChunkedSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(chunk) = self.chunks.front() else {
            return Ok(0);
        };

        let available = &chunk[self.offset..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.offset += count;

        if self.offset == chunk.len() {
            self.chunks.pop_front();
            self.offset = 0;
        }
        Ok(count)
    }

    fn is_connected(&self) -> bool {
        !self.chunks.is_empty()
    }
}

/// Replays a capture produced by [`CaptureRecorder`].
#[derive(Debug, Clone)]
pub struct CaptureReplay {
    data: Vec<u8>,
    read_idx: usize,
    block_end: usize,
    block_count: usize,
}

impl CaptureReplay {
    /// Validate the block structure of `data` and prepare it for replay.
    ///
    /// An empty capture holds no blocks and replays as a closed source.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let mut offset = 0;
        let mut block_count = 0;
        while offset < data.len() {
            let len = block_len(&data, offset)?;
            let end = offset + BLOCK_LEN_BYTES + len;
            if end > data.len() {
                return Err(TrackingError::replay(
                    offset,
                    format!("block of {} bytes runs past end of capture ({} bytes)", len, data.len()),
                ));
            }
            offset = end;
            block_count += 1;
        }

        debug!("Loaded capture: {} bytes in {} blocks", data.len(), block_count);
        Ok(Self { data, read_idx: 0, block_end: 0, block_count })
    }

    /// Number of recorded reads in the capture.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Bytes of the capture consumed so far, block headers included.
    pub fn position(&self) -> usize {
        self.read_idx
    }
}

fn block_len(data: &[u8], offset: usize) -> Result<usize> {
    let header = data.get(offset..offset + BLOCK_LEN_BYTES).ok_or_else(|| {
        TrackingError::replay(offset, "truncated block header")
    })?;
    Ok(u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize)
}

impl ByteSource for CaptureReplay {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.read_idx == self.data.len() {
            return Ok(0);
        }

        if self.read_idx == self.block_end {
            let len = block_len(&self.data, self.read_idx)?;
            self.read_idx += BLOCK_LEN_BYTES;
            self.block_end = self.read_idx + len;
        }

        let count = buf.len().min(self.block_end - self.read_idx);
        buf[..count].copy_from_slice(&self.data[self.read_idx..self.read_idx + count]);
        self.read_idx += count;

        if self.read_idx == self.data.len() {
            debug!("Finished replay");
        }
        Ok(count)
    }

    fn is_connected(&self) -> bool {
        self.read_idx < self.data.len()
    }
}

/// Passes reads through from an inner source while recording them as blocks.
#[derive(Debug)]
pub struct CaptureRecorder<S> {
    inner: S,
    capture: Vec<u8>,
}

impl<S: ByteSource> CaptureRecorder<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, capture: Vec::new() }
    }

    /// Recorded capture so far.
    pub fn capture(&self) -> &[u8] {
        &self.capture
    }

    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.inner, self.capture)
    }
}

impl<S: ByteSource> ByteSource for CaptureRecorder<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let count = self.inner.read(buf)?;
        if count > 0 {
            trace!("Recording block of {} bytes", count);
            self.capture.extend_from_slice(&(count as u32).to_le_bytes());
            self.capture.extend_from_slice(&buf[..count]);
        }
        Ok(count)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}
