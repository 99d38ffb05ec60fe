//! Provider trait for frame sources

use crate::Result;
use crate::sensor::Frame;

/// Trait for decoded frame sources
///
/// Providers own the byte stream and its framer and handle their own pacing.
/// The driver pulls frames from a provider and feeds them to the tracker.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next decoded frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Stream ended (normal termination)
    /// - `Err(e)` - Error occurred
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Pacing rate in Hz, `None` when frames are delivered as fast as they decode
    fn frame_rate(&self) -> Option<f64>;
}
