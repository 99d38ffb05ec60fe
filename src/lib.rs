//! Packet framing and marker tracking for optical object-tracking sensors.
//!
//! The sensor streams variably sized binary packets over a byte-oriented
//! link. Pixtrack reassembles them from arbitrary chunks, decodes the object
//! reports into sixteen blob detections per frame, and keeps a stable identity
//! for the four markers of a rigid rectangular target so a pose solver can
//! consume labelled 2-D points.
//!
//! # Features
//!
//! - **Incremental framing**: resumes cleanly across short reads, resyncs on
//!   corrupt headers
//! - **Format-aware decoding**: all four sensor report layouts
//! - **Sticky marker identity**: nearest-neighbour matching with geometric
//!   re-identification on loss
//! - **Capture replay**: chunk-exact record and replay of the byte stream
//!
//! # Quick Start
//!
//! The synchronous core needs no runtime:
//!
//! ```rust
//! use pixtrack::{ChunkedSource, MarkerTracker, RawPacket, StreamFramer};
//! use pixtrack::packet::PacketKind;
//! use pixtrack::sensor::Frame;
//!
//! # fn main() -> pixtrack::Result<()> {
//! let source = ChunkedSource::new();
//! let mut tracker = MarkerTracker::default();
//! let mut framer = StreamFramer::new(source, |packet: RawPacket<'_>| {
//!     if packet.kind() != Some(PacketKind::ObjectReport) {
//!         return false;
//!     }
//!     if let Ok(pixtrack::Packet::ObjectReport(report)) = packet.decode() {
//!         let outcome = tracker.update(&Frame::from_report(&report));
//!         println!("{:?}", outcome);
//!     }
//!     true
//! });
//!
//! // Poll whenever bytes may have arrived.
//! while framer.tick()? {}
//! # Ok(())
//! # }
//! ```
//!
//! ## Example (capture replay)
//!
//! ```rust,no_run
//! use pixtrack::{Pixtrack, PixtrackConfig};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let capture = std::fs::read("session.cap")?;
//!     let connection = Pixtrack::replay(capture, &PixtrackConfig::default()).await?;
//!     let mut frames = Box::pin(connection.subscribe());
//!
//!     while let Some(frame) = frames.next().await {
//!         println!("{}: {:?}", frame.sequence, frame.image_points());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod packet;
pub mod pose;
pub mod sensor;
pub mod source;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod tracking;

// Stream-based pipeline
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;

// Core exports
pub use config::PixtrackConfig;
pub use error::*;
pub use packet::{Packet, PacketHandler, PacketKind, RawPacket, StreamFramer};
pub use pose::{CameraIntrinsics, Pose, PoseEstimator, PoseSolver, TargetGeometry};
pub use sensor::{DetectedObject, Frame, ReportFormat, SensorSettings};
pub use source::{ByteSource, CaptureRecorder, CaptureReplay, ChunkedSource};
pub use tracking::{CandidatePolicy, Corner, MarkerSlot, MarkerTracker, Point, TrackedFrame, TrackingOutcome};

// Main API exports
pub use connection::ReplayConnection;
pub use driver::DriverStatus;

/// Unified entry point for tracking pipelines.
///
/// # Examples
///
/// ```rust,no_run
/// use pixtrack::{Pixtrack, PixtrackConfig};
///
/// #[tokio::main]
/// async fn main() -> pixtrack::Result<()> {
///     let config = PixtrackConfig::from_yaml("replay: { frame_rate_hz: 100.0 }")?;
///     let connection = Pixtrack::replay(Vec::new(), &config).await?;
///     // Use connection...
///     Ok(())
/// }
/// ```
pub struct Pixtrack;

impl Pixtrack {
    /// Replay a recorded capture through the tracker.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The capture block structure is corrupt
    /// - The configuration fails validation
    pub async fn replay(capture: Vec<u8>, config: &PixtrackConfig) -> Result<ReplayConnection> {
        ReplayConnection::open(capture, config).await
    }

    /// Run the tracker over any byte source.
    ///
    /// The source is polled until it reports itself disconnected.
    pub async fn from_source<S>(source: S, config: &PixtrackConfig) -> Result<ReplayConnection>
    where
        S: ByteSource + Send + 'static,
    {
        ReplayConnection::from_source(source, config).await
    }
}
