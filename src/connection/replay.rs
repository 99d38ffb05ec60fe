//! Replay connection for recorded captures

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PixtrackConfig;
use crate::driver::{Driver, DriverStatus};
use crate::pose::{Pose, PoseEstimator, PoseSolver};
use crate::provider::Provider;
use crate::providers::ReplayProvider;
use crate::source::{ByteSource, CaptureReplay};
use crate::tracking::{MarkerTracker, TrackedFrame};
use crate::{Result, TrackingError};

/// How long `open` waits for the first tracked frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Replay connection over a recorded byte stream
pub struct ReplayConnection {
    /// Frame watch receiver
    frames: watch::Receiver<Option<Arc<TrackedFrame>>>,

    /// Driver status receiver
    status: watch::Receiver<DriverStatus>,

    /// Configuration the connection was opened with
    config: PixtrackConfig,

    /// Cancellation token for stopping tasks
    cancel: CancellationToken,
}

impl ReplayConnection {
    /// Open a capture produced by [`crate::source::CaptureRecorder`].
    ///
    /// Waits for the first frame to be available (or the replay to end) before
    /// returning.
    pub async fn open(capture: Vec<u8>, config: &PixtrackConfig) -> Result<Self> {
        info!("Opening capture ({} bytes)", capture.len());
        let source = CaptureReplay::new(capture)?;
        Self::from_source(source, config).await
    }

    /// Replay any byte source.
    pub async fn from_source<S>(source: S, config: &PixtrackConfig) -> Result<Self>
    where
        S: ByteSource + Send + 'static,
    {
        config.validate()?;
        let provider = ReplayProvider::new(source, config);
        Self::from_provider(provider, config).await
    }

    /// Run the tracker over frames from `provider`.
    pub async fn from_provider<P: Provider>(provider: P, config: &PixtrackConfig) -> Result<Self> {
        let pacing = provider.frame_rate();
        let tracker = MarkerTracker::new(config.tracking.candidate_policy);
        let channels = Driver::spawn(provider, tracker);

        // Wait for the first frame; a closed channel means the replay already ended.
        let mut frame_rx = channels.frames.clone();
        let first = tokio::time::timeout(FIRST_FRAME_TIMEOUT, frame_rx.wait_for(Option::is_some))
            .await
            .map(|received| received.is_ok());
        match first {
            Ok(true) => {}
            Ok(false) => debug!("Replay ended before producing a frame"),
            Err(_) => warn!("Timeout waiting for first frame from replay"),
        }

        match pacing {
            Some(hz) => info!("Replay connection opened ({}Hz)", hz),
            None => info!("Replay connection opened (unpaced)"),
        }

        Ok(Self {
            frames: channels.frames,
            status: channels.status,
            config: config.clone(),
            cancel: channels.cancel,
        })
    }

    /// Subscribe to tracked frames
    ///
    /// The stream yields the current frame first, then every newer frame the
    /// subscriber is fast enough to observe. It ends when the replay does.
    pub fn subscribe(&self) -> impl Stream<Item = Arc<TrackedFrame>> + 'static {
        WatchStream::new(self.frames.clone()).filter_map(|opt| async move { opt })
    }

    /// Subscribe to tracked frames paired with the pose `solver` finds for them
    pub fn poses<P>(&self, solver: P) -> impl Stream<Item = (Arc<TrackedFrame>, Option<Pose>)> + 'static
    where
        P: PoseSolver + Send + 'static,
    {
        let mut estimator = PoseEstimator::new(solver, self.config.intrinsics(), self.config.target());
        self.subscribe().map(move |frame| {
            let pose = estimator.estimate(&frame.markers);
            (frame, pose)
        })
    }

    /// Most recent tracked frame
    pub fn latest(&self) -> Option<Arc<TrackedFrame>> {
        self.frames.borrow().clone()
    }

    /// Current driver status
    pub fn status(&self) -> DriverStatus {
        *self.status.borrow()
    }

    /// Wait for the replay to stop
    pub async fn wait_until_finished(&self, timeout: Duration) -> Result<DriverStatus> {
        let mut status = self.status.clone();
        tokio::time::timeout(timeout, async move {
            let finished = status.wait_for(DriverStatus::is_finished).await.map(|s| *s);
            finished.unwrap_or_else(|_| *status.borrow())
        })
        .await
        .map_err(|_| TrackingError::Timeout { duration: timeout })
    }

    /// Stop the replay
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn config(&self) -> &PixtrackConfig {
        &self.config
    }
}

impl Drop for ReplayConnection {
    fn drop(&mut self) {
        debug!("Dropping replay connection");
        self.cancel.cancel();
    }
}
