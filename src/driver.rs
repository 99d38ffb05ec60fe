//! Driver spawns and manages the tracking task

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::provider::Provider;
use crate::tracking::{MarkerTracker, TrackedFrame};

/// Lifecycle of the tracking task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Frames are being processed
    Running,
    /// Provider stream ended normally
    Finished { frames: u64 },
    /// Stopped through the cancellation token or because every receiver was dropped
    Cancelled { frames: u64 },
    /// Gave up after repeated provider errors
    Failed { frames: u64 },
}

impl DriverStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, DriverStatus::Running)
    }

    /// Frames processed before the task stopped
    pub fn frames(&self) -> Option<u64> {
        match self {
            DriverStatus::Running => None,
            DriverStatus::Finished { frames }
            | DriverStatus::Cancelled { frames }
            | DriverStatus::Failed { frames } => Some(*frames),
        }
    }
}

/// Result of spawning driver tasks
pub struct DriverChannels {
    /// Receiver for tracked frames; keeps the last frame after the stream ends
    pub frames: watch::Receiver<Option<Arc<TrackedFrame>>>,
    /// Receiver for task status
    pub status: watch::Receiver<DriverStatus>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Publishes the terminal status when the tracking task ends.
///
/// A task that unwinds before reporting leaves `Failed` behind, so receivers
/// never wait on a dead task.
struct StatusGuard {
    tx: watch::Sender<DriverStatus>,
    frames: u64,
    status: Option<DriverStatus>,
}

impl StatusGuard {
    fn new(tx: watch::Sender<DriverStatus>) -> Self {
        Self { tx, frames: 0, status: None }
    }
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        let status = self.status.take().unwrap_or_else(|| {
            error!("Tracking task aborted after {} frames", self.frames);
            DriverStatus::Failed { frames: self.frames }
        });
        self.tx.send_replace(status);
    }
}

/// Driver spawns and manages the tracking task
///
/// The spawned task owns the provider and the tracker. Each frame is tracked
/// in place and published on a watch channel, so slow receivers only ever see
/// the latest frame.
pub struct Driver;

impl Driver {
    const MAX_ERRORS: u32 = 10;

    /// Spawn the tracking task for the given provider
    pub fn spawn<P>(provider: P, tracker: MarkerTracker) -> DriverChannels
    where
        P: Provider,
    {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(DriverStatus::Running);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            let mut guard = StatusGuard::new(status_tx);
            let status = Self::tracking_task(provider, tracker, frame_tx, cancel_task, &mut guard).await;
            guard.status = Some(status);
        });

        DriverChannels { frames: frame_rx, status: status_rx, cancel }
    }

    async fn tracking_task<P>(
        mut provider: P,
        mut tracker: MarkerTracker,
        frame_tx: watch::Sender<Option<Arc<TrackedFrame>>>,
        cancel: CancellationToken,
        guard: &mut StatusGuard,
    ) -> DriverStatus
    where
        P: Provider,
    {
        info!("Tracking task started");
        let mut frame_count = 0u64;
        let mut error_count = 0u32;

        let status = loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Tracking task cancelled");
                    break DriverStatus::Cancelled { frames: frame_count };
                }
                result = provider.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    frame_count += 1;
                    guard.frames = frame_count;
                    error_count = 0;

                    let tracked = tracker.track(frame);
                    trace!("Frame {}: {:?}", tracked.sequence, tracked.outcome);

                    if frame_tx.send(Some(Arc::new(tracked))).is_err() {
                        debug!("Frame receivers dropped, shutting down");
                        break DriverStatus::Cancelled { frames: frame_count };
                    }
                }
                Ok(None) => {
                    info!("Provider stream ended after {} frames", frame_count);
                    break DriverStatus::Finished { frames: frame_count };
                }
                Err(e) => {
                    error_count += 1;
                    error!("Provider error ({}/{}): {}", error_count, Self::MAX_ERRORS, e);

                    if error_count >= Self::MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break DriverStatus::Failed { frames: frame_count };
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        info!("Tracking task ended (processed {} frames)", frame_count);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::Frame;
    use crate::test_utils::frame_with_points;
    use crate::{Result, TrackingError};
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedProvider {
        script: VecDeque<Result<Option<Frame>>>,
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        async fn next_frame(&mut self) -> Result<Option<Frame>> {
            match self.script.pop_front() {
                Some(step) => step,
                None => std::future::pending().await,
            }
        }

        fn frame_rate(&self) -> Option<f64> {
            None
        }
    }

    fn rectangle() -> Frame {
        frame_with_points(&[(0, 100, 100), (1, 300, 100), (2, 100, 160), (3, 300, 160)])
    }

    async fn wait_for_status(channels: &mut DriverChannels) -> DriverStatus {
        // Paused-clock tests sit through the whole backoff schedule.
        tokio::time::timeout(Duration::from_secs(60), channels.status.wait_for(DriverStatus::is_finished))
            .await
            .expect("driver did not finish")
            .map(|status| *status)
            .unwrap_or(DriverStatus::Running)
    }

    #[tokio::test]
    async fn frames_are_tracked_and_last_one_kept() {
        let provider = ScriptedProvider {
            script: VecDeque::from(vec![Ok(Some(rectangle())), Ok(Some(rectangle())), Ok(None)]),
        };
        let mut channels = Driver::spawn(provider, MarkerTracker::default());

        assert_eq!(wait_for_status(&mut channels).await, DriverStatus::Finished { frames: 2 });

        let last = channels.frames.borrow().clone().expect("last frame kept");
        assert_eq!(last.sequence, 1);
        assert!(last.outcome.is_locked());
    }

    #[tokio::test]
    async fn cancellation_stops_a_waiting_provider() {
        let provider = ScriptedProvider { script: VecDeque::new() };
        let mut channels = Driver::spawn(provider, MarkerTracker::default());

        channels.cancel.cancel();
        assert_eq!(wait_for_status(&mut channels).await, DriverStatus::Cancelled { frames: 0 });
        assert!(channels.frames.borrow().is_none());
    }

    struct PanickingProvider {
        frames: VecDeque<Frame>,
    }

    #[async_trait::async_trait]
    impl Provider for PanickingProvider {
        async fn next_frame(&mut self) -> Result<Option<Frame>> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None => panic!("provider blew up"),
            }
        }

        fn frame_rate(&self) -> Option<f64> {
            None
        }
    }

    #[tokio::test]
    async fn panicking_provider_reports_failure() {
        let provider = PanickingProvider { frames: VecDeque::from(vec![rectangle()]) };
        let mut channels = Driver::spawn(provider, MarkerTracker::default());

        assert_eq!(wait_for_status(&mut channels).await, DriverStatus::Failed { frames: 1 });
        assert!(channels.frames.borrow().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_errors_fail_the_driver() {
        let script = (0..Driver::MAX_ERRORS)
            .map(|_| Err(TrackingError::source_closed(1)))
            .collect::<VecDeque<_>>();
        let mut channels = Driver::spawn(ScriptedProvider { script }, MarkerTracker::default());

        let status = wait_for_status(&mut channels).await;
        assert_eq!(status, DriverStatus::Failed { frames: 0 });
        assert_eq!(status.frames(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_error_budget() {
        let mut script = VecDeque::new();
        for _ in 0..Driver::MAX_ERRORS - 1 {
            script.push_back(Err(TrackingError::source_closed(1)));
        }
        script.push_back(Ok(Some(rectangle())));
        for _ in 0..Driver::MAX_ERRORS - 1 {
            script.push_back(Err(TrackingError::source_closed(1)));
        }
        script.push_back(Ok(None));

        let mut channels = Driver::spawn(ScriptedProvider { script }, MarkerTracker::default());
        assert_eq!(wait_for_status(&mut channels).await, DriverStatus::Finished { frames: 1 });
    }
}
