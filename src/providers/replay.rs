//! Replay provider for recorded byte streams

use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, trace, warn};

use crate::config::PixtrackConfig;
use crate::packet::{FramerState, Packet, PacketHandler, PacketKind, RawPacket, StreamFramer};
use crate::provider::Provider;
use crate::sensor::{Frame, ReportFormat};
use crate::source::ByteSource;
use crate::Result;

/// Packet handler that keeps the most recent object report.
#[derive(Debug, Clone)]
pub struct ReportCollector {
    expected: ReportFormat,
    latest: Option<Frame>,
    format_mismatches: u64,
}

impl ReportCollector {
    pub fn new(expected: ReportFormat) -> Self {
        Self { expected, latest: None, format_mismatches: 0 }
    }

    /// Take the last decoded frame, if any arrived since the previous take.
    pub fn take(&mut self) -> Option<Frame> {
        self.latest.take()
    }

    /// Reports seen in a format other than the expected one.
    pub fn format_mismatches(&self) -> u64 {
        self.format_mismatches
    }
}

impl PacketHandler for ReportCollector {
    fn on_packet(&mut self, packet: RawPacket<'_>) -> bool {
        if packet.kind() != Some(PacketKind::ObjectReport) {
            trace!("Skipping packet kind {:#04x}", packet.id);
            return false;
        }
        let report = match packet.decode() {
            Ok(Packet::ObjectReport(report)) => report,
            Ok(_) => return false,
            Err(e) => {
                warn!("Dropping malformed object report: {}", e);
                return false;
            }
        };

        let frame = Frame::from_report(&report);
        if frame.format != self.expected {
            if self.format_mismatches == 0 {
                warn!(
                    "Report format {} differs from configured {}",
                    report.format,
                    self.expected.code()
                );
            }
            self.format_mismatches += 1;
        }
        self.latest = Some(frame);
        true
    }
}

/// Replay provider that decodes frames from a byte source
pub struct ReplayProvider<S> {
    /// Framer over the recorded stream
    framer: StreamFramer<S, ReportCollector>,

    /// Target pacing rate
    frame_rate: Option<f64>,

    /// Interval derived from `frame_rate`
    period: Option<Duration>,

    /// Frame pacing interval, created on first use
    interval: Option<Interval>,

    /// Frames decoded so far
    frames: u64,
}

impl<S: ByteSource> ReplayProvider<S> {
    /// Create a new replay provider over `source`
    pub fn new(source: S, config: &PixtrackConfig) -> Self {
        let collector = ReportCollector::new(config.sensor.report_format);
        let framer =
            StreamFramer::new(source, collector).with_max_packet_words(config.replay.max_packet_words);
        let period = config.replay.frame_period();
        if config.replay.frame_rate_hz.is_some() && period.is_none() {
            warn!("Replay frame rate {:?} cannot be paced, replaying unpaced", config.replay.frame_rate_hz);
        }
        Self { framer, frame_rate: config.replay.frame_rate_hz, period, interval: None, frames: 0 }
    }

    /// Frames decoded so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Access the framer, e.g. for resync statistics
    pub fn framer(&self) -> &StreamFramer<S, ReportCollector> {
        &self.framer
    }

    async fn pace(&mut self) {
        let Some(period) = self.period else {
            return;
        };
        let ticker = self.interval.get_or_insert_with(|| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
    }
}

#[async_trait::async_trait]
impl<S> Provider for ReplayProvider<S>
where
    S: ByteSource + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if self.framer.tick()? {
                if let Some(frame) = self.framer.handler_mut().take() {
                    self.pace().await;
                    self.frames += 1;
                    trace!("Frame {}: {} objects on screen", self.frames, frame.on_screen_count());
                    return Ok(Some(frame));
                }
            } else if !self.framer.source().is_connected() {
                if self.framer.state() != (FramerState::AwaitingHeader { received: 0 }) {
                    warn!("Stream ended inside a packet: {:?}", self.framer.state());
                }
                debug!(
                    "Reached end of replay after {} frames ({} resyncs)",
                    self.frames,
                    self.framer.resyncs()
                );
                return Ok(None);
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CaptureReplay, ChunkedSource};
    use crate::test_utils::{capture_from_chunks, encode_stream, report_with_centroids};

    fn report_stream() -> Vec<u8> {
        encode_stream(&[
            Packet::ObjectReportRequest,
            Packet::ObjectReport(Box::new(report_with_centroids(&[(10, 10), (20, 20)], 1))),
            Packet::ReadRegister(crate::packet::Register::new(0, 2)),
            Packet::ObjectReport(Box::new(report_with_centroids(&[(30, 30)], 1))),
        ])
    }

    #[tokio::test]
    async fn replay_yields_each_report_then_ends() {
        let bytes = report_stream();
        let capture = capture_from_chunks(bytes.chunks(11));
        let source = CaptureReplay::new(capture).unwrap();
        let mut provider = ReplayProvider::new(source, &PixtrackConfig::default());

        let first = provider.next_frame().await.unwrap().unwrap();
        assert_eq!(first.on_screen_count(), 2);
        let second = provider.next_frame().await.unwrap().unwrap();
        assert_eq!(second.on_screen_count(), 1);
        assert!(provider.next_frame().await.unwrap().is_none());
        assert_eq!(provider.frames(), 2);
        assert_eq!(provider.frame_rate(), None);
    }

    #[tokio::test]
    async fn truncated_tail_is_dropped() {
        let mut bytes = report_stream();
        bytes.truncate(bytes.len() - 7);
        let mut provider =
            ReplayProvider::new(ChunkedSource::with_chunk_size(&bytes, 64), &PixtrackConfig::default());

        assert!(provider.next_frame().await.unwrap().is_some());
        assert!(provider.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unexpected_format_is_counted() {
        let bytes = encode_stream(&[Packet::ObjectReport(Box::new(report_with_centroids(&[(5, 5)], 2)))]);
        let mut provider =
            ReplayProvider::new(ChunkedSource::from_chunks([bytes]), &PixtrackConfig::default());

        let frame = provider.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.format, ReportFormat::Compact);
        assert_eq!(provider.framer().handler().format_mismatches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_spaces_frames() {
        let mut config = PixtrackConfig::default();
        config.replay.frame_rate_hz = Some(10.0);
        let bytes = report_stream();
        let mut provider = ReplayProvider::new(ChunkedSource::from_chunks([bytes]), &config);

        let start = tokio::time::Instant::now();
        provider.next_frame().await.unwrap();
        provider.next_frame().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn unpaceable_rate_replays_unpaced() {
        let mut config = PixtrackConfig::default();
        config.replay.frame_rate_hz = Some(1.0e12);
        let mut provider = ReplayProvider::new(ChunkedSource::from_chunks([report_stream()]), &config);

        assert!(provider.next_frame().await.unwrap().is_some());
        assert!(provider.next_frame().await.unwrap().is_some());
        assert!(provider.next_frame().await.unwrap().is_none());
    }
}
