//! Error types for packet framing and marker tracking.
//!
//! All errors implement `std::error::Error` and carry enough structured context
//! to tell a corrupt stream apart from a source that simply went away.
//!
//! ## Error Categories
//!
//! - **Parse Errors**: Malformed packet payloads or configuration values
//! - **Packet Errors**: Payload length that disagrees with the packet kind
//! - **Source Errors**: A byte source that closed while packets were expected
//! - **Replay Errors**: Capture data with a corrupt block structure
//!
//! Per-frame conditions such as "marker lock lost" or "no pose this frame" are
//! ordinary values and never surface as errors.
//!
//! ```rust
//! use pixtrack::TrackingError;
//!
//! let error = TrackingError::source_closed(3);
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for tracking operations.
pub type Result<T, E = TrackingError> = std::result::Result<T, E>;

/// Main error type for framing, decoding and tracking operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrackingError {
    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Packet kind {kind} expects {expected} payload bytes, found {found}")]
    PacketSize { kind: &'static str, expected: usize, found: usize },

    #[error("Unknown packet kind {id:#04x}")]
    UnknownPacketKind { id: u8 },

    #[error("Byte source closed with {pending} packet(s) still expected")]
    SourceClosed { pending: usize },

    #[error("Corrupt capture at offset {offset}: {reason}")]
    Replay { offset: usize, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("I/O error")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl TrackingError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackingError::SourceClosed { .. } => true,
            TrackingError::Timeout { .. } => true,
            TrackingError::Io { .. } => true,
            TrackingError::Parse { .. } => false,
            TrackingError::PacketSize { .. } => false,
            TrackingError::UnknownPacketKind { .. } => false,
            TrackingError::Replay { .. } => false,
            TrackingError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TrackingError::Parse { .. } => vec![
                "Check that both ends speak the same packet layout",
                "Verify source data integrity",
            ],
            TrackingError::PacketSize { .. } => vec![
                "Check firmware and host packet definitions match",
                "Inspect the stream for dropped or duplicated bytes",
            ],
            TrackingError::UnknownPacketKind { .. } => vec![
                "Update the host library to the firmware's protocol version",
                "Ignore the packet if it is not needed",
            ],
            TrackingError::SourceClosed { .. } => vec![
                "Reconnect the byte source",
                "Re-send outstanding requests after reconnecting",
                "Check cabling and port permissions",
            ],
            TrackingError::Replay { .. } => vec![
                "Re-record the capture",
                "Verify the capture was not truncated during copy",
            ],
            TrackingError::Config { .. } => vec![
                "Check configuration field names and types",
                "Remove the field to fall back to its default",
            ],
            TrackingError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Verify the sensor is streaming reports",
            ],
            TrackingError::Io { .. } => vec![
                "Check the device is still attached",
                "Retry the operation",
            ],
        }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TrackingError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for a source that stopped before all packets arrived.
    pub fn source_closed(pending: usize) -> Self {
        TrackingError::SourceClosed { pending }
    }

    /// Helper constructor for corrupt capture data.
    pub fn replay(offset: usize, reason: impl Into<String>) -> Self {
        TrackingError::Replay { offset, reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        TrackingError::Config { reason: reason.into(), source: None }
    }
}

impl From<std::io::Error> for TrackingError {
    fn from(err: std::io::Error) -> Self {
        TrackingError::Io { source: err }
    }
}

impl From<serde_yaml_ng::Error> for TrackingError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TrackingError::Config {
            reason: "YAML could not be deserialized".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            context in ".*",
            details in ".*",
            id in any::<u8>(),
            pending in 0usize..1000usize,
            offset in 0usize..0x10000usize
          ) {
            let parse = TrackingError::parse(context.clone(), details.clone());
            let msg = parse.to_string();
            prop_assert!(msg.contains(&context));
            prop_assert!(msg.contains(&details));

            let unknown = TrackingError::UnknownPacketKind { id };
            let hex = format!("{:#04x}", id);
            prop_assert!(unknown.to_string().contains(&hex));

            let closed = TrackingError::source_closed(pending);
            prop_assert!(closed.to_string().contains(&pending.to_string()));

            let replay = TrackingError::replay(offset, "block overruns capture");
            prop_assert!(replay.to_string().contains(&offset.to_string()));
          }

          #[test]
          fn packet_size_reports_both_lengths(expected in 0usize..512, found in 0usize..512) {
            let err = TrackingError::PacketSize { kind: "ObjectReport", expected, found };
            let msg = err.to_string();
            prop_assert!(msg.contains("ObjectReport"));
            prop_assert!(msg.contains(&expected.to_string()));
            prop_assert!(msg.contains(&found.to_string()));
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TrackingError>();

        let error = TrackingError::source_closed(1);
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let closed = TrackingError::source_closed(2);
        let size = TrackingError::PacketSize { kind: "ReadRegister", expected: 2, found: 4 };
        let replay = TrackingError::replay(12, "truncated");

        assert!(closed.is_retryable());
        assert!(!size.is_retryable());
        assert!(!replay.is_retryable());

        for err in [&closed, &size, &replay] {
            let suggestions = err.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn from_conversions_work() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "port unplugged");
        match TrackingError::from(io_err) {
            TrackingError::Io { source } => assert_eq!(source.to_string(), "port unplugged"),
            other => panic!("Expected Io error variant, got {:?}", other),
        }

        let yaml_err = serde_yaml_ng::from_str::<u32>("not: [a number").unwrap_err();
        let err = TrackingError::from(yaml_err);
        assert!(matches!(err, TrackingError::Config { source: Some(_), .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
