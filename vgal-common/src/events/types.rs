//! Supporting types carried by media lifecycle events

use serde::{Deserialize, Serialize};

/// Classified media failure
///
/// Derived from the numeric code reported by the host media stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum FailureKind {
    /// Fetch or file read failed
    NetworkOrIo,
    /// Resource fetched but could not be decoded
    Decode,
    /// Format/source not supported, or the load was explicitly aborted
    SourceUnsupportedOrAborted,
    /// Any other code
    Unclassified,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NetworkOrIo => write!(f, "NetworkOrIo"),
            FailureKind::Decode => write!(f, "Decode"),
            FailureKind::SourceUnsupportedOrAborted => write!(f, "SourceUnsupportedOrAborted"),
            FailureKind::Unclassified => write!(f, "Unclassified"),
        }
    }
}

/// Why an in-flight load attempt ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum StopReason {
    /// Resource became ready
    Ready,
    /// Attempt failed (a retry may follow)
    Failed,
    /// Item was removed from the catalog or explicitly unmounted
    Unmounted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Ready => write!(f, "Ready"),
            StopReason::Failed => write!(f, "Failed"),
            StopReason::Unmounted => write!(f, "Unmounted"),
        }
    }
}
