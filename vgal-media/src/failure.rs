//! Media failure classification
//!
//! The host media stack reports failures as numeric codes following the
//! usual media-element convention:
//!
//! | Code | Meaning             | Kind                         |
//! |------|---------------------|------------------------------|
//! | 1    | aborted by request  | `SourceUnsupportedOrAborted` |
//! | 2    | network / I/O       | `NetworkOrIo`                |
//! | 3    | decode              | `Decode`                     |
//! | 4    | source not supported| `SourceUnsupportedOrAborted` |
//! | *    | anything else       | `Unclassified`               |

pub use vgal_common::events::FailureKind;

pub const MEDIA_ERR_ABORTED: u16 = 1;
pub const MEDIA_ERR_NETWORK: u16 = 2;
pub const MEDIA_ERR_DECODE: u16 = 3;
pub const MEDIA_ERR_SRC_NOT_SUPPORTED: u16 = 4;

/// Map a media-stack code onto the failure taxonomy
pub fn classify(code: u16) -> FailureKind {
    match code {
        MEDIA_ERR_ABORTED | MEDIA_ERR_SRC_NOT_SUPPORTED => FailureKind::SourceUnsupportedOrAborted,
        MEDIA_ERR_NETWORK => FailureKind::NetworkOrIo,
        MEDIA_ERR_DECODE => FailureKind::Decode,
        _ => FailureKind::Unclassified,
    }
}

/// One failed load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: FailureKind,
    /// Originating media-stack code
    pub code: u16,
    /// Attempt that failed (1-based)
    pub attempt: u32,
}

impl LoadFailure {
    pub fn from_code(code: u16, attempt: u32) -> Self {
        Self {
            kind: classify(code),
            code,
            attempt,
        }
    }
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {}, attempt {})", self.kind, self.code, self.attempt)
    }
}
