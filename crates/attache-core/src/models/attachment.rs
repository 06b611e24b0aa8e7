//! Attachment entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A unique identifier for a tracked attachment entry, using UUID v7.
///
/// Stable for the entry's lifetime and never reused, so display rows and
/// transport callbacks can be correlated with entries safely even after
/// the entry has been dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalAttachmentId(Uuid);

impl LocalAttachmentId {
    /// Create a new unique entry ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalAttachmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalAttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalAttachmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Server-assigned identifier for a successfully stored attachment.
///
/// Opaque to the client; referenced later by message send and by explicit
/// removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteAttachmentId(String);

impl RemoteAttachmentId {
    /// Wrap a server-assigned token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::InvalidInput(
                "Remote attachment id cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteAttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file accepted for upload: selection metadata plus owned content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    /// File name reported by the selection surface.
    pub filename: String,
    /// Content MIME type, when the surface knows it.
    pub mime_type: Option<String>,
    /// File content.
    pub bytes: Vec<u8>,
}

impl AttachmentFile {
    /// Create a file payload for upload.
    ///
    /// No size or type filtering happens here; acceptance limits are the
    /// server's concern.
    pub fn new(
        filename: impl Into<String>,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let filename = filename.into().trim().to_string();
        if filename.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment filename cannot be empty".to_string(),
            ));
        }
        let mime_type = mime_type
            .map(|mime| mime.trim().to_string())
            .filter(|mime| !mime.is_empty());

        Ok(Self {
            filename,
            mime_type,
            bytes,
        })
    }

    /// Attachment size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Upload lifecycle state of one tracked entry.
///
/// "Cancelled" is a removal transition, not a stored state: a dismissed
/// entry leaves the collection immediately, whatever state it was in.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    /// Transport is in flight; `progress` is the sent fraction in [0, 1].
    Uploading {
        /// Fraction of the payload reported sent so far.
        progress: f64,
    },
    /// Transport reported success and the server assigned an identifier.
    Completed {
        /// Server-assigned attachment identifier.
        remote_id: RemoteAttachmentId,
    },
    /// Transport settled with a terminal error; never retried.
    Failed {
        /// Human-readable error message for inline display.
        message: String,
    },
}

impl UploadState {
    /// True while the transport is still in flight.
    #[must_use]
    pub const fn is_uploading(&self) -> bool {
        matches!(self, Self::Uploading { .. })
    }

    /// True once the upload finished successfully.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// True once the upload settled with a terminal error.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Server-assigned identifier, present only once completed.
    #[must_use]
    pub fn remote_id(&self) -> Option<&RemoteAttachmentId> {
        match self {
            Self::Completed { remote_id } => Some(remote_id),
            _ => None,
        }
    }

    /// Terminal error message, present only once failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// How a settled upload transport classified its terminal result.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Success response carrying the assigned remote identifier.
    Completed {
        /// Server-assigned attachment identifier.
        remote_id: RemoteAttachmentId,
    },
    /// Non-success status with a server-supplied message.
    Rejected {
        /// Server message, surfaced verbatim.
        message: String,
    },
    /// Response body could not be interpreted.
    MalformedResponse,
    /// The network operation itself failed.
    TransportFailed,
}

/// One tracked attachment and its upload lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentEntry {
    /// Stable entry identifier.
    pub id: LocalAttachmentId,
    /// The accepted file.
    pub file: AttachmentFile,
    /// Current lifecycle state.
    pub state: UploadState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_id_unique() {
        let id1 = LocalAttachmentId::new();
        let id2 = LocalAttachmentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_local_id_parse() {
        let id = LocalAttachmentId::new();
        let parsed: LocalAttachmentId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_remote_id_validation() {
        assert!(RemoteAttachmentId::new("").is_err());
        assert!(RemoteAttachmentId::new("   ").is_err());

        let id = RemoteAttachmentId::new("  u1  ").unwrap();
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn test_attachment_file_new() {
        let file = AttachmentFile::new("report.pdf", Some("application/pdf".to_string()), vec![0; 1234])
            .unwrap();

        assert_eq!(file.filename, "report.pdf");
        assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.size_bytes(), 1234);
    }

    #[test]
    fn test_attachment_file_validation() {
        assert!(AttachmentFile::new("", None, vec![1]).is_err());
        assert!(AttachmentFile::new("   ", None, vec![1]).is_err());

        let file = AttachmentFile::new(" notes.txt ", Some("  ".to_string()), Vec::new()).unwrap();
        assert_eq!(file.filename, "notes.txt");
        assert_eq!(file.mime_type, None);
        assert_eq!(file.size_bytes(), 0);
    }

    #[test]
    fn test_upload_state_accessors() {
        let uploading = UploadState::Uploading { progress: 0.25 };
        assert!(uploading.is_uploading());
        assert_eq!(uploading.remote_id(), None);
        assert_eq!(uploading.error_message(), None);

        let remote = RemoteAttachmentId::new("u1").unwrap();
        let completed = UploadState::Completed {
            remote_id: remote.clone(),
        };
        assert!(completed.is_completed());
        assert_eq!(completed.remote_id(), Some(&remote));

        let failed = UploadState::Failed {
            message: "too large".to_string(),
        };
        assert!(failed.is_failed());
        assert_eq!(failed.error_message(), Some("too large"));
    }
}
