use std::fmt;

use teloxide::types::MessageId;

use crate::host::HostError;

/// A successfully stored attachment.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Message that carried the attachment.
    pub message_id: MessageId,
    /// Opaque id assigned by the remote store.
    pub file_id: String,
}

/// A per-item failure, keyed back to the message that carried the attachment.
#[derive(Debug)]
pub struct UploadFailure {
    pub message_id: MessageId,
    /// Known once the attachment was resolved; None if staging failed first.
    pub file_name: Option<String>,
    pub error: UploadError,
}

/// Why a single attachment failed. Failures are recovered at the item
/// boundary and collected into the batch report; one bad item never aborts
/// its siblings.
#[derive(Debug)]
pub enum UploadError {
    /// The attachment could not be pulled from Telegram.
    Fetch(anyhow::Error),
    /// The remote store rejected or failed the call.
    Host(HostError),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Fetch(e) => write!(f, "fetch error: {:#}", e),
            UploadError::Host(e) => write!(f, "{}", e),
        }
    }
}

pub type UploadOutcome = Result<UploadedFile, UploadFailure>;
