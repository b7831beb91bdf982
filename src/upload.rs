//! Staging and upload of a single attachment.

use std::path::Path;

use teloxide::types::MessageId;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::traits::FileHost;
use crate::types::{UploadError, UploadFailure, UploadOutcome, UploadedFile};

/// An attachment materialized to a local temp file. The file is deleted
/// when this guard drops, on every exit path.
pub struct StagedFile {
    pub file_name: String,
    temp: NamedTempFile,
}

impl StagedFile {
    /// Write attachment bytes into a fresh temp file.
    pub fn write(file_name: String, bytes: &[u8]) -> std::io::Result<Self> {
        let temp = NamedTempFile::new()?;
        std::fs::write(temp.path(), bytes)?;
        Ok(Self { file_name, temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Push one staged attachment to the host. The temp file is gone by the
/// time this returns, whatever the outcome.
pub async fn upload_staged(
    host: &dyn FileHost,
    message_id: MessageId,
    staged: StagedFile,
) -> UploadOutcome {
    debug!(message_id = message_id.0, file = %staged.file_name, "Uploading attachment");
    match host.store_file(&staged.file_name, staged.path()).await {
        Ok(file_id) => Ok(UploadedFile {
            message_id,
            file_id,
        }),
        Err(error) => {
            warn!(message_id = message_id.0, error = %error, "Attachment upload failed");
            Err(UploadFailure {
                message_id,
                file_name: Some(staged.file_name),
                error: UploadError::Host(error),
            })
        }
    }
}
