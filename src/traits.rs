use std::path::Path;

use async_trait::async_trait;

use crate::host::HostError;

/// Remote file host — stores blobs and bundles them into shareable lists.
///
/// Implemented by the Pixeldrain client; tests substitute a scripted mock so
/// everything above the HTTP boundary runs offline.
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Store one blob from a local file, returning the host's opaque id.
    async fn store_file(&self, file_name: &str, path: &Path) -> Result<String, HostError>;

    /// Bundle previously stored blobs into a shareable list, returning its id.
    /// Single attempt; callers see any failure as-is.
    async fn create_list(&self, file_ids: &[String]) -> Result<String, HostError>;

    /// Shareable link for a stored file.
    fn file_link(&self, file_id: &str) -> String;

    /// Shareable link for a list.
    fn list_link(&self, list_id: &str) -> String;
}
