//! Test infrastructure: a scripted FileHost double.
//!
//! Keeps the upload pipeline, report composition, and registry flows
//! exercisable without Telegram or Pixeldrain on the wire.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::host::{HostError, HostErrorKind};
use crate::traits::FileHost;

/// Scripted FileHost. Upload results are looked up by file name so
/// concurrent fan-outs stay deterministic; unscripted names succeed with
/// an id derived from the name. Link builders mirror the real client's
/// URL shapes.
pub struct MockHost {
    store_results: Mutex<HashMap<String, Result<String, HostError>>>,
    list_result: Mutex<Option<Result<String, HostError>>>,
    pub stored_names: Mutex<Vec<String>>,
    pub list_calls: Mutex<Vec<Vec<String>>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            store_results: Mutex::new(HashMap::new()),
            list_result: Mutex::new(None),
            stored_names: Mutex::new(Vec::new()),
            list_calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the outcome for a specific file name.
    pub async fn script_store(&self, file_name: &str, result: Result<String, HostError>) {
        self.store_results
            .lock()
            .await
            .insert(file_name.to_string(), result);
    }

    /// Script the outcome of the next create_list call.
    pub async fn script_list(&self, result: Result<String, HostError>) {
        *self.list_result.lock().await = Some(result);
    }

    pub fn failure(kind: HostErrorKind, message: &str) -> HostError {
        HostError {
            kind,
            status: None,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl FileHost for MockHost {
    async fn store_file(&self, file_name: &str, path: &Path) -> Result<String, HostError> {
        assert!(path.exists(), "staged file must exist during the upload");
        self.stored_names.lock().await.push(file_name.to_string());
        match self.store_results.lock().await.get(file_name) {
            Some(Ok(id)) => Ok(id.clone()),
            Some(Err(e)) => Err(HostError {
                kind: e.kind,
                status: e.status,
                message: e.message.clone(),
            }),
            None => Ok(format!("id-{}", file_name)),
        }
    }

    async fn create_list(&self, file_ids: &[String]) -> Result<String, HostError> {
        self.list_calls.lock().await.push(file_ids.to_vec());
        match self.list_result.lock().await.take() {
            Some(result) => result,
            None => Ok("mock-list".to_string()),
        }
    }

    fn file_link(&self, file_id: &str) -> String {
        format!("https://pixeldrain.com/u/{}", file_id)
    }

    fn list_link(&self, list_id: &str) -> String {
        format!("https://pixeldrain.com/l/{}", list_id)
    }
}
