use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::PixeldrainConfig;
use crate::traits::FileHost;

use super::error::{HostError, HostErrorKind};

/// Pixeldrain REST client. Every call authenticates as basic auth with an
/// empty username and the API key as password.
pub struct PixeldrainClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    upload_timeout: Option<Duration>,
    list_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: Option<String>,
}

impl PixeldrainClient {
    pub fn new(config: &PixeldrainConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            upload_timeout: config.upload_timeout_secs.map(Duration::from_secs),
            list_timeout: Duration::from_secs(config.list_timeout_secs),
        }
    }

    fn parse_id(body: &str, endpoint: &'static str) -> Result<String, HostError> {
        let parsed: IdResponse = serde_json::from_str(body).map_err(|e| HostError {
            kind: HostErrorKind::Unknown,
            status: None,
            message: format!("unparseable {} response: {}", endpoint, e),
        })?;
        parsed.id.ok_or_else(|| HostError::missing_id(endpoint))
    }
}

fn list_payload(file_ids: &[String]) -> serde_json::Value {
    serde_json::json!({
        "files": file_ids
            .iter()
            .map(|id| serde_json::json!({ "id": id }))
            .collect::<Vec<_>>(),
    })
}

#[async_trait]
impl FileHost for PixeldrainClient {
    async fn store_file(&self, file_name: &str, path: &Path) -> Result<String, HostError> {
        let bytes = tokio::fs::read(path).await.map_err(HostError::io)?;
        let url = format!("{}/api/file/{}", self.base_url, file_name);
        debug!(url = %url, size = bytes.len(), "Uploading blob");

        let mut request = self
            .http
            .put(&url)
            .basic_auth("", Some(&self.api_key))
            .body(bytes);
        if let Some(timeout) = self.upload_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(HostError::from_status(status.as_u16(), &body));
        }
        let id = Self::parse_id(&body, "file")?;
        info!(file = %file_name, id = %id, "Stored file");
        Ok(id)
    }

    async fn create_list(&self, file_ids: &[String]) -> Result<String, HostError> {
        let url = format!("{}/api/list", self.base_url);
        debug!(url = %url, files = file_ids.len(), "Creating list");

        let response = self
            .http
            .post(&url)
            .basic_auth("", Some(&self.api_key))
            .json(&list_payload(file_ids))
            .timeout(self.list_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(HostError::from_status(status.as_u16(), &body));
        }
        let id = Self::parse_id(&body, "list")?;
        info!(files = file_ids.len(), id = %id, "Created list");
        Ok(id)
    }

    fn file_link(&self, file_id: &str) -> String {
        format!("{}/u/{}", self.base_url, file_id)
    }

    fn list_link(&self, list_id: &str) -> String {
        format!("{}/l/{}", self.base_url, list_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PixeldrainClient {
        PixeldrainClient::new(&PixeldrainConfig {
            api_key: "key".to_string(),
            base_url: "https://pixeldrain.com/".to_string(),
            upload_timeout_secs: None,
            list_timeout_secs: 30,
        })
    }

    #[test]
    fn links_use_the_share_paths() {
        let client = client();
        assert_eq!(client.file_link("abc"), "https://pixeldrain.com/u/abc");
        assert_eq!(client.list_link("L9"), "https://pixeldrain.com/l/L9");
    }

    #[test]
    fn trailing_slash_in_base_url_is_stripped() {
        let client = client();
        assert_eq!(client.base_url, "https://pixeldrain.com");
    }

    #[test]
    fn list_payload_wraps_each_id() {
        let payload = list_payload(&["a1".to_string(), "a3".to_string()]);
        assert_eq!(
            payload,
            serde_json::json!({ "files": [{ "id": "a1" }, { "id": "a3" }] })
        );
    }

    #[test]
    fn parse_id_happy_path() {
        assert_eq!(
            PixeldrainClient::parse_id(r#"{"id":"abc"}"#, "file").unwrap(),
            "abc"
        );
    }

    #[test]
    fn parse_id_missing_field() {
        let err = PixeldrainClient::parse_id(r#"{"success":true}"#, "file").unwrap_err();
        assert_eq!(err.kind, HostErrorKind::MissingId);
    }

    #[test]
    fn parse_id_unparseable_body() {
        let err = PixeldrainClient::parse_id("<html>busy</html>", "list").unwrap_err();
        assert_eq!(err.kind, HostErrorKind::Unknown);
    }
}
