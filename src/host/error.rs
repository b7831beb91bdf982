use std::fmt;

/// Classified remote-store error — tells the caller *why* the call failed so
/// report lines can name the category instead of dumping a transport error.
#[derive(Debug)]
pub struct HostError {
    pub kind: HostErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    /// 401/403 — bad API key or permissions.
    Auth,
    /// 404 — unknown endpoint or file id.
    NotFound,
    /// 413 — the store refused the blob size.
    TooLarge,
    /// 429 — rate limited.
    RateLimit,
    /// Request timeout or the store took too long.
    Timeout,
    /// Connection refused, DNS failure, reset, etc.
    Network,
    /// 500/502/503/504 — store-side outage.
    ServerError,
    /// 2xx response without the expected `id` field.
    MissingId,
    /// Reading the staged file back from disk failed.
    Io,
    /// Anything else.
    Unknown,
}

impl HostErrorKind {
    /// Human-readable category name used in per-item report lines.
    pub fn category(&self) -> &'static str {
        match self {
            HostErrorKind::Auth => "authentication error",
            HostErrorKind::NotFound => "not found",
            HostErrorKind::TooLarge => "file too large",
            HostErrorKind::RateLimit => "rate limited",
            HostErrorKind::Timeout => "timeout",
            HostErrorKind::Network => "network error",
            HostErrorKind::ServerError => "server error",
            HostErrorKind::MissingId => "no id returned",
            HostErrorKind::Io => "io error",
            HostErrorKind::Unknown => "unexpected error",
        }
    }
}

impl HostError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => HostErrorKind::Auth,
            404 => HostErrorKind::NotFound,
            408 => HostErrorKind::Timeout,
            413 => HostErrorKind::TooLarge,
            429 => HostErrorKind::RateLimit,
            500 | 502 | 503 | 504 => HostErrorKind::ServerError,
            _ => HostErrorKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    /// 2xx response that did not carry the expected id.
    pub fn missing_id(endpoint: &str) -> Self {
        Self {
            kind: HostErrorKind::MissingId,
            status: None,
            message: format!("{} response carried no id", endpoint),
        }
    }

    pub fn io(e: std::io::Error) -> Self {
        Self {
            kind: HostErrorKind::Io,
            status: None,
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for HostError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            HostErrorKind::Timeout
        } else if e.is_connect() {
            HostErrorKind::Network
        } else {
            HostErrorKind::Unknown
        };
        Self {
            kind,
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} (HTTP {}): {}",
                self.kind.category(),
                status,
                self.message
            ),
            None => write!(f, "{}: {}", self.kind.category(), self.message),
        }
    }
}

impl std::error::Error for HostError {}

/// Keep report lines readable when the store returns an HTML error page.
fn truncate_body(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    let body = body.trim();
    if body.chars().count() <= MAX_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(MAX_CHARS).collect();
    format!("{}...", truncated)
}
