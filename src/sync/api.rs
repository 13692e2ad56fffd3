//! Delta API Client - HTTP communication with the Graph mail API
//!
//! Handles the paginated delta query protocol:
//! - Initial request for a folder (`/me/mailFolders/{id}/messages/delta`)
//! - Following `@odata.nextLink` continuation links
//! - Resuming from a stored `@odata.deltaLink` cursor

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// One request in a delta cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Fresh query returning every current item
    Initial {
        folder_id: String,
        select: Vec<String>,
        page_size: Option<u32>,
    },
    /// A continuation link or a stored cursor, used verbatim
    Link { url: String, page_size: Option<u32> },
}

/// How a page ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLink {
    /// More pages pending; never a resumption anchor
    Next(String),
    /// Last page; the anchor for the next cycle
    Final(String),
}

/// One page of a delta response
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaPage {
    pub items: Vec<Value>,
    pub link: PageLink,
}

/// Remote paginated delta API
#[async_trait]
pub trait DeltaApi: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<DeltaPage, SyncApiError>;
}

/// API client for Graph delta queries
pub struct GraphDeltaClient {
    client: Client,
    base_url: Url,
    /// Bearer token sent with every request
    access_token: Option<String>,
}

impl GraphDeltaClient {
    /// Create new API client for a base URL such as `https://graph.microsoft.com/v1.0`
    pub fn new(base_url: &str) -> Result<Self, SyncApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SyncApiError::InvalidLink(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url,
            access_token: None,
        })
    }

    /// Create client with an access token already set
    pub fn with_token(base_url: &str, token: Option<String>) -> Result<Self, SyncApiError> {
        let mut client = Self::new(base_url)?;
        client.access_token = token;
        Ok(client)
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// URL of the initial delta query for a folder
    pub fn initial_url(&self, folder_id: &str, select: &[String]) -> Result<Url, SyncApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncApiError::InvalidLink(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["me", "mailFolders", folder_id, "messages", "delta"]);

        let select: Vec<&str> = select
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();
        if !select.is_empty() {
            url.query_pairs_mut().append_pair("$select", &select.join(","));
        }

        Ok(url)
    }

    /// Parse a link and make sure it points at the configured API
    pub fn checked_link(&self, link: &str) -> Result<Url, SyncApiError> {
        let url = Url::parse(link).map_err(|e| SyncApiError::InvalidLink(format!("{}", e)))?;
        if url.origin() != self.base_url.origin() {
            return Err(SyncApiError::ForeignLink(url.origin().ascii_serialization()));
        }
        Ok(url)
    }
}

#[async_trait]
impl DeltaApi for GraphDeltaClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<DeltaPage, SyncApiError> {
        let (url, page_size) = match request {
            PageRequest::Initial {
                folder_id,
                select,
                page_size,
            } => (self.initial_url(folder_id, select)?, *page_size),
            PageRequest::Link { url, page_size } => (self.checked_link(url)?, *page_size),
        };

        let mut builder = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");

        if let Some(size) = page_size {
            builder = builder.header("Prefer", format!("odata.maxpagesize={}", size));
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let raw: RawDeltaPage = handle_response(response).await?;
        raw.into_page()
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct RawDeltaPage {
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

impl RawDeltaPage {
    fn into_page(self) -> Result<DeltaPage, SyncApiError> {
        let link = match (self.next_link, self.delta_link) {
            (Some(next), None) => PageLink::Next(next),
            (None, Some(delta)) => PageLink::Final(delta),
            (Some(_), Some(_)) => {
                return Err(SyncApiError::InvalidResponse(
                    "page carries both nextLink and deltaLink".to_string(),
                ))
            }
            (None, None) => {
                return Err(SyncApiError::InvalidResponse(
                    "page carries neither nextLink nor deltaLink".to_string(),
                ))
            }
        };

        Ok(DeltaPage {
            items: self.value,
            link,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SyncApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unauthorized - access token missing or expired")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sync state expired: {0}")]
    Gone(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Refusing link to foreign origin {0}")]
    ForeignLink(String),
}

impl SyncApiError {
    /// The stored cursor is no longer accepted by the provider
    pub fn is_expired_cursor(&self) -> bool {
        matches!(self, SyncApiError::Gone(_))
    }

    /// The link could not be followed at all (unparseable or off-origin)
    pub fn is_unusable_link(&self) -> bool {
        matches!(self, SyncApiError::InvalidLink(_) | SyncApiError::ForeignLink(_))
    }
}

/// Handle successful JSON response
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SyncApiError> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| SyncApiError::InvalidResponse(e.to_string()))
    } else {
        Err(handle_error(response).await)
    }
}

/// Convert error response to SyncApiError
async fn handle_error(response: reqwest::Response) -> SyncApiError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let msg = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) if !err.error.code.is_empty() => format!("{}: {}", err.error.code, err.error.message),
        Ok(err) => err.error.message,
        Err(_) => body,
    };

    match status {
        StatusCode::UNAUTHORIZED => SyncApiError::Unauthorized,
        StatusCode::FORBIDDEN => SyncApiError::Forbidden(msg),
        StatusCode::NOT_FOUND => SyncApiError::NotFound(msg),
        StatusCode::GONE => SyncApiError::Gone(msg),
        StatusCode::TOO_MANY_REQUESTS => SyncApiError::RateLimitExceeded,
        s if s.is_server_error() => SyncApiError::ServerError(format!("{}: {}", s, msg)),
        _ => SyncApiError::NetworkError(format!("{}: {}", status, msg)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GraphDeltaClient {
        GraphDeltaClient::new(DEFAULT_BASE_URL).unwrap()
    }

    #[test]
    fn test_client_creation() {
        assert!(!client().has_token());
        let client = GraphDeltaClient::with_token(DEFAULT_BASE_URL, Some("t".into())).unwrap();
        assert!(client.has_token());
        assert!(GraphDeltaClient::new("not a url").is_err());
    }

    #[test]
    fn test_initial_url() {
        let client = client();

        let url = client.initial_url("inbox", &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/me/mailFolders/inbox/messages/delta"
        );

        let url = client
            .initial_url("AAMk/x=", &["subject".into(), " isRead ".into(), "".into()])
            .unwrap();
        assert!(url.path().ends_with("/me/mailFolders/AAMk%2Fx=/messages/delta"));
        let select: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(select, vec![("$select".to_string(), "subject,isRead".to_string())]);
    }

    #[test]
    fn test_base_url_with_trailing_slash() {
        let client = GraphDeltaClient::new("https://graph.microsoft.com/v1.0/").unwrap();
        let url = client.initial_url("inbox", &[]).unwrap();
        assert_eq!(url.path(), "/v1.0/me/mailFolders/inbox/messages/delta");
    }

    #[test]
    fn test_foreign_links_are_refused() {
        let client = client();

        assert!(client
            .checked_link("https://graph.microsoft.com/v1.0/me/mailFolders/inbox/messages/delta?$deltatoken=x")
            .is_ok());
        assert!(matches!(
            client.checked_link("https://evil.example.com/steal"),
            Err(SyncApiError::ForeignLink(_))
        ));
        assert!(matches!(
            client.checked_link("http://graph.microsoft.com/v1.0/me"),
            Err(SyncApiError::ForeignLink(_))
        ));
        assert!(matches!(
            client.checked_link("not a url"),
            Err(SyncApiError::InvalidLink(_))
        ));
    }

    #[test]
    fn test_raw_page_links() {
        let raw: RawDeltaPage = serde_json::from_value(json!({
            "value": [{"id": "m1"}],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/next"
        }))
        .unwrap();
        let page = raw.into_page().unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.link, PageLink::Next("https://graph.microsoft.com/v1.0/next".into()));

        let raw: RawDeltaPage = serde_json::from_value(json!({
            "value": [],
            "@odata.deltaLink": "https://graph.microsoft.com/v1.0/delta"
        }))
        .unwrap();
        assert_eq!(
            raw.into_page().unwrap().link,
            PageLink::Final("https://graph.microsoft.com/v1.0/delta".into())
        );
    }

    #[test]
    fn test_raw_page_requires_exactly_one_link() {
        let both: RawDeltaPage = serde_json::from_value(json!({
            "value": [],
            "@odata.nextLink": "a",
            "@odata.deltaLink": "b"
        }))
        .unwrap();
        assert!(matches!(both.into_page(), Err(SyncApiError::InvalidResponse(_))));

        let neither: RawDeltaPage = serde_json::from_value(json!({"value": []})).unwrap();
        assert!(matches!(neither.into_page(), Err(SyncApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_expired_cursor_detection() {
        assert!(SyncApiError::Gone("syncStateNotFound".into()).is_expired_cursor());
        assert!(!SyncApiError::RateLimitExceeded.is_expired_cursor());
    }
}
