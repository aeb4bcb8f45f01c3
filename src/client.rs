use std::env;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::types::{ChatRequest, ChatResponse};

/// Backend used when neither configuration nor environment names one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/";
/// Environment variable consulted for the backend URL.
pub const BACKEND_URL_ENV: &str = "CONFAB_BACKEND_URL";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The external completion interface.
///
/// One call is one conversational turn: the full transcript goes out and the
/// complete reply comes back.  Implementations report every failure as an
/// error; the orchestrator decides what the user sees.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Requests a completion for the conversation in `request`.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// Client for a chat backend exposing `POST /chat`.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: ReqwestClient,
    chat_url: Url,
    timeout: Duration,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// The base URL can be provided directly or read from the
    /// `CONFAB_BACKEND_URL` environment variable, falling back to
    /// `http://localhost:8000/`.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url
            .or_else(|| env::var(BACKEND_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let chat_url = chat_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            chat_url,
            timeout,
        })
    }

    /// The endpoint completions are posted to.
    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) if body.trim().is_empty() => {
                Error::api(status_code, "backend returned an empty error body")
            }
            Ok(body) => Error::api(status_code, body),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {}", e),
                Some(Box::new(e)),
            ),
        }
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.chat_url.clone())
            .headers(Self::default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.text().await.map_err(|e| {
            Error::http_client(format!("Failed to read response: {}", e), Some(Box::new(e)))
        })?;
        ChatResponse::from_body(&body)
    }
}

#[async_trait::async_trait]
impl CompletionClient for BackendClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(
            url = %self.chat_url,
            provider = %request.provider,
            model = %request.model,
            messages = request.messages.len(),
            "requesting completion"
        );
        let result = self.post_chat(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            tracing::warn!(error = %err, "completion request failed");
        }
        result
    }
}

/// Resolves the `/chat` endpoint against a base URL.
///
/// The base is treated as a directory, so `http://host/api` and
/// `http://host/api/` both resolve to `http://host/api/chat`.
fn chat_url(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url.trim())?;
    if base.cannot_be_a_base() {
        return Err(Error::validation(
            format!("backend URL {base_url:?} cannot be used as a base"),
            Some("backend_url".to_string()),
        ));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("chat")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = BackendClient::new(Some("http://localhost:8000".to_string())).unwrap();
        assert_eq!(client.chat_url().as_str(), "http://localhost:8000/chat");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);

        let client = BackendClient::with_options(
            Some("https://chat.example.com/".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.chat_url().as_str(), "https://chat.example.com/chat");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn chat_url_keeps_base_path() {
        assert_eq!(
            chat_url("http://host/api").unwrap().as_str(),
            "http://host/api/chat"
        );
        assert_eq!(
            chat_url("http://host/api/").unwrap().as_str(),
            "http://host/api/chat"
        );
    }

    #[test]
    fn chat_url_rejects_garbage() {
        assert!(chat_url("not a url").is_err());
        assert!(chat_url("mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_failure() {
        // Port 9 (discard) on localhost is closed on test machines.
        let client = BackendClient::with_options(
            Some("http://127.0.0.1:9/".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let request = ChatRequest::new(
            &[crate::types::Message::user("hello")],
            crate::catalog::Provider::Local,
            "local-mock",
        );
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.is_request_failure(), "unexpected error: {err}");
    }
}
