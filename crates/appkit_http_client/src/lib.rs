//! The HTTP seam between node transports and the network.
//!
//! Transports describe each call as an [`HttpRequest`] and hand it to an [`HttpClient`]. The
//! `default_client` feature provides a reqwest-backed implementation; tests substitute their own.

use async_trait::async_trait;
use snafu::Snafu;
use std::collections::BTreeMap;

#[derive(Debug, Snafu)]
pub enum HttpError {
    /// The request never produced a response.
    #[snafu(display("HTTP request failed: {message}"))]
    RequestError { message: String },

    /// The server answered with a non-success status.
    #[snafu(display("Request failed with status {status}: {message}"))]
    StatusError { status: u16, message: String },
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::StatusError { status, .. } => Some(*status),
            HttpError::RequestError { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One call against a base url owned by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute path, starting with `/`.
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Body bytes and their content type.
    pub body: Option<(Vec<u8>, String)>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Vec<u8>, content_type: &str) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: BTreeMap::new(),
            body: Some((body, content_type.to_string())),
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Sends requests to a single node. Implementations own the base url and authentication.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[cfg(feature = "default_client")]
pub struct DefaultHttpClient {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "default_client")]
impl DefaultHttpClient {
    pub fn new(base_url: &str) -> Self {
        DefaultHttpClient {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// A client that sends `header_name: header_value` on every request, e.g. an API token.
    pub fn with_header(
        base_url: &str,
        header_name: &str,
        header_value: &str,
    ) -> Result<Self, HttpError> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        let name = HeaderName::from_bytes(header_name.as_bytes()).map_err(|e| {
            HttpError::RequestError {
                message: format!("Invalid header name '{}': {}", header_name, e),
            }
        })?;
        let mut value =
            HeaderValue::from_str(header_value).map_err(|e| HttpError::RequestError {
                message: format!("Invalid value for header '{}': {}", header_name, e),
            })?;
        value.set_sensitive(true);

        let client = reqwest::Client::builder()
            .default_headers(HeaderMap::from_iter([(name, value)]))
            .build()
            .map_err(|e| HttpError::RequestError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(DefaultHttpClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(feature = "default_client")]
#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some((body, content_type)) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body);
        }

        let response = builder.send().await.map_err(|e| HttpError::RequestError {
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::RequestError {
                message: e.to_string(),
            })?
            .to_vec();

        if !status.is_success() {
            return Err(HttpError::StatusError {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_status_errors() {
        let not_found = HttpError::StatusError {
            status: 404,
            message: "txn not found".to_string(),
        };
        assert_eq!(not_found.status(), Some(404));
        assert_eq!(
            not_found.to_string(),
            "Request failed with status 404: txn not found"
        );

        let request = HttpError::RequestError {
            message: "connection refused".to_string(),
        };
        assert_eq!(request.status(), None);
    }

    #[test]
    fn requests_collect_query_parameters() {
        let request = HttpRequest::post("/v2/teal/compile", b"int 1".to_vec(), "text/plain")
            .query("sourcemap", "true");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.query.get("sourcemap").map(String::as_str), Some("true"));
        assert_eq!(
            request.body,
            Some((b"int 1".to_vec(), "text/plain".to_string()))
        );
        assert!(HttpRequest::get("/v2/status").body.is_none());
    }

    #[cfg(feature = "default_client")]
    #[test]
    fn invalid_header_name_is_rejected() {
        let result = DefaultHttpClient::with_header("http://localhost:4001", "bad header", "x");
        assert!(result.is_err());
    }

    #[cfg(feature = "default_client")]
    #[test]
    fn trailing_slash_is_trimmed() {
        let client = DefaultHttpClient::new("http://localhost:4001/");
        assert_eq!(client.base_url(), "http://localhost:4001");
    }
}
