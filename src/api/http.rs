//! HTTP utilities for Aptible REST API calls

use crate::error::{Error, Result, ValidationError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Media type spoken by the Aptible API
pub const HAL_JSON: &str = "application/hal+json";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull a human readable reason out of an error body.
///
/// Aptible errors carry `message` (and sometimes `error`); anything else is
/// reported as the sanitized body.
fn error_detail(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = payload.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    if body.is_empty() {
        return "no response body".to_string();
    }
    sanitize_for_log(body)
}

/// Map a non-success status to the error taxonomy.
fn status_error(status: StatusCode, url: &str, body: &str) -> Error {
    let detail = error_detail(body);
    if status == StatusCode::NOT_FOUND {
        Error::NotFound {
            path: url.to_string(),
            detail,
        }
    } else {
        Error::Api {
            status: status.as_u16(),
            detail,
        }
    }
}

/// HTTP client wrapper for Aptible API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("aptible-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Send one authenticated request and decode the JSON response.
    ///
    /// Empty bodies (204, bare DELETE) decode to `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, HAL_JSON)
            .header(CONTENT_TYPE, HAL_JSON);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status();
        let response_body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(status_error(status, url, &response_body));
        }

        decode_body(&response_body)
    }

    /// GET a plain-text body.
    ///
    /// `token` is `None` for presigned URLs, which reject extra credentials.
    pub async fn fetch_text(&self, url: &str, token: Option<&str>) -> Result<String> {
        tracing::debug!("GET {} (text)", url);

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("Text fetch error: {} - {}", status, sanitize_for_log(&body));
            return Err(status_error(status, url, &body));
        }
        Ok(body)
    }
}

/// Decode a successful response body; a non-JSON payload is a validation failure
fn decode_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| {
        tracing::error!("Malformed response body: {}", sanitize_for_log(body));
        ValidationError::new("response", "<root>", format!("is not valid JSON: {e}")).into()
    })
}
