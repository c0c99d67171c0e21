//! Aptible Client
//!
//! Main client for interacting with the Aptible API, combining the resolved
//! credential and HTTP functionality.

use super::http::HttpClient;
use crate::error::Result;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Main Aptible client
///
/// The bearer token is resolved once at construction and shared read-only
/// by every clone.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    token: Arc<str>,
    pub api_url: String,
    pub auth_url: String,
}

impl ApiClient {
    /// Create a new client for the given endpoints
    pub fn new(api_url: &str, auth_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
            token: Arc::from(token),
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL from a path; absolute URLs (relationship hrefs)
    /// pass through untouched.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }

    /// Issue a request against the Aptible API
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.build_url(path);
        self.http.send(method, &url, &self.token, body).await
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None).await
    }

    /// GET a plain-text body from the Aptible API
    pub async fn get_text(&self, path: &str) -> Result<String> {
        self.http
            .fetch_text(&self.build_url(path), Some(&self.token))
            .await
    }

    /// GET a plain-text body from a presigned URL, without credentials
    pub async fn fetch_presigned(&self, url: &str) -> Result<String> {
        self.http.fetch_text(url, None).await
    }

    /// Build a URL on the auth service
    pub fn auth_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.auth_url, path)
    }
}
