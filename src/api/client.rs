//! HTTP client for the Wadesk CRM backend
//!
//! Wraps reqwest::Client with base-URL joining and uniform status checking.

use reqwest::multipart::Form;

use crate::error::{ClientError, Result};

/// Client bound to one backend base URL.
///
/// Shared as `Arc<ApiClient>` between the reconciler and store tasks.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for the given REST base URL (trailing slashes already
    /// stripped by [`crate::config::Config::api_base`]).
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET with query parameters.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let resp = self.http.get(&url).query(query).send().await?;
        check_response(resp, &url).await
    }

    /// POST a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let resp = self.http.post(&url).json(body).send().await?;
        check_response(resp, &url).await
    }

    /// PUT a JSON body.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("PUT {}", url);

        let resp = self.http.put(&url).json(body).send().await?;
        check_response(resp, &url).await
    }

    /// POST a multipart form (attachment uploads).
    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {} (multipart)", url);

        let resp = self.http.post(&url).multipart(form).send().await?;
        check_response(resp, &url).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}
