//! REST document store client.
//!
//! Documents are addressed as `{base}/v1/documents/{collection}/{key}`:
//! `PUT` upserts, `GET` fetches (404 means absent), `HEAD` checks existence.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::RemoteBackupStore;
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// HTTP client for a remote document service.
#[derive(Clone)]
pub struct HttpBackupStore {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpBackupStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpBackupStore")
            .field("base_url", &self.base_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpBackupStore {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        Self::with_timeout(
            base_url,
            auth_token,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            auth_token: normalize_text_option(auth_token),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<String> {
        let collection = collection.trim();
        let key = key.trim();
        if collection.is_empty() || key.is_empty() {
            return Err(Error::InvalidInput(
                "document collection and key must not be empty".to_string(),
            ));
        }
        Ok(format!(
            "{}/v1/documents/{}/{}",
            self.base_url,
            urlencoding::encode(collection),
            urlencoding::encode(key)
        ))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RemoteBackupStore for HttpBackupStore {
    async fn upsert_document(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
        let url = self.document_url(collection, key)?;
        let response = self
            .authorize(self.client.put(&url))
            .header("Accept", "application/json")
            .json(value)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        Ok(())
    }

    async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let url = self.document_url(collection, key)?;
        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        Ok(Some(response.json::<Value>().await?))
    }

    async fn document_exists(&self, collection: &str, key: &str) -> Result<bool> {
        let url = self.document_url(collection, key)?;
        let response = self.authorize(self.client.head(&url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::Remote(format!("HTTP {}", status.as_u16()))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        Error::InvalidInput("remote base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "remote base URL must include http:// or https://".to_string(),
        ))
    }
}
