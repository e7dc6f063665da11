//! HTTP client for the profile backend.

use std::future::Future;
use std::time::Duration;

use harvest_core::ProfileRecord;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ApiClientError;

/// What the backend did with a submitted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateOutcome {
    Created {
        id: i64,
    },
    Duplicate {
        existing_id: Option<i64>,
        message: String,
    },
    Error {
        message: String,
        /// The request never got a response.
        network: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiConnection {
    pub online: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uptime_secs: Option<u64>,
}

/// Where the orchestrator sends extracted records.
pub trait ProfileSink: Send + Sync + 'static {
    /// Never retries and never fails; every failure is an outcome.
    fn create_profile(&self, record: &ProfileRecord)
        -> impl Future<Output = CreateOutcome> + Send;

    fn check_connection(&self) -> impl Future<Output = ApiConnection> + Send;
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct CreatedBody {
    id: i64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    existing_id: Option<i64>,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    /// # Errors
    ///
    /// - [`ApiClientError::InvalidBaseUrl`] if `base_url` is not http(s).
    /// - [`ApiClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ApiClientError::InvalidBaseUrl {
                base_url: base_url.to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: trimmed.to_string(),
            api_key: None,
        })
    }

    /// Sends `key` as a bearer token on profile submissions. Blank keys are
    /// ignored.
    #[must_use]
    pub fn with_api_key(mut self, key: Option<&str>) -> Self {
        self.api_key = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/health`.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::Http`] on transport or decode failure.
    /// - [`ApiClientError::UnexpectedStatus`] on a non-2xx response.
    pub async fn health(&self) -> Result<HealthReport, ApiClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiClientError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }
        let envelope: Envelope<HealthReport> = response.json().await?;
        Ok(envelope.data)
    }

    async fn post_profile(&self, record: &ProfileRecord) -> CreateOutcome {
        let url = format!("{}/profiles", self.base_url);
        let mut request = self.client.post(&url).json(record);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %record.url, error = %e, "backend unreachable");
                return CreateOutcome::Error {
                    message: format!("network error: {e}"),
                    network: true,
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<Envelope<CreatedBody>>().await {
                Ok(body) => CreateOutcome::Created { id: body.data.id },
                Err(e) => CreateOutcome::Error {
                    message: format!("unreadable create response: {e}"),
                    network: false,
                },
            };
        }

        let body = response.json::<ErrorEnvelope>().await.ok().map(|e| e.error);
        if status == StatusCode::CONFLICT {
            let existing_id = body.as_ref().and_then(|b| b.existing_id);
            CreateOutcome::Duplicate {
                existing_id,
                message: body.map_or_else(|| "profile already exists".to_string(), |b| b.message),
            }
        } else {
            CreateOutcome::Error {
                message: body.map_or_else(|| format!("HTTP {}", status.as_u16()), |b| b.message),
                network: false,
            }
        }
    }
}

impl ProfileSink for ApiClient {
    async fn create_profile(&self, record: &ProfileRecord) -> CreateOutcome {
        self.post_profile(record).await
    }

    async fn check_connection(&self) -> ApiConnection {
        match self.health().await {
            Ok(report) => ApiConnection {
                online: true,
                message: match report.version {
                    Some(version) => format!("backend {} (v{version})", report.status),
                    None => format!("backend {}", report.status),
                },
            },
            Err(e) => ApiConnection {
                online: false,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn new_rejects_non_http_base() {
        let err = ApiClient::new("localhost:3000", Duration::from_secs(1))
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiClientError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(CreateOutcome::Created { id: 9 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "created", "id": 9}));
    }
}
