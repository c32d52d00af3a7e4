//! HTTP client for the vendor REST API.
//!
//! One [`VendorClient`] implements every gateway trait. Clones share the
//! connection pool, circuit breaker, caches and metrics, so a client bound
//! to a different license (see [`VendorClient::with_license`]) still counts
//! towards the same vendor health.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::circuit::{CircuitBreaker, CircuitState};
use super::error::GatewayError;
use super::metrics::{GatewayMetrics, OperationStats};
use super::wire;
use super::{
    DescriptionGateway, DescriptionRequest, GoldenPrompt, MetadataGateway, PromptAuthority,
    TranscriptGateway, TranscriptRequest,
};
use crate::config::VendorConfig;
use crate::source::SourceKind;
use crate::worker::job::VideoDetails;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 1_000;
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);

/// Static description of one vendor endpoint.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    operation: &'static str,
    post: bool,
    timeout: Duration,
    retries: u32,
    licensed: bool,
}

const HEALTH: Endpoint = Endpoint {
    operation: "health",
    post: false,
    timeout: Duration::from_secs(10),
    retries: 0,
    licensed: false,
};

const VIDEO_DATA: Endpoint = Endpoint {
    operation: "video_data",
    post: true,
    timeout: Duration::from_secs(30),
    retries: 2,
    licensed: true,
};

const TRANSCRIPT: Endpoint = Endpoint {
    operation: "transcript",
    post: true,
    timeout: Duration::from_secs(180),
    retries: 2,
    licensed: true,
};

const DESCRIPTION: Endpoint = Endpoint {
    operation: "description",
    post: true,
    timeout: Duration::from_secs(120),
    retries: 1,
    licensed: true,
};

const GOLDEN_PROMPT: Endpoint = Endpoint {
    operation: "golden_prompt",
    post: false,
    timeout: Duration::from_secs(30),
    retries: 1,
    licensed: true,
};

const GOLDEN_PROMPT_CHECK: Endpoint = Endpoint {
    operation: "golden_prompt_check",
    post: false,
    timeout: Duration::from_secs(15),
    retries: 1,
    licensed: true,
};

/// Result of a vendor health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub healthy: bool,
    pub latency_ms: u64,
}

struct Shared {
    http: Client,
    base_url: String,
    site_url: String,
    breaker: CircuitBreaker,
    metrics: GatewayMetrics,
    video_cache: Cache<String, VideoDetails>,
    transcript_cache: Cache<String, String>,
    health_cache: Cache<&'static str, HealthStatus>,
}

#[derive(Clone)]
pub struct VendorClient {
    shared: Arc<Shared>,
    license: Option<Arc<SecretString>>,
    retry_base: Duration,
}

impl fmt::Debug for VendorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorClient")
            .field("base_url", &self.shared.base_url)
            .field("licensed", &self.license.is_some())
            .field("circuit", &self.shared.breaker.state())
            .finish()
    }
}

impl VendorClient {
    pub fn new(config: &VendorConfig, license: Option<SecretString>) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("vidpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport {
                operation: "client",
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        let shared = Shared {
            http,
            base_url: config.api_base(),
            site_url: config.site_url.clone(),
            breaker: CircuitBreaker::new(
                config.circuit_breaker_threshold,
                Duration::from_secs(config.circuit_breaker_cooldown_secs),
            ),
            metrics: GatewayMetrics::new(),
            video_cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build(),
            transcript_cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(config.transcript_cache_ttl_secs))
                .build(),
            health_cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(HEALTH_CACHE_TTL)
                .build(),
        };

        Ok(Self {
            shared: Arc::new(shared),
            license: license.map(Arc::new),
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Builds a client with the license key resolved from `config`.
    pub fn from_config(config: &VendorConfig) -> crate::Result<Self> {
        let license = config.license_key()?;
        match &license {
            Some(key) => tracing::info!(
                server = %crate::sanitize::redact_url(&config.server_url),
                license = %crate::sanitize::fingerprint(key.expose_secret()),
                "Vendor client configured"
            ),
            None => tracing::warn!("No vendor license key configured; licensed endpoints will fail"),
        }
        Ok(Self::new(config, license)?)
    }

    /// Same client bound to another license key.
    pub fn with_license(&self, license: SecretString) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            license: Some(Arc::new(license)),
            retry_base: self.retry_base,
        }
    }

    /// Base delay of the in-client retry backoff.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn has_license(&self) -> bool {
        self.license.is_some()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.shared.breaker.state()
    }

    pub fn metrics(&self) -> std::collections::BTreeMap<String, OperationStats> {
        self.shared.metrics.snapshot()
    }

    /// Drops every cached response.
    pub fn clear_caches(&self) {
        self.shared.video_cache.invalidate_all();
        self.shared.transcript_cache.invalidate_all();
        self.shared.health_cache.invalidate_all();
    }

    /// Probes the public health endpoint. Cached for a minute.
    pub async fn health(&self) -> Result<HealthStatus, GatewayError> {
        if let Some(cached) = self.shared.health_cache.get(HEALTH.operation) {
            self.shared.metrics.record_cache_hit(HEALTH.operation);
            return Ok(cached);
        }

        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            status: String,
        }

        let started = Instant::now();
        let body: Body = self.call(&HEALTH, "health", None).await?;
        let status = HealthStatus {
            healthy: matches!(body.status.as_str(), "ok" | "healthy"),
            status: body.status,
            latency_ms: started.elapsed().as_millis() as u64,
        };
        self.shared
            .health_cache
            .insert(HEALTH.operation, status.clone());
        Ok(status)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, GatewayError> {
        let text = self.execute(endpoint, path, body).await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode {
            operation: endpoint.operation,
            message: e.to_string(),
        })
    }

    /// Sends a request with circuit breaking and bounded retries.
    async fn execute(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, GatewayError> {
        let license = match (&self.license, endpoint.licensed) {
            (Some(key), _) => Some(key.as_ref()),
            (None, true) => return Err(GatewayError::MissingLicense),
            (None, false) => None,
        };

        let mut attempt = 0u32;
        loop {
            self.shared.breaker.acquire()?;

            let started = Instant::now();
            let result = self.send_once(endpoint, path, body, license).await;
            self.shared
                .metrics
                .record_call(endpoint.operation, started.elapsed(), result.is_ok());

            match &result {
                Ok(_) => self.shared.breaker.record_success(),
                Err(e) if e.counts_against_circuit() => self.shared.breaker.record_failure(),
                Err(_) => self.shared.breaker.record_neutral(),
            }

            match result {
                Err(e) if attempt < endpoint.retries && retry_in_client(&e) => {
                    attempt += 1;
                    let delay = self.retry_base * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        operation = endpoint.operation,
                        attempt,
                        "Vendor call failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        operation = endpoint.operation,
                        status = e.status(),
                        "Vendor call failed: {}",
                        e
                    );
                    return Err(e);
                }
                Ok(text) => return Ok(text),
            }
        }
    }

    async fn send_once(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: Option<&Value>,
        license: Option<&SecretString>,
    ) -> Result<String, GatewayError> {
        let operation = endpoint.operation;
        let url = format!("{}{}", self.shared.base_url, path);

        let mut request = match body {
            Some(body) => self.shared.http.post(&url).json(body),
            None => self.shared.http.get(&url),
        }
        .timeout(endpoint.timeout)
        .header("X-Site-URL", &self.shared.site_url);

        if let Some(key) = license {
            request = request
                .bearer_auth(key.expose_secret())
                .header("X-License-Key", key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(operation, &e))?;

        if status.is_success() {
            tracing::debug!(operation, status = status.as_u16(), "Vendor call succeeded");
            return Ok(text);
        }

        let message = wire::error_message(&text);
        Err(match status.as_u16() {
            401 => GatewayError::Unauthorized { operation },
            404 => GatewayError::NotFound { operation, message },
            code => GatewayError::Status {
                operation,
                status: code,
                message,
            },
        })
    }
}

fn transport_error(operation: &'static str, error: &reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout { operation }
    } else {
        GatewayError::Transport {
            operation,
            message: crate::sanitize::sanitize_error_message(&error.to_string()),
        }
    }
}

/// Failures retried inside a single call. Throttling and other statuses are
/// left to the job-level backoff.
fn retry_in_client(error: &GatewayError) -> bool {
    match error {
        GatewayError::Transport { .. } | GatewayError::Timeout { .. } => true,
        GatewayError::Status { status, .. } => matches!(status, 502 | 503 | 504),
        _ => false,
    }
}

fn cache_key(operation: &str, body: &Value) -> String {
    format!("{operation}:{body}")
}

#[async_trait]
impl MetadataGateway for VendorClient {
    async fn fetch_video(
        &self,
        source: SourceKind,
        video_id: &str,
    ) -> Result<VideoDetails, GatewayError> {
        let body = serde_json::json!({ "video_id": video_id });
        let key = cache_key(&format!("{}/video-data", source.as_str()), &body);
        if let Some(cached) = self.shared.video_cache.get(&key) {
            self.shared.metrics.record_cache_hit(VIDEO_DATA.operation);
            return Ok(cached);
        }

        let path = format!("{}/video-data", source.as_str());
        let response: wire::VideoDataResponse =
            self.call(&VIDEO_DATA, &path, Some(&body)).await?;
        let details: VideoDetails = response
            .video_data
            .ok_or_else(|| GatewayError::NotFound {
                operation: VIDEO_DATA.operation,
                message: format!("no data for video {video_id}"),
            })?
            .into();

        self.shared.video_cache.insert(key, details.clone());
        Ok(details)
    }
}

#[async_trait]
impl TranscriptGateway for VendorClient {
    async fn fetch_transcript(
        &self,
        request: &TranscriptRequest,
    ) -> Result<Option<String>, GatewayError> {
        let body = serde_json::to_value(request).map_err(|e| GatewayError::Decode {
            operation: TRANSCRIPT.operation,
            message: e.to_string(),
        })?;
        let key = cache_key(TRANSCRIPT.operation, &body);
        if let Some(cached) = self.shared.transcript_cache.get(&key) {
            self.shared.metrics.record_cache_hit(TRANSCRIPT.operation);
            return Ok(Some(cached));
        }

        let response: wire::TranscriptResponse =
            self.call(&TRANSCRIPT, "transcript", Some(&body)).await?;
        match response.transcript.filter(|t| !t.trim().is_empty()) {
            Some(text) => {
                self.shared.transcript_cache.insert(key, text.clone());
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DescriptionGateway for VendorClient {
    async fn generate_description(
        &self,
        request: &DescriptionRequest,
    ) -> Result<String, GatewayError> {
        let body = serde_json::to_value(request).map_err(|e| GatewayError::Decode {
            operation: DESCRIPTION.operation,
            message: e.to_string(),
        })?;
        let response: wire::DescriptionResponse =
            self.call(&DESCRIPTION, "description", Some(&body)).await?;
        response
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or(GatewayError::Decode {
                operation: DESCRIPTION.operation,
                message: "empty description".to_string(),
            })
    }
}

#[async_trait]
impl PromptAuthority for VendorClient {
    async fn has_golden_prompt(&self) -> Result<bool, GatewayError> {
        let response: wire::GoldenPromptCheckResponse = self
            .call(&GOLDEN_PROMPT_CHECK, "golden-prompt/check", None)
            .await?;
        Ok(response.has_golden_prompt)
    }

    async fn golden_prompt(&self) -> Result<Option<GoldenPrompt>, GatewayError> {
        let response: wire::GoldenPromptResponse =
            match self.call(&GOLDEN_PROMPT, "golden-prompt", None).await {
                Ok(response) => response,
                Err(GatewayError::NotFound { .. }) => return Ok(None),
                Err(e) => return Err(e),
            };

        if !response.has_golden_prompt {
            return Ok(None);
        }
        Ok(response
            .golden_prompt
            .filter(|p| !p.trim().is_empty())
            .map(|text| GoldenPrompt {
                text,
                hash: response.hash,
            }))
    }
}
