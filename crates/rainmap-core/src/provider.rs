// Copyright 2025 Rainmap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Weather provider client with bounded retry.
//!
//! Fetches the current precipitation for a coordinate from an Open-Meteo
//! style forecast API. Transient failures (connect errors, timeouts, and a
//! fixed set of server status codes) are retried with exponential backoff;
//! everything else fails fast. Callers decide what an exhausted retry
//! budget means — the sampler degrades it to a zero-valued sample.

use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::sleep;

/// Default Open-Meteo forecast endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Configuration for the weather provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Forecast endpoint URL.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Total attempts per point, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry.
    pub backoff_base: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Errors from a single measurement fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure (connect error, timeout, bad body).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status after retries were exhausted.
    #[error("provider returned status {0}")]
    Status(StatusCode),
}

impl FetchError {
    /// Whether this failure is worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status(status) => is_retryable_status(*status),
        }
    }
}

/// Server statuses that indicate a transient condition.
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Backoff delay before retry number `retry` (0-based): base * 2^retry.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}

#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: CurrentConditions,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentConditions {
    // The provider omits the field when no data is available; treat as dry.
    #[serde(default)]
    precipitation: f64,
}

/// HTTP client for the weather provider.
///
/// Cheap to clone; the underlying connection pool is shared across clones,
/// which is what bounds concurrent outbound connections together with the
/// sampler's worker pool.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl WeatherClient {
    /// Build a client with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Fetch the current precipitation in millimeters for a coordinate.
    ///
    /// Retries transient failures up to the configured attempt budget with
    /// exponential backoff. A response without a precipitation field
    /// resolves to 0.0.
    pub async fn fetch_precipitation(&self, lat: f64, lon: f64) -> Result<f64, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.config.backoff_base, attempt - 1);
                debug!(
                    "Retrying ({}, {}) in {:?} (attempt {}/{})",
                    lat,
                    lon,
                    delay,
                    attempt + 1,
                    self.config.max_attempts
                );
                sleep(delay).await;
            }

            match self.fetch_once(lat, lon).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("Transient fetch error for ({}, {}): {}", lat, lon, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // max_attempts >= 1, so at least one attempt recorded an error
        Err(last_error.unwrap_or(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR)))
    }

    async fn fetch_once(&self, lat: f64, lon: f64) -> Result<f64, FetchError> {
        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", "precipitation".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: ForecastResponse = response.json().await?;
        Ok(body.current.precipitation)
    }
}
