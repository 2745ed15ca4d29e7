//! HTTP client for the sensor device's JSON API.
//!
//! The device exposes two endpoints:
//! - `GET /api/latest` – the current reading
//! - `GET /api/history?date=YYYY-MM-DD` – 24 hourly points for a date
//!
//! Non-2xx responses are reported as errors and never retried here; the
//! caller decides whether to try again on its next tick.

use std::time::Duration;

use reqwest::Client;

use crate::error::{QueryError, SourceError};
use crate::models::{DateKey, HourlySeries, Reading};

// ---

#[derive(Debug, Clone)]
pub struct DeviceClient {
    // ---
    http_client: Client,
    base_url: String,
}

impl DeviceClient {
    // ---
    /// Build a client for the device at `base_url`. Every request is bounded
    /// by `timeout` so a hung device cannot stall a tick forever.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        // ---
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the device's current reading.
    ///
    /// # Errors
    ///
    /// `SourceError::Transport` on network faults or timeouts,
    /// `SourceError::Status` on non-2xx, `SourceError::Decode` on bad JSON.
    pub async fn get_latest(&self) -> Result<Reading, SourceError> {
        // ---
        let url = format!("{}/api/latest", self.base_url);
        tracing::debug!("Fetching latest reading from: {}", url);

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status()));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(
                error = %e,
                body_preview = %text.chars().take(200).collect::<String>(),
                "Failed to parse latest reading"
            );
            SourceError::Decode(e.to_string())
        })
    }

    /// Fetch the device's hourly aggregate for `date`.
    ///
    /// # Errors
    ///
    /// `QueryError::Transport` on network faults or timeouts,
    /// `QueryError::Status` on non-2xx, `QueryError::Decode` on bad JSON or
    /// series of unequal length.
    pub async fn get_history(&self, date: DateKey) -> Result<HourlySeries, QueryError> {
        // ---
        let url = format!("{}/api/history", self.base_url);
        tracing::debug!("Fetching history for {} from: {}", date, url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("date", date.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Status(response.status()));
        }

        let text = response.text().await?;
        let series: HourlySeries = serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(
                error = %e,
                body_preview = %text.chars().take(200).collect::<String>(),
                "Failed to parse history response"
            );
            QueryError::Decode(e.to_string())
        })?;

        if !series.is_aligned() {
            return Err(QueryError::Decode(format!(
                "series lengths differ: hours={}, temperature={}, humidity={}",
                series.hours.len(),
                series.temperature.len(),
                series.humidity.len()
            )));
        }

        Ok(series)
    }
}
