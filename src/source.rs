//! Reading sources: where the live display gets its samples.
//!
//! Two strategies sit behind [`ReadingSource`]:
//! - [`DeviceClient`] reads `/api/latest` from the sensor device
//! - [`SimulatedSource`] generates plausible values locally
//!
//! [`AnySource`] picks one at startup from configuration.

use std::future::Future;

use chrono::Utc;
use rand::Rng;

use crate::client::DeviceClient;
use crate::error::SourceError;
use crate::models::Reading;

// ---

pub trait ReadingSource: Send + Sync + 'static {
    /// Produce the most recent reading.
    fn latest(&self) -> impl Future<Output = Result<Reading, SourceError>> + Send;
}

impl ReadingSource for DeviceClient {
    async fn latest(&self) -> Result<Reading, SourceError> {
        self.get_latest().await
    }
}

/// Stateless generator: temperature in [18, 30) °C, humidity in [20, 80) %.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSource;

impl SimulatedSource {
    // ---
    pub const TEMPERATURE_RANGE: std::ops::Range<f64> = 18.0..30.0;
    pub const HUMIDITY_RANGE: std::ops::Range<f64> = 20.0..80.0;

    pub fn sample<R: Rng>(rng: &mut R, timestamp: i64) -> Reading {
        Reading {
            temperature: rng.gen_range(Self::TEMPERATURE_RANGE),
            humidity: rng.gen_range(Self::HUMIDITY_RANGE),
            timestamp,
        }
    }
}

impl ReadingSource for SimulatedSource {
    async fn latest(&self) -> Result<Reading, SourceError> {
        let reading = Self::sample(&mut rand::thread_rng(), Utc::now().timestamp_millis());
        tracing::trace!(?reading, "Simulated reading");
        Ok(reading)
    }
}

/// Source selected at configuration time.
#[derive(Debug, Clone)]
pub enum AnySource {
    Remote(DeviceClient),
    Simulated(SimulatedSource),
}

impl ReadingSource for AnySource {
    async fn latest(&self) -> Result<Reading, SourceError> {
        match self {
            AnySource::Remote(client) => client.latest().await,
            AnySource::Simulated(sim) => sim.latest().await,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_simulated_values_stay_in_range() {
        // ---
        let mut rng = StdRng::seed_from_u64(42);
        for i in 0..1000 {
            let r = SimulatedSource::sample(&mut rng, i);
            assert!((18.0..30.0).contains(&r.temperature), "temperature {}", r.temperature);
            assert!((20.0..80.0).contains(&r.humidity), "humidity {}", r.humidity);
            assert_eq!(r.timestamp, i);
        }
    }

    #[tokio::test]
    async fn test_simulated_source_never_fails() {
        // ---
        let before = Utc::now().timestamp_millis();
        let reading = tokio_test::assert_ok!(SimulatedSource.latest().await);
        let after = Utc::now().timestamp_millis();

        assert!(reading.timestamp >= before && reading.timestamp <= after);
    }

    #[tokio::test]
    async fn test_any_source_dispatches_to_simulation() {
        // ---
        let source = AnySource::Simulated(SimulatedSource);
        let reading = source.latest().await.unwrap();
        assert!(SimulatedSource::HUMIDITY_RANGE.contains(&reading.humidity));
    }
}
