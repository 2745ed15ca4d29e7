//! History queries behind one interface.
//!
//! - [`DeviceClient`] asks the device for its hourly aggregate
//! - [`LocalHistory`] reads the locally recorded samples
//!
//! Both answer [`HistoryResult::NoData`] for a date with nothing recorded;
//! errors are reserved for transport or decoding failures.

use std::future::Future;

use crate::client::DeviceClient;
use crate::error::QueryError;
use crate::models::{DateKey, HistoryResult};
use crate::store::{KeyValueStore, SharedHistory};

// ---

pub trait HistoryQuery: Send + Sync + 'static {
    fn query(
        &self,
        date: DateKey,
    ) -> impl Future<Output = Result<HistoryResult, QueryError>> + Send;
}

impl HistoryQuery for DeviceClient {
    async fn query(&self, date: DateKey) -> Result<HistoryResult, QueryError> {
        // ---
        let series = self.get_history(date).await?;
        if series.is_empty() {
            return Ok(HistoryResult::NoData { date });
        }
        Ok(HistoryResult::Hourly(series))
    }
}

/// Queries the shared local store.
#[derive(Debug)]
pub struct LocalHistory<K> {
    store: SharedHistory<K>,
}

impl<K> LocalHistory<K> {
    pub fn new(store: SharedHistory<K>) -> Self {
        Self { store }
    }
}

impl<K> Clone for LocalHistory<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K: KeyValueStore> HistoryQuery for LocalHistory<K> {
    async fn query(&self, date: DateKey) -> Result<HistoryResult, QueryError> {
        // ---
        let store = self.store.lock().await;
        match store.query(date) {
            Some(day) if !day.is_empty() => Ok(HistoryResult::Samples(day.clone())),
            _ => Ok(HistoryResult::NoData { date }),
        }
    }
}

/// Query strategy selected at configuration time.
#[derive(Debug)]
pub enum AnyHistory<K> {
    Remote(DeviceClient),
    Local(LocalHistory<K>),
}

impl<K> Clone for AnyHistory<K> {
    fn clone(&self) -> Self {
        match self {
            AnyHistory::Remote(c) => AnyHistory::Remote(c.clone()),
            AnyHistory::Local(l) => AnyHistory::Local(l.clone()),
        }
    }
}

impl<K: KeyValueStore> HistoryQuery for AnyHistory<K> {
    async fn query(&self, date: DateKey) -> Result<HistoryResult, QueryError> {
        match self {
            AnyHistory::Remote(client) => client.query(date).await,
            AnyHistory::Local(local) => local.query(date).await,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Reading;
    use crate::store::{HistoryStore, MemoryKv};

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_local_query_returns_samples() {
        // ---
        let shared = HistoryStore::load(MemoryKv::new(), 0).into_shared();
        shared
            .lock()
            .await
            .append(
                date("2023-11-14"),
                &Reading {
                    temperature: 22.3,
                    humidity: 45.0,
                    timestamp: 1_700_000_000_000,
                },
            )
            .await
            .unwrap();

        let local = LocalHistory::new(shared);
        match local.query(date("2023-11-14")).await.unwrap() {
            HistoryResult::Samples(day) => {
                assert_eq!(day.len(), 1);
                assert_eq!(day.temperature(), &[22.3]);
            }
            other => panic!("expected samples, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_query_missing_date_is_no_data() {
        // ---
        let shared = HistoryStore::load(MemoryKv::new(), 0).into_shared();
        let history: AnyHistory<MemoryKv> = AnyHistory::Local(LocalHistory::new(shared));

        let result = history.query(date("2023-11-15")).await.unwrap();
        assert_eq!(
            result,
            HistoryResult::NoData {
                date: date("2023-11-15")
            }
        );
    }
}
