//! Temperature/humidity dashboard core.
//!
//! A reading source feeds a periodic live-display updater, which records
//! every reading into a per-day history store. History for a chosen date is
//! queried (locally or from the device) and rendered as two line charts.
//!
//! Module boundaries follow the Explicit Module Boundary Pattern (EMBP):
//! siblings import shared types from the crate root, never from each other's
//! internals.

pub mod chart;
pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod source;
pub mod store;
pub mod updater;

pub use chart::{ChartPair, ChartPresenter, HistoryPopup, LineChart, Notice, Rendered};
pub use client::DeviceClient;
pub use config::Config;
pub use error::{
    AppError, AppResult, InvalidInterval, PopupError, QueryError, SourceError, StorageError,
};
pub use models::{
    Comfort, DateKey, DateKeyError, DayHistory, DisplaySnapshot, HistoryResult, HourlySeries,
    Reading,
};
pub use query::{AnyHistory, HistoryQuery, LocalHistory};
pub use source::{AnySource, ReadingSource, SimulatedSource};
pub use store::{FileKv, HistoryStore, KeyValueStore, MemoryKv, SharedHistory};
pub use updater::{DisplayHandle, LiveUpdater, TickOutcome, UpdaterControl, UpdaterStatus};
