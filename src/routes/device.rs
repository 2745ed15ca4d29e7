//! Simulated device API, the same surface the sensor firmware serves.
//!
//! - `GET /api/latest` – `{ temperature, humidity, timestamp }`
//! - `GET /api/history?date=YYYY-MM-DD` – 24 hourly points for the date

use axum::{extract::Query, routing::get, Json, Router};
use chrono::Local;
use serde::Deserialize;
use tracing::debug;

use crate::{device, AppError, AppResult, DateKey, HourlySeries, Reading};

// ---

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // ---
    Router::new()
        .route("/api/latest", get(latest))
        .route("/api/history", get(history))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    date: Option<String>,
}

async fn latest() -> Json<Reading> {
    // ---
    let reading = device::latest(Local::now());
    debug!("GET /api/latest - {:?}", reading);
    Json(reading)
}

async fn history(Query(params): Query<HistoryParams>) -> AppResult<Json<HourlySeries>> {
    // ---
    let date: DateKey = params
        .date
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| {
            AppError::BadRequest("Invalid 'date' parameter. Expected format YYYY-MM-DD".to_string())
        })?;
    debug!("GET /api/history - date {}", date);

    Ok(Json(device::hourly(date)))
}
