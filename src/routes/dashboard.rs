//! Dashboard endpoints: the live display panel and the history popup.
//!
//! - `GET  /dashboard/latest` – current display values, 404 before the first reading
//! - `GET  /dashboard/popup` – popup status
//! - `POST /dashboard/popup/open?date=YYYY-MM-DD` – open the popup (default: today)
//! - `POST /dashboard/popup/date?date=YYYY-MM-DD` – change the selected date
//! - `POST /dashboard/popup/close` – close the popup
//! - `GET  /dashboard/status` – poll interval, uptime and tick counters
//! - `POST /dashboard/interval?seconds=N` – change the poll interval at runtime
//!
//! Popup requests are serialized on one lock held for the whole request,
//! including the history query. A slow device therefore delays later popup
//! requests (status included) by at most the HTTP timeout, and each request
//! sees the popup only before or after another request, never in between.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    AppError, AppResult, DateKey, DisplayHandle, DisplaySnapshot, HistoryPopup, HistoryQuery,
    InvalidInterval, Rendered, UpdaterControl, UpdaterStatus,
};

// ---

/// Shared state for the dashboard routes.
pub struct DashboardState<Q> {
    // ---
    pub display: DisplayHandle,
    pub control: UpdaterControl,
    pub popup: Arc<Mutex<HistoryPopup<Q>>>,
}

impl<Q> Clone for DashboardState<Q> {
    fn clone(&self) -> Self {
        Self {
            display: self.display.clone(),
            control: self.control.clone(),
            popup: self.popup.clone(),
        }
    }
}

impl<Q: HistoryQuery> DashboardState<Q> {
    pub fn new(control: UpdaterControl, popup: HistoryPopup<Q>) -> Self {
        Self {
            display: control.display(),
            control,
            popup: Arc::new(Mutex::new(popup)),
        }
    }
}

pub fn router<Q: HistoryQuery>() -> Router<DashboardState<Q>> {
    // ---
    Router::new()
        .route("/dashboard/latest", get(latest::<Q>))
        .route("/dashboard/popup", get(popup_status::<Q>))
        .route("/dashboard/popup/open", post(open_popup::<Q>))
        .route("/dashboard/popup/date", post(change_date::<Q>))
        .route("/dashboard/popup/close", post(close_popup::<Q>))
        .route("/dashboard/status", get(status::<Q>))
        .route("/dashboard/interval", post(set_interval::<Q>))
}

/// Query parameters carrying a date.
#[derive(Debug, Deserialize)]
pub struct DateParams {
    date: Option<String>,
}

impl DateParams {
    fn parse(&self) -> AppResult<Option<DateKey>> {
        Ok(self.date.as_deref().map(str::parse::<DateKey>).transpose()?)
    }
}

/// Query parameters for an interval change.
#[derive(Debug, Deserialize)]
pub struct IntervalParams {
    seconds: Option<String>,
}

impl IntervalParams {
    fn parse(&self) -> AppResult<Duration> {
        // ---
        let seconds = self
            .seconds
            .as_deref()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&s| s > 0)
            .ok_or(InvalidInterval)?;
        Ok(Duration::from_secs(seconds))
    }
}

#[derive(Debug, Serialize)]
struct PopupStatus {
    open: bool,
    date: Option<DateKey>,
    generation: u64,
}

async fn latest<Q: HistoryQuery>(
    State(state): State<DashboardState<Q>>,
) -> AppResult<Json<DisplaySnapshot>> {
    // ---
    let snapshot = state.display.read().await.clone();
    snapshot
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No reading received yet".to_string()))
}

async fn popup_status<Q: HistoryQuery>(
    State(state): State<DashboardState<Q>>,
) -> Json<PopupStatus> {
    // ---
    let popup = state.popup.lock().await;
    Json(PopupStatus {
        open: popup.is_open(),
        date: popup.selected_date(),
        generation: popup.generation(),
    })
}

async fn open_popup<Q: HistoryQuery>(
    State(state): State<DashboardState<Q>>,
    Query(params): Query<DateParams>,
) -> AppResult<Json<Rendered>> {
    // ---
    let date = params.parse()?.unwrap_or_else(DateKey::today);
    info!("POST /dashboard/popup/open - date {}", date);

    let mut popup = state.popup.lock().await;
    let rendered = popup.open(date).await?;
    Ok(Json(rendered))
}

async fn change_date<Q: HistoryQuery>(
    State(state): State<DashboardState<Q>>,
    Query(params): Query<DateParams>,
) -> AppResult<Json<Rendered>> {
    // ---
    let date = params
        .parse()?
        .ok_or_else(|| AppError::BadRequest("Missing 'date' parameter".to_string()))?;
    debug!("POST /dashboard/popup/date - date {}", date);

    let mut popup = state.popup.lock().await;
    let rendered = popup.change_date(date).await?;
    Ok(Json(rendered))
}

async fn close_popup<Q: HistoryQuery>(State(state): State<DashboardState<Q>>) -> StatusCode {
    // ---
    state.popup.lock().await.close();
    StatusCode::NO_CONTENT
}

async fn status<Q: HistoryQuery>(State(state): State<DashboardState<Q>>) -> Json<UpdaterStatus> {
    Json(state.control.status())
}

async fn set_interval<Q: HistoryQuery>(
    State(state): State<DashboardState<Q>>,
    Query(params): Query<IntervalParams>,
) -> AppResult<Json<UpdaterStatus>> {
    // ---
    let period = params.parse()?;
    info!("POST /dashboard/interval - {}s", period.as_secs());

    state.control.set_period(period)?;
    Ok(Json(state.control.status()))
}
