//! Chart presenter and the history popup.
//!
//! [`ChartPresenter`] turns a [`HistoryResult`] into two line charts
//! (temperature, humidity) per container. Rendering into a container that
//! already holds charts destroys them first; series are never layered.
//!
//! [`HistoryPopup`] models one "open history" dialog: it renders the default
//! date on open and re-queries on each date change. A lifecycle has exactly
//! one date-change path, so reopening never stacks handlers.

use std::collections::HashMap;
use std::fmt;

use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::error::{PopupError, QueryError};
use crate::models::{format_clock, DateKey, HistoryResult};
use crate::query::HistoryQuery;

// ---

pub const LINE_TENSION: f64 = 0.35;
pub const TEMPERATURE_TITLE: &str = "Temperature (°C)";
pub const HUMIDITY_TITLE: &str = "Humidity (%)";

/// One line series with its x labels and y-axis hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    // ---
    pub title: String,
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub tension: f64,
    pub begin_at_zero: bool,
    /// Advisory bounds; values outside still render.
    pub suggested_min: Option<f64>,
    pub suggested_max: Option<f64>,
}

/// The two charts drawn in one container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPair {
    /// Unique per render, so callers can tell a replacement from the original.
    pub id: u64,
    pub temperature: LineChart,
    pub humidity: LineChart,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub date: DateKey,
}

/// Outcome of a render: charts, or a notice when there is nothing to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rendered {
    Charts(ChartPair),
    Notice(Notice),
}

#[derive(Debug)]
pub struct ChartPresenter<Tz: TimeZone = Local> {
    // ---
    tz: Tz,
    charts: HashMap<String, ChartPair>,
    next_id: u64,
    destroyed: u64,
}

impl ChartPresenter<Local> {
    pub fn new() -> Self {
        Self::with_timezone(Local)
    }
}

impl Default for ChartPresenter<Local> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz: TimeZone> ChartPresenter<Tz>
where
    Tz::Offset: fmt::Display,
{
    // ---
    /// Per-sample labels are rendered as wall-clock time in `tz`.
    pub fn with_timezone(tz: Tz) -> Self {
        Self {
            tz,
            charts: HashMap::new(),
            next_id: 1,
            destroyed: 0,
        }
    }

    /// Render `result` into `container`, replacing whatever was there.
    ///
    /// An empty result produces a notice and leaves the container empty.
    pub fn render(&mut self, container: &str, result: &HistoryResult) -> Rendered {
        // ---
        self.destroy(container);

        let (date, labels, temperature, humidity) = match result {
            HistoryResult::Hourly(series) if !series.is_empty() => (
                series.date,
                series
                    .hours
                    .iter()
                    .map(|h| format!("{h:02}:00"))
                    .collect::<Vec<String>>(),
                series.temperature.clone(),
                series.humidity.clone(),
            ),
            HistoryResult::Samples(day) if !day.is_empty() => (
                Some(day.date()),
                day.timestamps()
                    .iter()
                    .map(|ts| format_clock(*ts, &self.tz))
                    .collect(),
                day.temperature().to_vec(),
                day.humidity().to_vec(),
            ),
            HistoryResult::Hourly(series) => {
                return no_data(series.date.unwrap_or_else(DateKey::today))
            }
            HistoryResult::Samples(day) => return no_data(day.date()),
            HistoryResult::NoData { date } => return no_data(*date),
        };

        let pair = ChartPair {
            id: self.next_id,
            temperature: LineChart {
                title: TEMPERATURE_TITLE.to_string(),
                labels: labels.clone(),
                data: temperature,
                tension: LINE_TENSION,
                begin_at_zero: false,
                suggested_min: None,
                suggested_max: None,
            },
            humidity: LineChart {
                title: HUMIDITY_TITLE.to_string(),
                labels,
                data: humidity,
                tension: LINE_TENSION,
                begin_at_zero: false,
                suggested_min: Some(0.0),
                suggested_max: Some(100.0),
            },
        };
        self.next_id += 1;

        tracing::debug!(
            container,
            date = ?date.map(|d| d.to_string()),
            points = pair.temperature.data.len(),
            chart_id = pair.id,
            "Charts rendered"
        );

        self.charts.insert(container.to_string(), pair.clone());
        Rendered::Charts(pair)
    }

    /// Charts currently shown in `container`.
    pub fn charts(&self, container: &str) -> Option<&ChartPair> {
        self.charts.get(container)
    }

    /// Remove the charts in `container`, if any.
    pub fn destroy(&mut self, container: &str) -> bool {
        // ---
        let removed = self.charts.remove(container).is_some();
        if removed {
            self.destroyed += 1;
        }
        removed
    }

    /// Total chart pairs destroyed so far.
    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }
}

fn no_data(date: DateKey) -> Rendered {
    tracing::info!(%date, "No history for date");
    Rendered::Notice(Notice {
        title: "No data".to_string(),
        message: format!("No readings stored for {date}."),
        date,
    })
}

/// An open popup lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PopupSession {
    generation: u64,
    date: DateKey,
}

/// The history dialog: a date picker over a chart container.
pub struct HistoryPopup<Q, Tz: TimeZone = Local> {
    // ---
    query: Q,
    presenter: ChartPresenter<Tz>,
    container: String,
    session: Option<PopupSession>,
    generation: u64,
}

impl<Q: HistoryQuery> HistoryPopup<Q, Local> {
    pub fn new(query: Q, container: &str) -> Self {
        Self::with_presenter(query, ChartPresenter::new(), container)
    }
}

impl<Q: HistoryQuery, Tz: TimeZone> HistoryPopup<Q, Tz>
where
    Tz::Offset: fmt::Display,
{
    // ---
    pub fn with_presenter(query: Q, presenter: ChartPresenter<Tz>, container: &str) -> Self {
        Self {
            query,
            presenter,
            container: container.to_string(),
            session: None,
            generation: 0,
        }
    }

    /// Start a new lifecycle showing `date`. An already open lifecycle is
    /// replaced, not joined.
    ///
    /// The session is committed only once the query succeeds; on error the
    /// popup keeps its previous state.
    pub async fn open(&mut self, date: DateKey) -> Result<Rendered, QueryError> {
        // ---
        let rendered = self.show(date).await?;

        if self.session.is_some() {
            tracing::debug!("History popup reopened, replacing previous lifecycle");
        }
        self.generation += 1;
        self.session = Some(PopupSession {
            generation: self.generation,
            date,
        });
        Ok(rendered)
    }

    /// The user picked a different date in the open popup. On error the
    /// selected date and the charts on screen stay as they were.
    pub async fn change_date(&mut self, date: DateKey) -> Result<Rendered, PopupError> {
        // ---
        if self.session.is_none() {
            return Err(PopupError::Closed);
        }
        let rendered = self.show(date).await?;

        if let Some(session) = self.session.as_mut() {
            session.date = date;
        }
        Ok(rendered)
    }

    pub fn close(&mut self) {
        // ---
        if self.session.take().is_some() {
            self.presenter.destroy(&self.container);
            tracing::debug!(generation = self.generation, "History popup closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn selected_date(&self) -> Option<DateKey> {
        self.session.map(|s| s.date)
    }

    /// Lifecycle counter; bumps on every `open`.
    pub fn generation(&self) -> u64 {
        self.session.map_or(self.generation, |s| s.generation)
    }

    pub fn presenter(&self) -> &ChartPresenter<Tz> {
        &self.presenter
    }

    async fn show(&mut self, date: DateKey) -> Result<Rendered, QueryError> {
        let result = self.query.query(date).await?;
        Ok(self.presenter.render(&self.container, &result))
    }
}
