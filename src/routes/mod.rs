//! Route gateway (EMBP): the only module that knows every subrouter.

use axum::Router;

use crate::HistoryQuery;

mod dashboard;
mod device;
mod health;

pub use dashboard::DashboardState;

// ---

/// Router for dashboard mode.
pub fn dashboard_router<Q: HistoryQuery>(state: DashboardState<Q>) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router::<Q>())
        .merge(health::router())
        .with_state(state)
}

/// Router for simulated-device mode.
pub fn device_router() -> Router {
    // ---
    Router::new()
        .merge(device::router())
        .merge(health::router())
}
