//! Event listing and fleet overview

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{DashboardResponse, EventListResponse},
};
use crate::storage::EventQuery;

/// Default number of events returned per request
pub(super) const DEFAULT_EVENT_LIMIT: usize = 100;

/// Upper bound for the `limit` parameter
pub(super) const MAX_EVENT_LIMIT: usize = 1000;

/// Events shown on the dashboard
const RECENT_EVENTS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct EventListParams {
    hostid: Option<i64>,
    active: Option<bool>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// Validate an optional `limit` parameter
pub(super) fn event_limit(limit: Option<usize>) -> ApiResult<usize> {
    match limit.unwrap_or(DEFAULT_EVENT_LIMIT) {
        limit @ 1..=MAX_EVENT_LIMIT => Ok(limit),
        _ => Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_EVENT_LIMIT}"
        ))),
    }
}

/// GET /api/v1/events?hostid=N&active=true&limit=N&offset=N
///
/// An unknown `hostid` yields an empty list, not a 404.
pub async fn list_events(
    State(state): State<ApiState>,
    Query(params): Query<EventListParams>,
) -> ApiResult<Json<EventListResponse>> {
    let limit = event_limit(params.limit)?;
    let offset = params.offset.unwrap_or(0);

    let events = state
        .storage
        .list_events(EventQuery {
            host_id: params.hostid,
            active_only: params.active.unwrap_or(false),
            limit,
            offset,
        })
        .await?;
    let count = events.len();

    Ok(Json(EventListResponse {
        events,
        count,
        limit,
        offset,
    }))
}

/// GET /api/v1/dashboard
pub async fn dashboard(State(state): State<ApiState>) -> ApiResult<Json<DashboardResponse>> {
    let summary = state.storage.dashboard().await?;
    let recent_events = state
        .storage
        .list_events(EventQuery {
            active_only: true,
            limit: RECENT_EVENTS,
            ..Default::default()
        })
        .await?;

    Ok(Json(DashboardResponse {
        timestamp: Utc::now().to_rfc3339(),
        summary,
        recent_events,
    }))
}
