//! Host endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{EventsResponse, HostDetailResponse, HostsResponse, ServicesResponse},
};

use super::events::event_limit;

/// Query parameters for event history
#[derive(Debug, Deserialize)]
pub struct HostEventParams {
    limit: Option<usize>,
}

/// GET /api/v1/hosts
pub async fn list_hosts(State(state): State<ApiState>) -> ApiResult<Json<HostsResponse>> {
    let hosts = state.storage.list_hosts().await?;
    let count = hosts.len();

    Ok(Json(HostsResponse { hosts, count }))
}

/// GET /api/v1/hosts/:id
///
/// The host row together with its service groups
pub async fn get_host(
    State(state): State<ApiState>,
    Path(host_id): Path<i64>,
) -> ApiResult<Json<HostDetailResponse>> {
    let host = state
        .storage
        .find_host(host_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Host '{host_id}' not found")))?;
    let groups = state.storage.group_members(host_id).await?;

    Ok(Json(HostDetailResponse { host, groups }))
}

/// GET /api/v1/hosts/:id/services
pub async fn get_host_services(
    State(state): State<ApiState>,
    Path(host_id): Path<i64>,
) -> ApiResult<Json<ServicesResponse>> {
    ensure_host(&state, host_id).await?;

    let services = state.storage.host_services(host_id).await?;
    let count = services.len();

    Ok(Json(ServicesResponse {
        host_id,
        services,
        count,
    }))
}

/// GET /api/v1/hosts/:id/events?limit=N
pub async fn get_host_events(
    State(state): State<ApiState>,
    Path(host_id): Path<i64>,
    Query(params): Query<HostEventParams>,
) -> ApiResult<Json<EventsResponse>> {
    let limit = event_limit(params.limit)?;

    ensure_host(&state, host_id).await?;

    let events = state.storage.host_events(host_id, limit).await?;
    let count = events.len();

    Ok(Json(EventsResponse {
        host_id,
        events,
        count,
    }))
}

async fn ensure_host(state: &ApiState, host_id: i64) -> ApiResult<()> {
    match state.storage.find_host(host_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("Host '{host_id}' not found"))),
    }
}
