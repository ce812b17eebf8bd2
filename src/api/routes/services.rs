//! Service metric endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::StatisticsResponse,
};
use crate::storage::StatisticsQuery;

/// Default number of points returned per request
const DEFAULT_POINT_LIMIT: usize = 500;

/// Upper bound for the `limit` parameter
const MAX_POINT_LIMIT: usize = 10_000;

/// Query parameters for metric history
#[derive(Debug, Deserialize)]
pub struct StatisticsParams {
    /// Descriptor name such as `cpu_user`
    descriptor: Option<String>,
    /// Unix second lower bound
    since: Option<i64>,
    limit: Option<usize>,
}

/// GET /api/v1/services/:id/statistics
///
/// Metric points of one service, newest first
pub async fn get_service_statistics(
    State(state): State<ApiState>,
    Path(service_id): Path<i64>,
    Query(params): Query<StatisticsParams>,
) -> ApiResult<Json<StatisticsResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_POINT_LIMIT);
    if limit == 0 || limit > MAX_POINT_LIMIT {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_POINT_LIMIT}"
        )));
    }

    let query = StatisticsQuery {
        descriptor: params.descriptor,
        since: params.since,
        limit,
    };
    let points = state.storage.service_statistics(service_id, query).await?;
    let count = points.len();

    Ok(Json(StatisticsResponse {
        service_id,
        points,
        count,
    }))
}
