//! Report submission endpoint used by the agents

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
};
use tracing::debug;

use crate::api::{error::ApiResult, state::ApiState};

/// POST /collector
///
/// The body is the agent's XML status report. Answers a plain `OK` once the
/// report is committed.
pub async fn submit_report(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> ApiResult<&'static str> {
    debug!(%peer, bytes = body.len(), "report received");

    state.ingestor.submit(&body, peer.ip()).await?;

    Ok("OK")
}
