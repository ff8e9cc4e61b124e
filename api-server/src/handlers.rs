use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use shared::messages::{
    ClearHistoryResponse, HealthResponse, HistoryResponse, MessageResponse, RunningSharesResponse,
    ShareAccepted, ShareRequest, ShareResponse, ShareView, StatsResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::AppState;
use crate::validate::validate_share;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::InvalidId)
}

/// POST /api/share
///
/// Validates, records the share and returns its id. The token lookup and
/// the share loop start only once the id is in hand and run in the
/// background; poll `GET /api/share/{id}`.
pub async fn create_share(
    State(state): State<AppState>,
    body: Result<Json<ShareRequest>, JsonRejection>,
) -> Result<Json<ShareAccepted>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let submit = validate_share(request, state.max_limit)?;
    let limit = submit.limit;

    let pending = state.manager.submit(submit).await?;
    let accepted = ShareAccepted {
        status: true,
        message: "Share process started".to_string(),
        share_id: pending.id(),
        timestamp: Utc::now(),
    };

    let share_id = pending.start();
    info!(share_id = %share_id, limit, "Share process started");
    Ok(Json(accepted))
}

/// GET /api/share/{id} and GET /api/share/{id}/progress
pub async fn get_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, ApiError> {
    let share_id = parse_id(&id)?;
    let task = state
        .manager
        .ledger()
        .query(share_id)
        .await
        .ok_or(ApiError::ShareNotFound)?;

    Ok(Json(ShareResponse {
        status: true,
        share: ShareView::from(&task),
    }))
}

/// POST /api/share/{id}/cancel
pub async fn cancel_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let share_id = parse_id(&id)?;
    state.manager.cancel(share_id).await?;

    Ok(Json(MessageResponse {
        status: true,
        message: "Cancellation requested".to_string(),
    }))
}

/// GET /api/history?limit=N
pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let ledger = state.manager.ledger();
    let limit = params
        .limit
        .unwrap_or(state.default_history)
        .clamp(1, ledger.capacity());

    let history = ledger
        .list(limit)
        .await
        .iter()
        .map(ShareView::from)
        .collect();

    Ok(Json(HistoryResponse {
        status: true,
        history,
    }))
}

/// GET /api/running-shares
pub async fn running_shares(State(state): State<AppState>) -> Json<RunningSharesResponse> {
    let running_shares = state
        .manager
        .ledger()
        .list_active()
        .await
        .iter()
        .map(ShareView::from)
        .collect();

    Json(RunningSharesResponse {
        status: true,
        running_shares,
    })
}

/// POST /api/clear-history
pub async fn clear_history(State(state): State<AppState>) -> Json<ClearHistoryResponse> {
    let cleared = state.manager.clear_history().await;

    Json(ClearHistoryResponse {
        status: true,
        message: "History cleared".to_string(),
        cleared,
    })
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        status: true,
        stats: state.manager.ledger().stats().await,
    })
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_shares = state.manager.ledger().list_active().await.len();

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_shares,
    })
}
