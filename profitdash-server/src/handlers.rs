//! HTTP endpoint handlers.
//!
//! Handlers authenticate, parse, call the account service with the current
//! time, and serialize the result. Errors become [`ApiError`] responses.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use profitdash::{
    audit,
    connections::{ConnectStoreRequest, ConnectedStore, TrackCampaignRequest, TrackedCampaign},
    dashboard::{DailyMetric, ProfitSummary, RecordMetricRequest},
    notes::{NewNote, Note, NoteUpdate},
    security::{AuditEventType, Caller},
    service::ForceStateOutcome,
    subscription::{AccountStatus, Entitlements, ForceStateRequest, SweepReport},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, RequestId},
    error::ApiError,
    observability::{HealthReport, HealthStatus},
    state::AppState,
};

type ApiResult<T> = Result<T, ApiError>;

/// Query string of the summary endpoint.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// First day, inclusive.
    pub from: NaiveDate,
    /// Last day, inclusive.
    pub to: NaiveDate,
}

/// `GET /health`: 200 when the store answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = HealthReport::collect(&state).await;
    let status = if report.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report.to_json()))
}

/// `GET /functions/subscription-status`
pub async fn subscription_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<AccountStatus>> {
    Ok(Json(state.service.account_status(&caller.user_id, Utc::now()).await?))
}

/// `GET /functions/get-entitlements`
pub async fn get_entitlements(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Entitlements>> {
    Ok(Json(state.service.entitlements(&caller.user_id, Utc::now()).await?))
}

/// `POST /functions/start-trial`
pub async fn start_trial(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<AccountStatus>> {
    Ok(Json(state.service.start_trial(&caller.user_id, Utc::now()).await?))
}

/// `POST /functions/select-free-plan`
pub async fn select_free_plan(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<AccountStatus>> {
    Ok(Json(state.service.select_free_plan(&caller.user_id, Utc::now()).await?))
}

/// `POST /functions/force-subscription-status` (admin)
///
/// ```json
/// {"user_id": "user-42", "target_state": "suspended", "reason": "chargeback"}
/// ```
pub async fn force_subscription_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    RequestId(request_id): RequestId,
    payload: Result<Json<ForceStateRequest>, JsonRejection>,
) -> ApiResult<Json<ForceStateOutcome>> {
    // Non-admins get 403 whatever the body holds.
    require_admin(&caller, request_id)?;
    let Json(request) = payload?;
    Ok(Json(
        state.service.force_subscription_state(&caller, request, request_id, Utc::now()).await?,
    ))
}

/// `POST /functions/run-lifecycle-checks` (admin): runs one sweep now.
pub async fn run_lifecycle_checks(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    RequestId(request_id): RequestId,
) -> ApiResult<Json<SweepReport>> {
    require_admin(&caller, request_id)?;
    Ok(Json(state.service.run_lifecycle_sweep(Utc::now()).await?))
}

fn require_admin(caller: &Caller, request_id: Uuid) -> ApiResult<()> {
    caller.require_admin().map_err(|e| {
        audit!(
            AuditEventType::AccessDenied,
            caller.user_id.as_str(),
            request_id,
            with_error(e.to_string()),
        );
        ApiError::from(e)
    })
}

/// `GET /stores`
pub async fn list_stores(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Vec<ConnectedStore>>> {
    Ok(Json(state.service.list_stores(&caller.user_id).await?))
}

/// `POST /stores`
pub async fn connect_store(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<ConnectStoreRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ConnectedStore>)> {
    let Json(request) = payload?;
    let store = state.service.connect_store(&caller.user_id, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// `DELETE /stores/{id}`
pub async fn disconnect_store(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.service.disconnect_store(&caller.user_id, id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /campaigns`
pub async fn list_campaigns(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Vec<TrackedCampaign>>> {
    Ok(Json(state.service.list_campaigns(&caller.user_id).await?))
}

/// `POST /campaigns`
pub async fn track_campaign(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<TrackCampaignRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TrackedCampaign>)> {
    let Json(request) = payload?;
    let campaign = state.service.track_campaign(&caller.user_id, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `DELETE /campaigns/{id}`
pub async fn untrack_campaign(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.service.untrack_campaign(&caller.user_id, id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /notes`
pub async fn list_notes(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(state.service.list_notes(&caller.user_id).await?))
}

/// `POST /notes`
pub async fn create_note(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<NewNote>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    let Json(input) = payload?;
    let note = state.service.create_note(&caller.user_id, input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// `PATCH /notes/{id}`
pub async fn update_note(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NoteUpdate>, JsonRejection>,
) -> ApiResult<Json<Note>> {
    let Path(id) = id?;
    let Json(update) = payload?;
    Ok(Json(state.service.update_note(&caller.user_id, id, update, Utc::now()).await?))
}

/// `DELETE /notes/{id}`
pub async fn delete_note(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.service.delete_note(&caller.user_id, id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /dashboard/metrics`
///
/// Money values are decimal strings: `{"date": "2025-03-01", "revenue": "120.50"}`.
pub async fn record_metric(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<RecordMetricRequest>, JsonRejection>,
) -> ApiResult<Json<DailyMetric>> {
    let Json(request) = payload?;
    Ok(Json(state.service.record_metric(&caller.user_id, request, Utc::now()).await?))
}

/// `GET /dashboard/summary?from=YYYY-MM-DD&to=YYYY-MM-DD`
pub async fn profit_summary(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> ApiResult<Json<ProfitSummary>> {
    let Query(range) = query?;
    Ok(Json(state.service.profit_summary(&caller.user_id, range.from, range.to).await?))
}

/// `DELETE /account`
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    RequestId(request_id): RequestId,
) -> ApiResult<StatusCode> {
    state.service.delete_account(&caller.user_id, request_id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}
