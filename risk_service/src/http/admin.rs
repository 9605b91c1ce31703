//! Admin handlers.
//!
//! Authenticated by a bearer secret plus an `x-operator` header recorded
//! in audit. Unauthenticated calls fail 403 with no state change;
//! validation failures are 400 and never write audit (the engine
//! validates before journaling).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use risk_breaker::{BreakerError, IncidentStatus, OverrideRequest, Trigger};

use crate::state::AppState;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: "forbidden".to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<BreakerError> for ApiError {
    fn from(e: BreakerError) -> Self {
        let status = match &e {
            // Enforcement hides internals.
            BreakerError::Forbidden => return ApiError::forbidden(),
            BreakerError::TriggerUnknown { .. }
            | BreakerError::OverrideExpiryOutOfRange { .. } => StatusCode::BAD_REQUEST,
            BreakerError::IncidentNotFound { .. } | BreakerError::OverrideNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            BreakerError::InvalidIncidentState | BreakerError::OverrideAlreadyLifted => {
                StatusCode::CONFLICT
            }
            BreakerError::AuditWriteFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

/// Bearer-secret check; returns the audited operator identity.
fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<String, ApiError> {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.admin_token.as_str());
    if !authorized {
        return Err(ApiError::forbidden());
    }

    Ok(headers
        .get("x-operator")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unidentified-operator")
        .to_string())
}

// ----------------------------------------------------------------------
// Read surface
// ----------------------------------------------------------------------

pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&headers, &state)?;

    let breaker = state.breaker.read().await;
    let enforcement = breaker.enforcement_state();
    let open = count_status(&breaker, IncidentStatus::Open);
    let acknowledged = count_status(&breaker, IncidentStatus::Acknowledged);
    let active_overrides = breaker
        .overrides()
        .iter()
        .filter(|o| o.is_active(enforcement.evaluated_at))
        .count();
    let pool = state.pool.read().await;

    Ok(Json(json!({
        "enforcement": enforcement,
        "incidents": { "open": open, "acknowledged": acknowledged },
        "overridesActive": active_overrides,
        "pool": pool.stats(),
    })))
}

fn count_status(
    breaker: &risk_breaker::BreakerEngine<risk_breaker::MemoryAudit, risk_breaker::SystemClock>,
    status: IncidentStatus,
) -> usize {
    breaker
        .incidents()
        .iter()
        .filter(|i| i.status == status)
        .count()
}

pub async fn list_incidents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&headers, &state)?;
    let breaker = state.breaker.read().await;
    let incidents: Vec<_> = breaker
        .incidents()
        .iter()
        .filter(|i| i.status != IncidentStatus::Resolved)
        .cloned()
        .collect();
    Ok(Json(json!({ "incidents": incidents })))
}

pub async fn list_overrides(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&headers, &state)?;
    let breaker = state.breaker.read().await;
    Ok(Json(json!({ "overrides": breaker.overrides() })))
}

pub async fn audit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&headers, &state)?;
    let breaker = state.breaker.read().await;
    Ok(Json(json!({ "entries": breaker.audit().entries() })))
}

/// The origination gate, exposed for the origination service.
pub async fn origination_gate(
    State(state): State<AppState>,
    Path(partner_id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let breaker = state.breaker.read().await;
    breaker.assert_origination_allowed(partner_id)?;
    Ok(Json(json!({ "partnerId": partner_id, "allowed": true })))
}

// ----------------------------------------------------------------------
// Incident lifecycle
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    pub note: String,
}

pub async fn acknowledge_incident(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let operator = authenticate(&headers, &state)?;
    let mut breaker = state.breaker.write().await;
    breaker.acknowledge_incident(id, &operator)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resolve_incident(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Option<Json<ResolveBody>>,
) -> Result<StatusCode, ApiError> {
    let operator = authenticate(&headers, &state)?;
    let note = body.map(|Json(b)| b.note).unwrap_or_default();
    let mut breaker = state.breaker.write().await;
    breaker.resolve_incident(id, &operator, &note)?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Overrides
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBody {
    pub trigger: String,
    pub partner_id: Option<u64>,
    pub reason: String,
    pub expires_in_minutes: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideCreated {
    pub id: u64,
}

pub async fn apply_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OverrideBody>,
) -> Result<Json<OverrideCreated>, ApiError> {
    let operator = authenticate(&headers, &state)?;
    let trigger = Trigger::from_key(&body.trigger)
        .ok_or_else(|| ApiError::bad_request(format!("unknown trigger key: {}", body.trigger)))?;
    if body.reason.trim().is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }

    let mut breaker = state.breaker.write().await;
    let id = breaker.apply_override(OverrideRequest {
        trigger,
        partner_id: body.partner_id,
        reason: body.reason,
        operator,
        expires_in_minutes: body.expires_in_minutes,
    })?;
    Ok(Json(OverrideCreated { id }))
}

pub async fn lift_override(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let operator = authenticate(&headers, &state)?;
    let mut breaker = state.breaker.write().await;
    breaker.lift_override(id, &operator)?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Governance drill
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DrillBody {
    pub trigger: String,
}

pub async fn fire_drill(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DrillBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authenticate(&headers, &state)?;
    let trigger = Trigger::from_key(&body.trigger)
        .ok_or_else(|| ApiError::bad_request(format!("unknown trigger key: {}", body.trigger)))?;

    let mut breaker = state.breaker.write().await;
    let alert = breaker.fire_drill_trigger(trigger, &operator)?;
    Ok(Json(json!({ "alert": alert })))
}
