//! Admin HTTP surface.

pub mod admin;
pub mod health;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/status", get(admin::status))
        .route("/incidents", get(admin::list_incidents))
        .route("/incidents/:id/acknowledge", post(admin::acknowledge_incident))
        .route("/incidents/:id/resolve", post(admin::resolve_incident))
        .route("/overrides", get(admin::list_overrides).post(admin::apply_override))
        .route("/overrides/:id/lift", post(admin::lift_override))
        .route("/audit", get(admin::audit_log))
        .route("/drill/fire", post(admin::fire_drill))
        .route("/originations/:partner_id", get(admin::origination_gate))
        .layer(cors)
        .with_state(state)
}
