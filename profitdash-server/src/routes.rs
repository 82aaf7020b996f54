//! Router construction.

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, patch, post},
};
use profitdash::{ProfitdashError, config::ServerConfig};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::REQUEST_ID_HEADER, handlers, state::AppState};

/// Builds the application router.
///
/// # Errors
///
/// Returns [`ProfitdashError::Config`] if an allowed origin is not a valid
/// header value.
pub fn router(state: AppState, server: &ServerConfig) -> Result<Router, ProfitdashError> {
    let functions = Router::new()
        .route("/subscription-status", get(handlers::subscription_status))
        .route("/get-entitlements", get(handlers::get_entitlements))
        .route("/start-trial", post(handlers::start_trial))
        .route("/select-free-plan", post(handlers::select_free_plan))
        .route("/force-subscription-status", post(handlers::force_subscription_status))
        .route("/run-lifecycle-checks", post(handlers::run_lifecycle_checks));

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .nest("/functions", functions)
        .route("/stores", get(handlers::list_stores).post(handlers::connect_store))
        .route("/stores/{id}", delete(handlers::disconnect_store))
        .route("/campaigns", get(handlers::list_campaigns).post(handlers::track_campaign))
        .route("/campaigns/{id}", delete(handlers::untrack_campaign))
        .route("/notes", get(handlers::list_notes).post(handlers::create_note))
        .route("/notes/{id}", patch(handlers::update_note).delete(handlers::delete_note))
        .route("/dashboard/metrics", post(handlers::record_metric))
        .route("/dashboard/summary", get(handlers::profit_summary))
        .route("/account", delete(handlers::delete_account))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.allowed_origins)?)
        .with_state(state))
}

/// CORS for the configured origins; `*` allows any origin.
fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ProfitdashError> {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).map_err(|e| {
                    ProfitdashError::Config(format!("allowed origin {o:?} is invalid: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)]))
}
