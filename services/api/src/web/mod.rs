pub mod middleware;
pub mod rest;
pub mod state;

use crate::config::ConfigError;
use crate::error::ApiError;
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use rest::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::{require_identity, Identity};

/// Builds the complete web application: API routes, CORS and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = HeaderValue::from_str(&app_state.config.cors_allowed_origin).map_err(|e| {
        ConfigError::InvalidValue("CORS_ALLOWED_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(middleware::USER_ID_HEADER),
            HeaderName::from_static(middleware::USER_NAME_HEADER),
            HeaderName::from_static(middleware::USER_ROLE_HEADER),
        ]);

    // Public routes (no identity required)
    let public_routes = Router::new().route("/health", get(rest::health_handler));

    // Protected routes (identity required)
    let protected_routes = Router::new()
        .route(
            "/doubts",
            get(rest::list_doubts_handler).post(rest::create_doubt_handler),
        )
        .route("/doubts/{id}", get(rest::get_doubt_handler))
        .route("/doubts/{id}/action", post(rest::doubt_action_handler))
        .route("/doubts/{id}/replies", post(rest::submit_reply_handler))
        .route("/professor/doubts", get(rest::professor_queue_handler))
        .route(
            "/professor/insights/{course_id}",
            get(rest::confusion_insights_handler),
        )
        .route(
            "/analytics/{course_id}",
            get(rest::course_analytics_handler),
        )
        .layer(axum_middleware::from_fn(require_identity));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
