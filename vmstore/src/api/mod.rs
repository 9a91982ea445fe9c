use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::access::AccessPolicy;
use crate::error::Error;

pub mod dto;
pub mod favorite_handlers;
pub mod role_handlers;
pub mod template_handlers;
pub mod user_handlers;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub policy: Arc<AccessPolicy>,
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status.
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

impl From<Error> for ApiErr {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Self(StatusCode::BAD_REQUEST, msg),
            Error::Collision(c) => Self(StatusCode::CONFLICT, c.to_string()),
            Error::NotFound(_) => Self(StatusCode::NOT_FOUND, err.to_string()),
            Error::Forbidden(msg) => Self(StatusCode::FORBIDDEN, msg),
            Error::Db(e) => {
                tracing::error!("database error: {e}");
                Self(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                )
            }
        }
    }
}

// ---------- router ----------

pub fn app_router(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = std::env::var("EVS_CORS_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1() -> Router<AppState> {
    Router::new()
        // templates
        .route(
            "/app-templates",
            get(template_handlers::list_templates).post(template_handlers::create_template),
        )
        .route(
            "/app-templates/{id}",
            get(template_handlers::get_template)
                .put(template_handlers::update_template)
                .delete(template_handlers::delete_template),
        )
        .route(
            "/app-templates/{id}/approve",
            patch(template_handlers::approve_template),
        )
        .route(
            "/app-templates/{id}/reject",
            patch(template_handlers::reject_template),
        )
        .route(
            "/app-templates/name/{name}/collisions",
            get(template_handlers::check_collisions),
        )
        // favorites
        .route(
            "/favorites",
            get(favorite_handlers::list_favorites).post(favorite_handlers::add_favorite),
        )
        .route(
            "/favorites/{template_id}",
            delete(favorite_handlers::remove_favorite),
        )
        // users
        .route("/users", get(user_handlers::list_users))
        .route(
            "/users/{id}",
            get(user_handlers::get_user).delete(user_handlers::delete_user),
        )
        .route("/users/{id}/role", patch(user_handlers::set_user_role))
        // roles
        .route(
            "/roles",
            get(role_handlers::list_roles).post(role_handlers::create_role),
        )
        .route(
            "/roles/{id}",
            get(role_handlers::get_role)
                .put(role_handlers::update_role)
                .delete(role_handlers::delete_role),
        )
}
