//! # murmur_api
//!
//! HTTP API library for Murmur.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use murmur_core::content::ContentStore;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, likes, posts};
use crate::services::auth::AuthServices;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Verification, revocation and reconciliation services.
    pub auth: AuthServices,
    /// Posts and likes.
    pub content: Arc<dyn ContentStore>,
}

impl AppState {
    pub fn new(config: ApiConfig, auth: AuthServices, content: Arc<dyn ContentStore>) -> Self {
        Self {
            config,
            auth,
            content,
        }
    }
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    murmur_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (guard runs inside the handler, if at all)
    let public = Router::new()
        .route(routes::GET_API_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_VERIFY_TOKEN, post(auth::verify_token_handler))
        .route(routes::GET_AUTH_CHECK, get(auth::check_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_AUTH_CHECK_TOKEN, post(auth::check_token_handler))
        .route(
            routes::POST_AUTH_FIREBASE_LOGIN,
            post(auth::firebase_login_handler),
        )
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler));

    // Personalised reads (anonymous on failure)
    let optional = Router::new()
        .route(routes::GET_POST_LIKE, get(likes::get_like_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::POST_POST_LIKE, post(likes::set_like_handler))
        .route(routes::DELETE_POST, delete(posts::delete_post_handler))
        .route(routes::POST_POST_RESTORE, post(posts::restore_post_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
