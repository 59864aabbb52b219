// ============================
// crates/authgate-lib/src/router.rs
// ============================
/** HTTP router for the gateway.
Every route, including the fallback, sits behind `require_session`, so an
unknown protected path is challenged before it can 404. */
use crate::{
    handlers::{login, pages, session},
    middleware::require_session,
    AppState,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Landing page
pub const HOME_PATH: &str = "/";
/// Liveness check
pub const HEALTH_PATH: &str = "/health";
/// Session introspection
pub const SESSION_PATH: &str = "/session";

/// Routes that are always mounted; configured paths may not reuse them
pub const FIXED_ROUTES: [&str; 3] = [HOME_PATH, HEALTH_PATH, SESSION_PATH];

/// Create the gateway router
pub fn create_router(state: Arc<AppState>) -> Router {
    let login_path = state.settings.login.path.clone();
    let logout_path = state.settings.login.logout_path.clone();

    Router::new()
        .route(HOME_PATH, get(pages::home))
        .route(HEALTH_PATH, get(pages::health_handler))
        .route(SESSION_PATH, get(session::session_info))
        .route(&login_path, get(login::login_page).post(login::login_submit))
        .route(&logout_path, post(login::logout))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
