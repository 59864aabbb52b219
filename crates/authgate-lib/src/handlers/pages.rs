//! Landing, health and fallback pages.
use super::login::{csrf_cookie, with_cookies};
use crate::error::AppError;
use crate::middleware::csrf::{self, CSRF_FIELD};
use crate::middleware::CurrentPrincipal;
use crate::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::{Html, Response},
};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_handler() -> &'static str {
    "Healthy"
}

/// Protected landing page
pub async fn home(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let csrf = csrf::issue(&headers, state.settings.session.secure_cookie)?;
    let page = format!(
        "<!DOCTYPE html>\n<html><body><h1>Welcome, {}</h1>\
         <form method=\"post\" action=\"{}\">\
         <input type=\"hidden\" name=\"{}\" value=\"{}\">\
         <button type=\"submit\">Sign out</button></form>\
         </body></html>\n",
        escape_html(&principal.display_name),
        state.settings.login.logout_path,
        CSRF_FIELD,
        csrf.token
    );
    Ok(with_cookies(csrf_cookie(&csrf), Html(page)))
}

/// Anything the gateway admitted but nothing serves
///
/// Includes the `/oauth/` prefix, which is reserved but not implemented.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
