// ============================
// crates/authgate-lib/src/handlers/login.rs
// ============================
//! Form login and logout.
use crate::config::SessionSettings;
use crate::error::AppError;
use crate::middleware::auth::RETURN_TO_COOKIE;
use crate::middleware::cookies::{clear_cookie, cookie_value, set_cookie, SameSite};
use crate::middleware::csrf::{self, CsrfForm, CsrfToken, CSRF_FIELD};
use crate::middleware::{return_to, session_tokens, ClientAddr};
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Submitted login form
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(rename = "_csrf", default)]
    pub csrf: Option<String>,
}

/// Flags shown on the login page
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub logout: Option<String>,
}

/// `GET /login`
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let csrf = csrf::issue(&headers, state.settings.session.secure_cookie)?;
    let page = render_login_form(
        &state.settings.login.path,
        &csrf.token,
        query.error.is_some(),
        query.logout.is_some(),
    );
    Ok(with_cookies(csrf_cookie(&csrf), Html(page)))
}

/// `POST /login`
///
/// Success sets the session cookie and redirects; failure re-renders the
/// form with a generic error and 401.
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    client: ClientAddr,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    csrf::verify(&headers, form.csrf.as_deref())?;

    let ip = client.ip(state.settings.rate_limit.trust_proxy_headers);
    if let Some(ip) = ip {
        if !state.auth_rate_limiter.check_rate_limit(ip) {
            tracing::warn!(%ip, "login attempt while locked out");
            return Err(AppError::AuthRateLimited);
        }
    }

    let LoginForm {
        username, password, ..
    } = form;
    let password = Zeroizing::new(password);
    let secure = state.settings.session.secure_cookie;

    match state.login.attempt_login(&username, password).await {
        Ok(success) => {
            if let Some(ip) = ip {
                state.auth_rate_limiter.record_success(ip);
            }

            // Never keep a session id that existed before authentication.
            if let Some(previous) = cookie_value(&headers, &state.settings.session.cookie_name) {
                state.sessions.revoke(previous);
            }

            let target = return_to(&headers)
                .unwrap_or_else(|| state.settings.login.success_redirect.clone());

            let mut cookies = vec![
                session_cookie(
                    &state.settings.session,
                    &success.token,
                    state.login.session_ttl().as_secs(),
                )?,
                clear_cookie(RETURN_TO_COOKIE, SameSite::Lax, secure)?,
            ];
            // A new session gets a new form token.
            cookies.extend(csrf::rotate(secure)?.set_cookie);

            Ok(with_cookies(cookies, Redirect::to(&target)))
        },
        Err(_) => {
            if let Some(ip) = ip {
                state.auth_rate_limiter.record_failed_attempt(ip);
            }
            let csrf = csrf::issue(&headers, secure)?;
            let page = render_login_form(&state.settings.login.path, &csrf.token, true, false);
            Ok(with_cookies(
                csrf_cookie(&csrf),
                (StatusCode::UNAUTHORIZED, Html(page)),
            ))
        },
    }
}

/// `POST /logout`
///
/// Revokes whatever session the client carries; safe to repeat.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<CsrfForm>, FormRejection>,
) -> Result<Response, AppError> {
    let submitted = form.ok().and_then(|Form(form)| form.csrf);
    csrf::verify(&headers, submitted.as_deref())?;

    for token in session_tokens(&headers, &state.settings.session.cookie_name) {
        state.sessions.revoke(token);
    }

    let cookie = session_cookie(&state.settings.session, "", 0)?;
    let location = format!("{}?logout", state.settings.login.path);
    Ok(with_cookies(vec![cookie], Redirect::to(&location)))
}

/// `Set-Cookie` value for the session carrier
pub fn session_cookie(
    settings: &SessionSettings,
    token: &str,
    max_age_secs: u64,
) -> Result<HeaderValue, AppError> {
    set_cookie(
        &settings.cookie_name,
        token,
        Some(max_age_secs),
        SameSite::Lax,
        settings.secure_cookie,
    )
}

/// Cookie to set for a freshly minted form token
pub(crate) fn csrf_cookie(csrf: &CsrfToken) -> Vec<HeaderValue> {
    csrf.set_cookie.iter().cloned().collect()
}

/// Attach every cookie as its own `Set-Cookie` header
pub(crate) fn with_cookies(cookies: Vec<HeaderValue>, response: impl IntoResponse) -> Response {
    let headers: Vec<(HeaderName, HeaderValue)> = cookies
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie))
        .collect();
    (AppendHeaders(headers), response).into_response()
}

fn render_login_form(action: &str, csrf_token: &str, failed: bool, logged_out: bool) -> String {
    let notice = if failed {
        r#"<p class="error">Invalid username or password.</p>"#
    } else if logged_out {
        r#"<p class="notice">You have been signed out.</p>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
{notice}
<form method="post" action="{action}">
<input type="hidden" name="{CSRF_FIELD}" value="{csrf_token}">
<label>Username <input type="text" name="username" autocomplete="username" required autofocus></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let mut settings = SessionSettings::default();
        let cookie = session_cookie(&settings, "abc", 1800).unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with("SESSION=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=1800"));
        assert!(!cookie.contains("Secure"));

        settings.secure_cookie = true;
        let cookie = session_cookie(&settings, "abc", 1800).unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_login_form_notices() {
        let plain = render_login_form("/login", "tok", false, false);
        assert!(plain.contains(r#"action="/login""#));
        assert!(plain.contains(r#"name="_csrf" value="tok""#));
        assert!(!plain.contains("Invalid username"));

        assert!(render_login_form("/login", "tok", true, false).contains("Invalid username or password"));
        assert!(render_login_form("/login", "tok", false, true).contains("signed out"));
    }

    #[tokio::test]
    async fn test_with_cookies_appends() {
        let cookies = vec![
            HeaderValue::from_static("a=1"),
            HeaderValue::from_static("b=2"),
        ];
        let response = with_cookies(cookies, StatusCode::NO_CONTENT);

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
