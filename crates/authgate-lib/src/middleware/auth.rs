// ============================
// crates/authgate-lib/src/middleware/auth.rs
// ============================
//! Gateway middleware and the extractors built on it.
use super::cookies::{cookie_value, set_cookie, SameSite};
use crate::error::AppError;
use crate::gateway::{ClientHints, Decision, GatewayRequest};
use crate::routes::is_local_redirect;
use crate::AppState;
use authgate_common::Principal;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Header some proxies use to pass the original client address
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Cookie remembering where a challenged browser was headed
pub const RETURN_TO_COOKIE: &str = "AUTHGATE_RETURN_TO";

/// How long a remembered destination survives (5 minutes)
const RETURN_TO_MAX_AGE_SECS: u64 = 5 * 60;

const REQUESTED_WITH_HEADER: &str = "x-requested-with";

/// Run every request through the gateway
///
/// Forwarded requests carry the resolved [`Principal`] as a request extension.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = &state.settings.session.cookie_name;
    let decision = {
        let headers = request.headers();
        let tokens = session_tokens(headers, cookie_name);
        let gateway_request = GatewayRequest {
            path: request.uri().path(),
            session_tokens: &tokens,
            hints: ClientHints {
                accept: header_str(headers, header::ACCEPT.as_str()),
                requested_with: header_str(headers, REQUESTED_WITH_HEADER),
            },
        };
        state.gateway.evaluate(&gateway_request)
    };

    match decision {
        Decision::Forwarded(principal) => {
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        },
        Decision::Challenge { location } => {
            let mut response = (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            // Only a GET can be replayed by redirecting back to it.
            if request.method() == Method::GET {
                match return_to_cookie(&request, state.settings.session.secure_cookie) {
                    Ok(Some(cookie)) => {
                        response.headers_mut().append(header::SET_COOKIE, cookie);
                    },
                    Ok(None) => {},
                    Err(e) => tracing::warn!(error = %e, "could not remember challenged path"),
                }
            }
            response
        },
        Decision::Rejected => AppError::Unauthenticated.into_response(),
    }
}

fn return_to_cookie(request: &Request, secure: bool) -> Result<Option<HeaderValue>, AppError> {
    let Some(target) = request.uri().path_and_query().map(|pq| pq.as_str()) else {
        return Ok(None);
    };
    if !is_local_redirect(target) {
        return Ok(None);
    }
    let encoded = URL_SAFE_NO_PAD.encode(target);
    set_cookie(
        RETURN_TO_COOKIE,
        &encoded,
        Some(RETURN_TO_MAX_AGE_SECS),
        SameSite::Lax,
        secure,
    )
    .map(Some)
}

/// Destination remembered by the last challenge, if it is still a local path
pub fn return_to(headers: &HeaderMap) -> Option<String> {
    let encoded = cookie_value(headers, RETURN_TO_COOKIE)?;
    let decoded = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    let target = String::from_utf8(decoded).ok()?;
    is_local_redirect(&target).then_some(target)
}

/// Session tokens carried by a request, in the order they are tried
///
/// `Authorization: Bearer` comes before the session cookie; a bearer token
/// that no longer resolves does not hide a live cookie.
pub fn session_tokens<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Vec<&'a str> {
    bearer_token(headers)
        .into_iter()
        .chain(cookie_value(headers, cookie_name))
        .collect()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = header_str(headers, header::AUTHORIZATION.as_str())?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Principal attached by [`require_session`]
///
/// Rejects with 401 when the route was forwarded without a session.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Peer address and forwarding headers, for throttling
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr {
    pub peer: Option<IpAddr>,
    pub forwarded: Option<IpAddr>,
}

impl ClientAddr {
    /// Address to key throttling on
    pub fn ip(&self, trust_proxy_headers: bool) -> Option<IpAddr> {
        if trust_proxy_headers {
            self.forwarded.or(self.peer)
        } else {
            self.peer
        }
    }
}

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let forwarded = header_str(&parts.headers, REAL_IP_HEADER)
            .and_then(|value| value.trim().parse().ok());
        Ok(Self { peer, forwarded })
    }
}
