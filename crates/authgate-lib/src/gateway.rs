// ============================
// authgate-lib/src/gateway.rs
// ============================
/** Per-request authorization decision.
Every request moves through `RECEIVED -> CLASSIFIED` and ends in exactly one
terminal state: forwarded to its handler, challenged with a redirect to the
login page, or rejected with 401. The gateway is built once at startup and
shared read-only; the session store is the only mutable state it touches. */
use crate::auth::{Clock, SessionStore, SystemClock};
use crate::error::AppError;
use crate::metrics::GATEWAY_DECISION;
use crate::routes::{RouteClassifier, RouteRule};
use authgate_common::{AccessPolicy, Principal};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How unauthenticated access to a protected route is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengePolicy {
    /// Redirect browsers, reject API clients
    Negotiate,
    /// Always redirect to the login page
    Redirect,
    /// Always answer 401
    Reject,
}

/// What kind of client sent the request, as far as the gateway can tell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Browser,
    Api,
}

/// Request headers the negotiation looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientHints<'a> {
    pub accept: Option<&'a str>,
    pub requested_with: Option<&'a str>,
}

impl ClientHints<'_> {
    /// Classify the client from its headers
    ///
    /// XHR requests and requests whose `Accept` admits neither `text/html`
    /// nor `*/*` are API clients. No `Accept` at all means a browser.
    pub fn client_kind(&self) -> ClientKind {
        if self
            .requested_with
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        {
            return ClientKind::Api;
        }

        match self.accept {
            None => ClientKind::Browser,
            Some(accept) => {
                let admits_html = accept.split(',').any(|range| {
                    let media = range.split(';').next().unwrap_or("").trim();
                    media.eq_ignore_ascii_case("text/html")
                        || media.eq_ignore_ascii_case("application/xhtml+xml")
                        || media == "*/*"
                });
                if admits_html {
                    ClientKind::Browser
                } else {
                    ClientKind::Api
                }
            },
        }
    }
}

/// The slice of a request the gateway decides on
#[derive(Debug, Clone, Copy)]
pub struct GatewayRequest<'a> {
    pub path: &'a str,
    /// Carried session tokens in precedence order; the first live one wins
    pub session_tokens: &'a [&'a str],
    pub hints: ClientHints<'a>,
}

/// Intermediate state after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub access: AccessPolicy,
}

/// Terminal gateway state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through; the principal is attached when a session resolved
    Forwarded(Option<Principal>),
    /// Redirect to the login entry point
    Challenge { location: String },
    /// Answer 401
    Rejected,
}

impl Decision {
    fn label(&self) -> &'static str {
        match self {
            Decision::Forwarded(_) => "forwarded",
            Decision::Challenge { .. } => "challenge",
            Decision::Rejected => "rejected",
        }
    }
}

/// Composes route classification and session resolution
pub struct AuthGateway {
    classifier: RouteClassifier,
    sessions: SessionStore,
    clock: Arc<dyn Clock>,
    challenge: ChallengePolicy,
    login_path: String,
}

impl AuthGateway {
    pub fn builder(sessions: SessionStore) -> GatewayBuilder {
        GatewayBuilder::new(sessions)
    }

    /// `RECEIVED -> CLASSIFIED`
    pub fn classify(&self, request: &GatewayRequest<'_>) -> Classified {
        Classified {
            access: self.classifier.classify(request.path),
        }
    }

    /// Run a request to its terminal state
    pub fn evaluate(&self, request: &GatewayRequest<'_>) -> Decision {
        let classified = self.classify(request);
        let now = self.clock.now();
        let principal = request
            .session_tokens
            .iter()
            .find_map(|token| self.sessions.resolve(token, now));

        let decision = match (classified.access, principal) {
            (_, Some(principal)) => Decision::Forwarded(Some(principal)),
            (AccessPolicy::Public, None) => Decision::Forwarded(None),
            (AccessPolicy::Authenticated, None) => match self.client_kind(&request.hints) {
                ClientKind::Browser => Decision::Challenge {
                    location: self.login_path.clone(),
                },
                ClientKind::Api => Decision::Rejected,
            },
        };

        tracing::debug!(
            path = %request.path,
            access = %classified.access,
            decision = decision.label(),
            "gateway decision"
        );
        counter!(GATEWAY_DECISION, "outcome" => decision.label()).increment(1);

        decision
    }

    /// Client kind under the configured challenge policy
    pub fn client_kind(&self, hints: &ClientHints<'_>) -> ClientKind {
        match self.challenge {
            ChallengePolicy::Negotiate => hints.client_kind(),
            ChallengePolicy::Redirect => ClientKind::Browser,
            ChallengePolicy::Reject => ClientKind::Api,
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn challenge_policy(&self) -> ChallengePolicy {
        self.challenge
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Explicit assembly of an [`AuthGateway`]
pub struct GatewayBuilder {
    sessions: SessionStore,
    rules: Vec<RouteRule>,
    clock: Arc<dyn Clock>,
    challenge: ChallengePolicy,
    login_path: String,
}

impl GatewayBuilder {
    pub fn new(sessions: SessionStore) -> Self {
        Self {
            sessions,
            rules: Vec::new(),
            clock: Arc::new(SystemClock),
            challenge: ChallengePolicy::Negotiate,
            login_path: "/login".to_string(),
        }
    }

    /// Append a rule after the ones already added
    pub fn rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = RouteRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn challenge(mut self, challenge: ChallengePolicy) -> Self {
        self.challenge = challenge;
        self
    }

    pub fn login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Compile the rules and build the gateway
    ///
    /// The login path is always public and is checked before any configured rule.
    pub fn build(self) -> Result<AuthGateway, AppError> {
        if !self.login_path.starts_with('/') || self.login_path.contains(['*', '?']) {
            return Err(AppError::Configuration(format!(
                "login path `{}` must be a literal path starting with `/`",
                self.login_path
            )));
        }

        let mut rules = Vec::with_capacity(self.rules.len() + 1);
        rules.push(RouteRule::new(self.login_path.clone(), AccessPolicy::Public));
        rules.extend(self.rules);

        Ok(AuthGateway {
            classifier: RouteClassifier::new(rules)?,
            sessions: self.sessions,
            clock: self.clock,
            challenge: self.challenge,
            login_path: self.login_path,
        })
    }
}
