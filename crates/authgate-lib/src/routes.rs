// ============================
// authgate-lib/src/routes.rs
// ============================
//! Per-path access classification.
//!
//! Rules are Ant-style path patterns checked in order; the first match
//! decides. Pattern syntax:
//!
//! - `**` as a whole segment matches zero or more segments
//! - `*` matches any run of characters within one segment
//! - `?` matches exactly one character other than `/`
//!
//! A path that matches nothing, or that contains `.`/`..` segments, is
//! [`AccessPolicy::Authenticated`].
use crate::error::AppError;
use authgate_common::AccessPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A configured pattern and the access it grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub pattern: String,
    pub access: AccessPolicy,
}

impl RouteRule {
    pub fn new(pattern: impl Into<String>, access: AccessPolicy) -> Self {
        Self {
            pattern: pattern.into(),
            access,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: RouteRule,
    matcher: Regex,
}

/// Ordered, compiled rule set
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<CompiledRule>,
}

impl RouteClassifier {
    /// Compile `rules`; any malformed pattern is a configuration error
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, AppError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let matcher = compile_pattern(&rule.pattern)?;
                Ok(CompiledRule { rule, matcher })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(Self { rules })
    }

    /// Access policy for `path`
    pub fn classify(&self, path: &str) -> AccessPolicy {
        if has_dot_segments(path) {
            tracing::debug!(%path, "dot segment in path, requiring authentication");
            return AccessPolicy::Authenticated;
        }

        self.rules
            .iter()
            .find(|compiled| compiled.matcher.is_match(path))
            .map(|compiled| compiled.rule.access)
            .unwrap_or(AccessPolicy::Authenticated)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = &RouteRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }
}

/// Whether `target` is a path on this server, safe to redirect to
///
/// Rejects protocol-relative (`//host`) and backslash (`/\\host`) forms that
/// browsers resolve off-site.
pub fn is_local_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !target.chars().any(|c| c.is_control())
}

fn has_dot_segments(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

fn compile_pattern(pattern: &str) -> Result<Regex, AppError> {
    let Some(rest) = pattern.strip_prefix('/') else {
        return Err(AppError::Configuration(format!(
            "route pattern `{pattern}` must start with `/`"
        )));
    };

    let mut re = String::from("^");
    for segment in rest.split('/') {
        if segment == "**" {
            re.push_str("(?:/.*)?");
            continue;
        }
        if segment.contains("**") {
            return Err(AppError::Configuration(format!(
                "route pattern `{pattern}`: `**` must be a whole segment"
            )));
        }

        re.push('/');
        for ch in segment.chars() {
            match ch {
                '*' => re.push_str("[^/]*"),
                '?' => re.push_str("[^/]"),
                c => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
            }
        }
    }
    re.push('$');

    Regex::new(&re)
        .map_err(|e| AppError::Configuration(format!("route pattern `{pattern}`: {e}")))
}
