// crates/authgate-lib/src/config/config_tests.rs

use super::*;
use figment::Jail;
use std::io::Write;
use tempfile::NamedTempFile;

fn fast_hash(password: &str) -> String {
    CredentialHasher::scrypt(4, 8, 1)
        .unwrap()
        .hash(password)
        .unwrap()
}

#[test]
fn test_default_settings_are_valid() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());

    assert_eq!(settings.bind_addr(), "127.0.0.1:8080");
    assert_eq!(settings.session_ttl(), Duration::from_secs(1800));
    assert_eq!(settings.session.cookie_name, "SESSION");
    assert_eq!(settings.login.path, "/login");
    assert_eq!(settings.gateway.challenge, ChallengePolicy::Negotiate);
    assert_eq!(
        settings.routes,
        vec![
            RouteRule::new("/oauth/**", AccessPolicy::Public),
            RouteRule::new("/health", AccessPolicy::Public),
        ]
    );
}

#[test]
fn test_settings_validation() {
    let settings = Settings::default();

    // Test invalid log level
    let mut invalid = settings.clone();
    invalid.log_level = "loud".to_string();
    assert!(invalid.validate().is_err());

    // Test invalid session TTL
    let mut invalid = settings.clone();
    invalid.session.ttl_secs = 0;
    assert!(invalid.validate().is_err());

    // Cookie names are restricted to token characters
    let mut invalid = settings.clone();
    invalid.session.cookie_name = "bad name;".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.login.path = "login".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.login.path = "/login/**".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.login.logout_path = invalid.login.path.clone();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.rate_limit.max_attempts = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.hashing.algorithm = HashAlgorithm::Argon2;
    invalid.hashing.argon2.m_cost = 1;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.routes.push(RouteRule::new("no-leading-slash", AccessPolicy::Public));
    assert!(invalid.validate().is_err());

    // Login and logout paths must not shadow built-in routes or contain captures
    for path in ["/", "/health", "/session", "/login/{id}", "/login/{*rest}"] {
        let mut invalid = settings.clone();
        invalid.login.path = path.to_string();
        assert!(invalid.validate().is_err(), "login.path {path} accepted");
    }

    let mut invalid = settings.clone();
    invalid.login.logout_path = "/session".to_string();
    assert!(invalid.validate().is_err());

    // Redirects stay on this server
    for target in ["//evil.example", "/\\evil.example", "https://evil.example/", "home"] {
        let mut invalid = settings.clone();
        invalid.login.success_redirect = target.to_string();
        assert!(invalid.validate().is_err(), "success_redirect {target} accepted");
    }
}

#[test]
fn test_durations_are_capped() {
    let settings = Settings::default();

    // Large enough to overflow `Instant` arithmetic
    let mut invalid = settings.clone();
    invalid.rate_limit.lockout_secs = u64::MAX;
    assert!(invalid.validate().is_err());

    let mut valid = settings.clone();
    valid.rate_limit.lockout_secs = 7 * 24 * 60 * 60;
    assert!(valid.validate().is_ok());

    let mut invalid = settings.clone();
    invalid.session.sweep_interval_secs = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.session.sweep_interval_secs = u64::MAX;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.rate_limit.cleanup_interval_secs = 24 * 60 * 60 + 1;
    assert!(invalid.validate().is_err());
}

#[test]
fn test_user_validation() {
    let user = UserSettings {
        username: "user".to_string(),
        password_hash: fast_hash("password"),
        display_name: None,
        id: None,
    };

    let mut settings = Settings::default();
    settings.users.push(user.clone());
    assert!(settings.validate().is_ok());

    // Duplicate usernames
    settings.users.push(user.clone());
    assert!(settings.validate().is_err());

    // Raw passwords are not hashes
    let mut settings = Settings::default();
    settings.users.push(UserSettings {
        password_hash: "password".to_string(),
        ..user.clone()
    });
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.users.push(UserSettings {
        username: String::new(),
        ..user
    });
    assert!(settings.validate().is_err());
}

#[test]
fn test_load_from_file() {
    let hash = fast_hash("password");
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
log_level = "debug"

[server]
port = 9090

[session]
ttl_secs = 600
secure_cookie = true

[gateway]
challenge = "reject"

[[routes]]
pattern = "/public/**"
access = "public"

[[users]]
username = "user"
password_hash = "{hash}"
display_name = "Test User"
"#
    )
    .unwrap();

    let settings = Settings::load_from(file.path()).unwrap();
    assert_eq!(settings.log_level, "debug");
    assert_eq!(settings.server.port, 9090);
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.session.ttl_secs, 600);
    assert!(settings.session.secure_cookie);
    assert_eq!(settings.session.cookie_name, "SESSION");
    assert_eq!(settings.gateway.challenge, ChallengePolicy::Reject);

    // Configured routes replace the defaults
    assert_eq!(
        settings.routes,
        vec![RouteRule::new("/public/**", AccessPolicy::Public)]
    );

    assert_eq!(settings.users.len(), 1);
    assert_eq!(settings.users[0].display_name.as_deref(), Some("Test User"));
}

#[test]
fn test_load_from_missing_file() {
    let err = Settings::load_from("/definitely/not/here/authgate.toml").unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
}

#[test]
fn test_load_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[session]\nttl_secs = 0").unwrap();

    let err = Settings::load_from(file.path()).unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
}

#[test]
fn test_environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            DEFAULT_CONFIG_FILE,
            r#"
[session]
ttl_secs = 600
cookie_name = "GATE"
"#,
        )?;
        jail.set_env("AUTHGATE_SESSION__TTL_SECS", "120");
        jail.set_env("AUTHGATE_RATE_LIMIT__TRUST_PROXY_HEADERS", "true");

        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert_eq!(settings.session.ttl_secs, 120);
        assert_eq!(settings.session.cookie_name, "GATE");
        assert!(settings.rate_limit.trust_proxy_headers);
        Ok(())
    });
}

#[test]
fn test_load_without_file_uses_defaults() {
    Jail::expect_with(|_jail| {
        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert_eq!(settings.session.ttl_secs, 1800);
        assert_eq!(settings.routes.len(), 2);
        Ok(())
    });
}
