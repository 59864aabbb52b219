// ============================
// crates/authgate-bin/src/main.rs
// ============================
use anyhow::Context;
use authgate_lib::{auth::CredentialHasher, config::Settings, router::create_router, AppState};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "authgate", version, about = "Session-based authentication gateway")]
struct Cli {
    /// Config file (defaults to ./authgate.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default)
    Serve,
    /// Read a password from stdin and print its hash for the `users` table
    HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load configuration")?;

    init_tracing(&settings.log_level, cli.json_logs);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::HashPassword => hash_password(&settings),
    }
}

fn init_tracing(log_level: &str, json: bool) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr: SocketAddr = settings
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.bind_addr()))?;
    let sweep_interval = Duration::from_secs(settings.session.sweep_interval_secs.max(1));
    let cleanup_interval = Duration::from_secs(settings.rate_limit.cleanup_interval_secs.max(1));

    let state = Arc::new(AppState::from_settings(settings)?);

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sessions.purge_expired(Utc::now());
        }
    });

    let rate_limiter = state.auth_rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            rate_limiter.cleanup();
        }
    });

    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "authgate listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("authgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

fn hash_password(settings: &Settings) -> anyhow::Result<()> {
    let mut password = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("failed to read password from stdin")?;

    let hasher = CredentialHasher::from_settings(&settings.hashing)?;
    let hashed = hasher.hash(password.trim_end_matches(['\r', '\n']))?;
    println!("{hashed}");
    Ok(())
}
