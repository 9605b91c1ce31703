//! Risk Service
//!
//! Hosts the breaker engine behind its scheduler cadences and the admin
//! HTTP surface. The pool engine is held alongside so tranche-level
//! signals and the emergency offline path stay in-process.

use std::path::PathBuf;
use std::sync::Arc;

use pool_core::{PoolConfig, TranchePool};
use risk_breaker::{BreakerEngine, MemoryAudit, SystemClock};
use tokio::sync::{watch, RwLock};

use risk_service::guard::FileLoanBookSource;
use risk_service::{http, spawn_breaker_hook, AppState, Scheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("risk_service=info".parse()?),
        )
        .init();

    tracing::info!("starting risk service");

    let admin_token = std::env::var("ADMIN_TOKEN").unwrap_or_else(|_| {
        tracing::warn!("ADMIN_TOKEN not set; admin surface locked to a random secret");
        format!("{:032x}", std::process::id() as u128 ^ 0x5EED_CAFE_F00D)
    });
    let book_path = std::env::var("LOAN_BOOK_PATH").unwrap_or_else(|_| "loan-book.json".into());
    let stability_window_secs: u64 = std::env::var("STABILITY_WINDOW_MINUTES")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
        * 60;

    let breaker = Arc::new(RwLock::new(BreakerEngine::new(
        MemoryAudit::default(),
        SystemClock,
    )));
    let risk_hook = spawn_breaker_hook(breaker.clone());
    let pool = Arc::new(RwLock::new(TranchePool::new(
        PoolConfig::default(),
        Box::new(risk_hook),
    )?));
    let app_state = AppState::new(breaker, pool, admin_token);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let source = Arc::new(FileLoanBookSource {
        path: PathBuf::from(&book_path),
    });
    tracing::info!("loan book source: {book_path}");

    Scheduler::new(
        app_state.clone(),
        source,
        stability_window_secs,
        shutdown_rx,
    )
    .spawn_all();

    let app = http::router(app_state);
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("admin surface listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            // In-flight scheduler callbacks stop at their next safe point.
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
