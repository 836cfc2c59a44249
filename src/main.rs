//! # Interview Voice Backend - Main Application Entry Point
//!
//! HTTP service that runs a spoken interview loop: it transcribes recorded
//! answers, scores them against a rubric and reads feedback back as audio.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state and request metrics
//! - **orchestrator**: Wires transcription, evaluation and synthesis per request
//! - **transcription / synthesis**: Adapters around the external speech engines
//! - **evaluation**: Deterministic rubric scoring of candidate answers
//! - **audio**: WAV decoding, encoding and preprocessing
//! - **engine**: Concurrency gate and error type shared by both adapters
//! - **health**: Liveness and detailed status endpoints
//! - **middleware**: Correlation ids and per-route metrics
//! - **handlers**: HTTP request handlers and the route table
//! - **error**: Error types and their HTTP responses

mod audio;
mod config;
mod engine;
mod error;
mod evaluation;
mod handlers;
mod health;
mod middleware;
mod orchestrator;
mod state;
mod synthesis;
mod transcription;

#[cfg(test)]
mod testing;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use orchestrator::Orchestrator;
use state::AppState;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Builds the speech engines** and the shared application state
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting interview-voice-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!(
        recognizer = %config.speech.recognizer.provider,
        synthesizer = %config.speech.synthesizer.provider,
        "Speech engines configured"
    );

    let orchestrator = Orchestrator::from_config(&config)?;
    let app_state = AppState::new(config.clone(), orchestrator);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // The JSON limit is read once; the upload limit is re-read per request.
    let max_json_bytes = config.limits.max_json_bytes;

    let shutdown = Arc::new(Notify::new());
    setup_signal_handlers(Arc::clone(&shutdown));

    info!("Starting HTTP server on {}", bind_addr);

    let server_state = app_state.clone();
    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Middleware executes in reverse order of registration for requests
        App::new()
            .app_data(web::Data::new(server_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestCorrelation)
            .configure(|cfg| handlers::configure(cfg, max_json_bytes))
    });

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let server = server.bind(&bind_addr)?.run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = shutdown.notified() => {
            info!("Shutdown signal received, stopping server...");
            app_state.orchestrator.shutdown();
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize structured logging.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g. "info", "interview_voice_backend=trace")
/// - If not set, defaults to "interview_voice_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_voice_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Listen for SIGTERM and SIGINT and wake the main task on the first one.
///
/// If a handler cannot be installed the server keeps running; it can still
/// be stopped through the other signal or by the process manager.
fn setup_signal_handlers(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                None
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to install SIGINT handler: {}", e);
                None
            }
        };

        tokio::select! {
            Some(_) = recv_signal(&mut sigterm) => {
                info!("Received SIGTERM");
            }
            Some(_) = recv_signal(&mut sigint) => {
                info!("Received SIGINT");
            }
            else => {
                warn!("Signal streams closed; graceful shutdown is unavailable");
                return;
            }
        }

        // notify_one stores a permit, so the signal is not lost if it
        // arrives before the main task starts waiting.
        shutdown.notify_one();
    });
}

async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match sig {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}
