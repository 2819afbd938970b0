//! Gateway logging: a rolling file sink, plus stdout in text mode.
//!
//! The jobs poll the network on a timer and can be tuned separately with
//! `job_log_level`, so a debug trace of one pass does not drag the HTTP
//! and SQL client internals along with it.

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Modules that run as periodic jobs
const JOB_TARGETS: [&str; 3] = [
    "stellar_gateway::jobs",
    "stellar_gateway::transaction::reconciliation",
    "stellar_gateway::balance::scanner",
];

/// Client crates capped at warn unless RUST_LOG says otherwise
const QUIET_TARGETS: [&str; 4] = ["hyper", "reqwest", "rustls", "sqlx"];

pub const ROTATIONS: [&str; 3] = ["hourly", "daily", "never"];

pub fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Directive string handed to `EnvFilter` when RUST_LOG is unset
pub fn filter_directives(config: &AppConfig) -> String {
    let mut directives = vec![config.log_level.clone()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    if let Some(level) = &config.job_log_level {
        directives.extend(JOB_TARGETS.iter().map(|target| format!("{}={}", target, level)));
    }
    directives.join(",")
}

/// Install the global subscriber. Keep the guard alive for the process lifetime.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = RollingFileAppender::new(
        rotation(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured levels
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    tracing::info!(
        log_dir = %config.log_dir,
        rotation = %config.rotation,
        json = config.use_json,
        "Logging initialized"
    );
    guard
}
