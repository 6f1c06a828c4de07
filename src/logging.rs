//! # Structured Logging Module
//!
//! Environment-aware structured logging for cascade and flow operations.
//! Output is human-readable by default and JSON lines when configured.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment defaults
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging from explicit settings. Only the first call
/// has any effect.
pub fn init_structured_logging_with(settings: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let directive = std::env::var("RUST_LOG")
            .ok()
            .or_else(|| settings.level.clone())
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console = if settings.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(EnvFilter::new(directive.clone()))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(directive.clone()))
                .boxed()
        };

        // A global subscriber may already exist (embedding host, test harness)
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            filter = %directive,
            "STRUCTURED LOGGING: initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CASCADE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for cascade operations
pub fn log_cascade_operation(
    operation: &str,
    resource_type: &str,
    action_code: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        resource_type = %resource_type,
        action_code = %action_code,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CASCADE_OPERATION"
    );
}

/// Log structured data for registry operations
pub fn log_registry_operation(registry: &str, key: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        registry = %registry,
        key = %key,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "REGISTRY_OPERATION"
    );
}

/// Log structured data for flow marshaling decisions
pub fn log_flow_operation(
    previous_flow: Option<&str>,
    next_flow: &str,
    substitution: Option<&str>,
    status: &str,
) {
    tracing::info!(
        previous_flow = previous_flow,
        next_flow = %next_flow,
        substitution = substitution,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "FLOW_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
