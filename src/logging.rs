//! # Structured Logging Module
//!
//! Tracing initialization for library consumers that do not install their
//! own subscriber. Safe to call more than once.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with an environment-driven filter.
///
/// The filter is read from `CHARGEN_LOG` (falling back to `info`). If a
/// global subscriber is already installed, this is a no-op.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = std::env::var("CHARGEN_LOG").unwrap_or_else(|_| "info".to_string());

        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer().with_target(true).with_level(true));

        // Another subscriber may already be set by the host application.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
