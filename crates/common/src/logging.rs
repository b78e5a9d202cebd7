//! Provides utilities to initialize logging.
use std::env;

use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable name for the service label, which is appended to the
/// whoami string.
pub const SVC_LABEL_ENVVAR: &str = "SPV_BRIDGE_SVC_LABEL";

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// The whoami string, which is used to identify the service in logs.
    whoami: String,
}

impl LoggerConfig {
    /// Creates a new instance with whoami set.
    pub const fn new(whoami: String) -> Self {
        Self { whoami }
    }

    /// Creates a new instance with the whoami string set to the provided
    /// string, extended with the service label from the environment if set.
    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }
}

/// Initializes the logging subsystem with the provided config.
pub fn init(config: LoggerConfig) {
    let filt = EnvFilter::from_default_env();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(filt)
        .boxed();

    tracing_subscriber::registry().with(stdout_layer).init();

    info!(whoami = %config.whoami, "logging started");
}

/// Gets the service label from the environment, if set.
fn get_service_label() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Gets the whoami string for the given base name, appending the service
/// label from the environment if one is set.
fn get_whoami_string(base: &str) -> String {
    match get_service_label() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
