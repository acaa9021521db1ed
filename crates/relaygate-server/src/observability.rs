//! Logging setup.
//!
//! Relaygate logs through `tracing`. Denials that are concealed as
//! not-found are logged at DEBUG with their real reason, so the JSON format
//! is the one to run with when auditing access decisions:
//!
//! ```json
//! {"timestamp":"2025-01-15T10:30:00.000Z","level":"DEBUG","target":"relaygate_domain::policy::conceal","fields":{"message":"concealing denial as not-found","operation":"get","reason":"not-a-member"}}
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let config = relaygate_server::ServerConfig::load(Some("relaygate.yaml"))?;
//! relaygate_server::observability::init_from_config(&config);
//! ```

use std::io;
use std::str::FromStr;

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::{LoggingSettings, ServerConfig};

/// Crates whose events the default filter admits at the configured level.
const RELAYGATE_TARGETS: [&str; 3] = [
    "relaygate_domain",
    "relaygate_storage",
    "relaygate_server",
];

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for relaygate's own targets when `RUST_LOG` is unset.
    /// Everything else logs at WARN.
    pub level: Level,
    /// Emit an event when each instrumented span closes, with its timing.
    pub span_timings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: Level::INFO,
            span_timings: false,
        }
    }
}

impl LoggingConfig {
    /// Builds a logging configuration from loaded settings. The level was
    /// checked by [`ServerConfig::validate`]; anything unparseable falls
    /// back to INFO.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            format: if settings.json {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            level: Level::from_str(&settings.level).unwrap_or(Level::INFO),
            span_timings: false,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_span_timings(mut self) -> Self {
        self.span_timings = true;
        self
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn directives(&self) -> String {
        let level = self.level.to_string().to_ascii_lowercase();
        let mut directives = vec!["warn".to_string()];
        directives.extend(
            RELAYGATE_TARGETS
                .iter()
                .map(|target| format!("{target}={level}")),
        );
        directives.join(",")
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the configured directives. Returns `false` if a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_logging(config: LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));
    tracing::subscriber::set_global_default(subscriber(&config, filter, io::stderr)).is_ok()
}

/// Installs the global subscriber described by the `logging` section of a
/// loaded server configuration.
pub fn init_from_config(config: &ServerConfig) -> bool {
    init_logging(LoggingConfig::from_settings(&config.logging))
}

fn subscriber<W>(
    config: &LoggingConfig,
    filter: EnvFilter,
    writer: W,
) -> impl Subscriber + Send + Sync
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let output = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry().with(output).with(filter)
}
