//! Logging setup.

use reinhardt_actions_core::LoggingSettings;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
	#[error("Invalid log filter `{filter}`: {source}")]
	Filter {
		filter: String,
		#[source]
		source: tracing_subscriber::filter::ParseError,
	},

	#[error("Failed to initialize logging: {0}")]
	Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Filter used for `settings`. `RUST_LOG` wins over the configured level.
pub fn filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
	let directives = std::env::var(EnvFilter::DEFAULT_ENV)
		.ok()
		.filter(|value| !value.trim().is_empty())
		.unwrap_or_else(|| settings.level.clone());
	EnvFilter::builder()
		.parse(&directives)
		.map_err(|source| LoggingError::Filter {
			filter: directives,
			source,
		})
}

/// Installs a global `fmt` subscriber. Fails if one is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
	let layer = fmt::layer().with_target(true).with_filter(filter(settings)?);
	tracing_subscriber::registry().with(layer).try_init()?;
	Ok(())
}
