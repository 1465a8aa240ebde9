//! Layered settings.
//!
//! Sources are merged in priority order: environment variables
//! (`ISOMORPHIC_ACTIONS_*`) > TOML file > defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Prefix of the environment variables read by [`EnvSource::actions`].
pub const ENV_PREFIX: &str = "ISOMORPHIC_ACTIONS_";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid setting `{key}` from {source_description}: {reason}")]
	Invalid {
		key: String,
		source_description: String,
		reason: String,
	},
}

/// Environment variable configuration source
///
/// Keys are lowercased after the prefix is stripped. `OUTPUT` is an alias
/// of `output_dir` and `LOG_LEVEL` sets `logging.level`.
pub struct EnvSource {
	prefix: String,
}

impl EnvSource {
	/// Create a source reading variables that start with `prefix`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_actions_core::settings::EnvSource;
	///
	/// let source = EnvSource::new("MY_APP_");
	/// ```
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	/// Create a source reading `ISOMORPHIC_ACTIONS_*` variables
	pub fn actions() -> Self {
		Self::new(ENV_PREFIX)
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};

			let lower_key = match clean_key.to_lowercase().as_str() {
				"output" => "output_dir".to_string(),
				"log_level" => {
					let mut logging = serde_json::Map::new();
					logging.insert("level".to_string(), Value::String(value));
					config.insert("logging".to_string(), Value::Object(logging));
					continue;
				}
				other => other.to_string(),
			};

			let parsed_value = if lower_key == "max_body_size" {
				let num = value.trim().parse::<u64>().map_err(|e| SettingsError::Invalid {
					key: key.clone(),
					source_description: self.description(),
					reason: e.to_string(),
				})?;
				Value::Number(num.into())
			} else {
				Value::String(value)
			};

			config.insert(lower_key, parsed_value);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

/// TOML file configuration source
///
/// A missing file contributes nothing. Keys may sit at the root or under an
/// `[actions]` table.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(&toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SettingsError::Parse("Expected table at root".to_string()))?;
		let map = match map.get("actions").and_then(Value::as_object) {
			Some(actions) => actions,
			None => map,
		};

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50 // Medium priority
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

fn default_endpoint() -> String {
	crate::descriptor::DEFAULT_ENDPOINT.to_string()
}

fn default_bind_address() -> String {
	"127.0.0.1:3000".to_string()
}

fn default_max_body_size() -> usize {
	10 * 1024 * 1024
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
	/// Default filter directive; `RUST_LOG` overrides it.
	#[serde(default = "default_log_level")]
	pub level: String,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: default_log_level(),
		}
	}
}

/// Settings of the action runtime and build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionsSettings {
	/// Path of the action endpoint.
	#[serde(default = "default_endpoint")]
	pub endpoint: String,
	/// Origin used by the client to resolve a relative endpoint.
	#[serde(default)]
	pub base_url: Option<String>,
	/// Where the build writes its outputs.
	#[serde(default)]
	pub output_dir: Option<PathBuf>,
	#[serde(default = "default_bind_address")]
	pub bind_address: String,
	#[serde(default = "default_max_body_size")]
	pub max_body_size: usize,
	#[serde(default)]
	pub logging: LoggingSettings,
}

impl Default for ActionsSettings {
	fn default() -> Self {
		Self {
			endpoint: default_endpoint(),
			base_url: None,
			output_dir: None,
			bind_address: default_bind_address(),
			max_body_size: default_max_body_size(),
			logging: LoggingSettings::default(),
		}
	}
}

impl ActionsSettings {
	/// Start assembling settings from sources.
	pub fn builder() -> SettingsBuilder {
		SettingsBuilder::new()
	}

	/// Environment over an optional TOML file over defaults.
	pub fn load(toml_path: Option<PathBuf>) -> Result<Self, SettingsError> {
		let mut builder = Self::builder().add_source(EnvSource::actions());
		if let Some(path) = toml_path {
			builder = builder.add_source(TomlFileSource::new(path));
		}
		builder.build()
	}
}

/// Merges sources by priority and deserializes the result.
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merged key/value view, before deserialization.
	pub fn merged(&self) -> Result<IndexMap<String, Value>, SettingsError> {
		let mut ordered: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
		ordered.sort_by_key(|source| source.priority());

		let mut merged = IndexMap::new();
		for source in ordered {
			let values = source.load()?;
			tracing::debug!(source = %source.description(), keys = values.len(), "loaded settings source");
			for (key, value) in values {
				merge_value(&mut merged, key, value);
			}
		}
		Ok(merged)
	}

	pub fn build(&self) -> Result<ActionsSettings, SettingsError> {
		let merged = self.merged()?;
		let object: serde_json::Map<String, Value> = merged.into_iter().collect();
		let settings: ActionsSettings = serde_json::from_value(Value::Object(object))?;
		if !settings.endpoint.starts_with('/') && !settings.endpoint.contains("://") {
			return Err(SettingsError::Invalid {
				key: "endpoint".to_string(),
				source_description: "merged settings".to_string(),
				reason: "must be an absolute path or URL".to_string(),
			});
		}
		Ok(settings)
	}
}

/// Tables merge key by key; anything else is replaced.
fn merge_value(target: &mut IndexMap<String, Value>, key: String, value: Value) {
	match (target.get_mut(&key), value) {
		(Some(Value::Object(existing)), Value::Object(incoming)) => {
			for (k, v) in incoming {
				existing.insert(k, v);
			}
		}
		(_, value) => {
			target.insert(key, value);
		}
	}
}
