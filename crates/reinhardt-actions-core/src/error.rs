//! Runtime error taxonomy.
//!
//! A single [`ActionError`] type travels through both sides of a call. The
//! receiving side serializes it into a [`SerializedError`]; the calling side
//! rebuilds an equivalent `ActionError` from it, so status, key, data and
//! headers are identical on both ends.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Result type used across action code.
pub type ActionResult<T> = Result<T, ActionError>;

/// Default status of an error raised without one.
pub const DEFAULT_ERROR_STATUS: u16 = 400;

/// Classification of an [`ActionError`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// A raw function was used where a transformed descriptor was expected.
	Configuration,
	/// The action returned something other than a response envelope.
	Validation,
	/// No registered action matches the requested ids.
	NotFound,
	/// The action exists but was called with a method other than POST.
	MethodNotAllowed,
	/// The endpoint itself does not exist (404 without the marker header).
	EndpointMissing,
	/// The transport failed or answered with an unrecognized body.
	Transport,
	/// Raised by action code.
	Application,
}

impl ErrorKind {
	/// Wire name of the kind.
	pub fn name(self) -> &'static str {
		match self {
			Self::Configuration => "ConfigurationError",
			Self::Validation => "ValidationError",
			Self::NotFound => "NotFoundError",
			Self::MethodNotAllowed => "MethodNotAllowedError",
			Self::EndpointMissing => "EndpointMissingError",
			Self::Transport => "TransportError",
			Self::Application => "ActionError",
		}
	}

	/// Maps a wire name back to a kind. Unknown names are application errors.
	pub fn from_name(name: &str) -> Self {
		match name {
			"ConfigurationError" => Self::Configuration,
			"ValidationError" => Self::Validation,
			"NotFoundError" => Self::NotFound,
			"MethodNotAllowedError" => Self::MethodNotAllowed,
			"EndpointMissingError" => Self::EndpointMissing,
			"TransportError" => Self::Transport,
			_ => Self::Application,
		}
	}

	pub fn default_status(self) -> u16 {
		match self {
			Self::NotFound | Self::EndpointMissing => 404,
			Self::MethodNotAllowed => 405,
			Self::Configuration => 500,
			Self::Validation | Self::Transport | Self::Application => DEFAULT_ERROR_STATUS,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Wire form of an [`ActionError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
	pub name: String,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
	#[serde(default = "default_status")]
	pub status: u16,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub headers: Option<BTreeMap<String, String>>,
}

fn default_status() -> u16 {
	DEFAULT_ERROR_STATUS
}

/// Error raised by, or on behalf of, an action.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::{ActionError, ErrorKind, Value};
///
/// let error = ActionError::new("bad input")
/// 	.with_status(422)
/// 	.with_key("E_BAD_INPUT")
/// 	.with_data(Value::record([("field", Value::from("email"))]));
///
/// assert_eq!(error.kind(), ErrorKind::Application);
/// assert_eq!(error.status(), 422);
/// assert_eq!(error.key(), Some("E_BAD_INPUT"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{name}: {message}")]
pub struct ActionError {
	kind: ErrorKind,
	name: String,
	message: String,
	status: u16,
	key: Option<String>,
	data: Option<Value>,
	headers: Option<BTreeMap<String, String>>,
	stack: Option<String>,
	#[source]
	source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ActionError {
	/// Creates an application error with the default status.
	pub fn new(message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::Application, message)
	}

	/// Creates an error of the given kind with that kind's default status.
	pub fn of_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			name: kind.name().to_string(),
			message: message.into(),
			status: kind.default_status(),
			key: None,
			data: None,
			headers: None,
			stack: capture_stack(),
			source: None,
		}
	}

	pub fn configuration(message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::Configuration, message)
	}

	pub fn validation(message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::Validation, message)
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::NotFound, message)
	}

	pub fn method_not_allowed(message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::MethodNotAllowed, message)
	}

	pub fn endpoint_missing(message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::EndpointMissing, message)
	}

	/// A transport answer that carried no error envelope.
	pub fn transport(status: u16, message: impl Into<String>) -> Self {
		Self::of_kind(ErrorKind::Transport, message).with_status(status)
	}

	/// Wraps a lower-level failure, keeping it reachable through
	/// [`std::error::Error::source`].
	pub fn from_source<E>(kind: ErrorKind, error: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		let mut wrapped = Self::of_kind(kind, error.to_string());
		wrapped.source = Some(Arc::new(error));
		wrapped
	}

	pub fn with_status(mut self, status: u16) -> Self {
		self.status = status;
		self
	}

	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	pub fn with_data(mut self, data: impl Into<Value>) -> Self {
		self.data = Some(data.into());
		self
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers
			.get_or_insert_with(BTreeMap::new)
			.insert(name.into(), value.into());
		self
	}

	/// Overrides the wire name, for application errors with their own class.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn kind(&self) -> ErrorKind {
		self.kind
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn status(&self) -> u16 {
		self.status
	}

	pub fn key(&self) -> Option<&str> {
		self.key.as_deref()
	}

	pub fn data(&self) -> Option<&Value> {
		self.data.as_ref()
	}

	pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
		self.headers.as_ref()
	}

	pub fn stack(&self) -> Option<&str> {
		self.stack.as_deref()
	}

	/// Converts the error into its wire form.
	pub fn to_serialized(&self) -> SerializedError {
		SerializedError {
			name: self.name.clone(),
			message: self.message.clone(),
			stack: self.stack.clone(),
			status: self.status,
			key: self.key.clone(),
			data: self.data.clone(),
			headers: self.headers.clone(),
		}
	}

	/// Rebuilds an error from its wire form.
	pub fn from_serialized(serialized: SerializedError) -> Self {
		let kind = ErrorKind::from_name(&serialized.name);
		Self {
			kind,
			name: serialized.name,
			message: serialized.message,
			status: serialized.status,
			key: serialized.key,
			data: serialized.data,
			headers: serialized.headers,
			stack: serialized.stack,
			source: None,
		}
	}
}

impl From<SerializedError> for ActionError {
	fn from(serialized: SerializedError) -> Self {
		Self::from_serialized(serialized)
	}
}

impl From<crate::codec::CodecError> for ActionError {
	fn from(error: crate::codec::CodecError) -> Self {
		Self::from_source(ErrorKind::Validation, error)
	}
}

fn capture_stack() -> Option<String> {
	let backtrace = Backtrace::capture();
	match backtrace.status() {
		BacktraceStatus::Captured => Some(backtrace.to_string()),
		_ => None,
	}
}

/// Encodes an error as wire text.
pub fn encode_error(error: &ActionError) -> String {
	serde_json::to_string(&error.to_serialized()).unwrap_or_else(|_| {
		format!(
			r#"{{"name":"{}","message":"error could not be serialized","status":{}}}"#,
			ErrorKind::Application.name(),
			error.status()
		)
	})
}

/// Decodes wire text produced by [`encode_error`].
pub fn decode_error(text: &str) -> Result<ActionError, crate::codec::CodecError> {
	let serialized: SerializedError = serde_json::from_str(text)?;
	Ok(ActionError::from_serialized(serialized))
}
