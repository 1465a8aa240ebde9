//! Response envelope and the JSON bodies exchanged over HTTP.

use crate::codec;
use crate::error::{ActionError, ActionResult, SerializedError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys an action result may carry.
pub const ENVELOPE_KEYS: [&str; 3] = ["data", "status", "headers"];

/// Highest status an action may return through its envelope.
pub const MAX_ENVELOPE_STATUS: u16 = 299;

/// The normalized result of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
	pub data: Value,
	pub status: u16,
	pub headers: BTreeMap<String, String>,
}

impl Default for ResponseEnvelope {
	fn default() -> Self {
		Self {
			data: Value::Null,
			status: 200,
			headers: BTreeMap::new(),
		}
	}
}

impl ResponseEnvelope {
	pub fn new(data: impl Into<Value>) -> Self {
		Self {
			data: data.into(),
			..Self::default()
		}
	}

	pub fn with_status(mut self, status: u16) -> Self {
		self.status = status;
		self
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}

	/// Validates what an action returned and fills in defaults.
	///
	/// `undefined` and `null` count as an empty envelope. Anything else must
	/// be a record whose keys are among `data`, `status` and `headers`, with a
	/// successful status and string headers.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_actions_core::{ResponseEnvelope, Value};
	///
	/// let result = Value::record([("data", Value::record([("y", Value::Int(2))]))]);
	/// let envelope = ResponseEnvelope::from_value(result).unwrap();
	/// assert_eq!(envelope.status, 200);
	///
	/// let invalid = Value::record([("extra", Value::Int(1))]);
	/// assert_eq!(ResponseEnvelope::from_value(invalid).unwrap_err().status(), 400);
	/// ```
	pub fn from_value(value: Value) -> ActionResult<Self> {
		let fields = match value {
			Value::Undefined | Value::Null => return Ok(Self::default()),
			Value::Record(fields) => fields,
			other => {
				return Err(ActionError::validation(format!(
					"Action must return a response envelope, got {}.",
					other.type_name()
				)));
			}
		};

		if let Some(key) = fields.keys().find(|key| !ENVELOPE_KEYS.contains(&key.as_str())) {
			return Err(ActionError::validation(format!(
				"Unexpected key `{key}` in action result. Only `data`, `status` and `headers` are allowed."
			)));
		}

		let mut envelope = Self::default();
		for (key, value) in fields {
			match key.as_str() {
				"data" => envelope.data = value,
				"status" => envelope.status = parse_status(&value)?,
				"headers" => envelope.headers = parse_headers(value)?,
				_ => {}
			}
		}
		Ok(envelope)
	}
}

fn parse_status(value: &Value) -> ActionResult<u16> {
	if value.is_nullish() {
		return Ok(200);
	}
	let status = value
		.as_i64()
		.and_then(|status| u16::try_from(status).ok())
		.filter(|status| (100..=999).contains(status))
		.ok_or_else(|| ActionError::validation("Envelope status must be an HTTP status code."))?;
	if status > MAX_ENVELOPE_STATUS {
		return Err(ActionError::validation(format!(
			"Envelope status {status} is not a success status. Raise an error to fail a call."
		)));
	}
	Ok(status)
}

fn parse_headers(value: Value) -> ActionResult<BTreeMap<String, String>> {
	match value {
		Value::Undefined | Value::Null => Ok(BTreeMap::new()),
		Value::Record(fields) => fields
			.into_iter()
			.map(|(name, value)| match value {
				Value::String(value) => Ok((name, value)),
				other => Err(ActionError::validation(format!(
					"Envelope header `{name}` must be a string, got {}.",
					other.type_name()
				))),
			})
			.collect(),
		other => Err(ActionError::validation(format!(
			"Envelope headers must be a record, got {}.",
			other.type_name()
		))),
	}
}

/// Body of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSuccess {
	/// Codec text of the envelope data.
	pub data: String,
	pub status: u16,
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
}

impl From<&ResponseEnvelope> for WireSuccess {
	fn from(envelope: &ResponseEnvelope) -> Self {
		Self {
			data: codec::encode(&envelope.data),
			status: envelope.status,
			headers: envelope.headers.clone(),
		}
	}
}

impl WireSuccess {
	pub fn decode_data(&self) -> Result<Value, codec::CodecError> {
		codec::decode(&self.data)
	}
}

/// Body of a failed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFailure {
	pub error: SerializedError,
}

impl From<&ActionError> for WireFailure {
	fn from(error: &ActionError) -> Self {
		Self {
			error: error.to_serialized(),
		}
	}
}
