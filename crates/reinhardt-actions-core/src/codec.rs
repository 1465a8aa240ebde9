//! Envelope codec.
//!
//! Values that JSON can express are written as plain JSON. Everything else is
//! written as a tagged object `{"$type": <tag>, "value": <payload>}`:
//!
//! | tag | payload |
//! |---|---|
//! | `undefined` | none |
//! | `float` | `"NaN"`, `"Infinity"` or `"-Infinity"` |
//! | `bigint` | decimal string |
//! | `bytes` | standard base64 |
//! | `date` | RFC 3339 timestamp |
//! | `set` | array of members |
//! | `map` | array of `[key, value]` pairs |
//! | `record` | object, used when a record has its own `$type` field |
//!
//! Callables never cross the wire. They are omitted from records and maps,
//! written as `null` inside arrays, skipped in sets and become `undefined` at
//! the top level.

use crate::value::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as Json};

/// Key marking a tagged object.
pub const TYPE_TAG: &str = "$type";

/// Key holding the payload of a tagged object.
pub const PAYLOAD_KEY: &str = "value";

/// Errors raised while decoding wire text.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error("Malformed JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Unknown value tag `{0}`")]
	UnknownTag(String),

	#[error("Invalid `{tag}` payload: {reason}")]
	InvalidPayload { tag: &'static str, reason: String },
}

impl CodecError {
	fn payload(tag: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidPayload {
			tag,
			reason: reason.into(),
		}
	}
}

/// Encodes a value as wire text.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::codec::encode;
/// use reinhardt_actions_core::Value;
///
/// assert_eq!(encode(&Value::Int(3)), "3");
/// assert_eq!(encode(&Value::Float(f64::NAN)), r#"{"$type":"float","value":"NaN"}"#);
/// ```
pub fn encode(value: &Value) -> String {
	to_wire_json(value).to_string()
}

/// Decodes wire text produced by [`encode`].
pub fn decode(text: &str) -> Result<Value, CodecError> {
	let json: Json = serde_json::from_str(text)?;
	from_wire_json(json)
}

fn tagged(tag: &str, payload: Option<Json>) -> Json {
	let mut object = Map::new();
	object.insert(TYPE_TAG.to_string(), Json::String(tag.to_string()));
	if let Some(payload) = payload {
		object.insert(PAYLOAD_KEY.to_string(), payload);
	}
	Json::Object(object)
}

/// Converts a value into its wire JSON tree.
pub fn to_wire_json(value: &Value) -> Json {
	match value {
		Value::Undefined | Value::Callable(_) => tagged("undefined", None),
		Value::Null => Json::Null,
		Value::Bool(b) => Json::Bool(*b),
		Value::Int(n) => Json::Number((*n).into()),
		Value::Float(f) => match Number::from_f64(*f) {
			Some(number) => Json::Number(number),
			None => {
				let name = if f.is_nan() {
					"NaN"
				} else if f.is_sign_positive() {
					"Infinity"
				} else {
					"-Infinity"
				};
				tagged("float", Some(Json::String(name.to_string())))
			}
		},
		Value::BigInt(n) => tagged("bigint", Some(Json::String(n.to_string()))),
		Value::String(s) => Json::String(s.clone()),
		Value::Bytes(bytes) => tagged("bytes", Some(Json::String(STANDARD.encode(bytes)))),
		Value::Date(date) => tagged(
			"date",
			Some(Json::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
		),
		Value::Array(items) => Json::Array(
			items
				.iter()
				.map(|item| {
					if item.is_callable() {
						Json::Null
					} else {
						to_wire_json(item)
					}
				})
				.collect(),
		),
		Value::Set(members) => tagged(
			"set",
			Some(Json::Array(
				members
					.iter()
					.filter(|member| !member.is_callable())
					.map(to_wire_json)
					.collect(),
			)),
		),
		Value::Map(entries) => tagged(
			"map",
			Some(Json::Array(
				entries
					.iter()
					.filter(|(k, v)| !k.is_callable() && !v.is_callable())
					.map(|(k, v)| Json::Array(vec![to_wire_json(k), to_wire_json(v)]))
					.collect(),
			)),
		),
		Value::Record(fields) => {
			let object: Map<String, Json> = fields
				.iter()
				.filter(|(_, v)| !v.is_callable())
				.map(|(k, v)| (k.clone(), to_wire_json(v)))
				.collect();
			if fields.contains_key(TYPE_TAG) {
				tagged("record", Some(Json::Object(object)))
			} else {
				Json::Object(object)
			}
		}
	}
}

/// Converts a wire JSON tree back into a value.
pub fn from_wire_json(json: Json) -> Result<Value, CodecError> {
	match json {
		Json::Null => Ok(Value::Null),
		Json::Bool(b) => Ok(Value::Bool(b)),
		Json::Number(n) => Ok(number_value(&n)),
		Json::String(s) => Ok(Value::String(s)),
		Json::Array(items) => items
			.into_iter()
			.map(from_wire_json)
			.collect::<Result<Vec<_>, _>>()
			.map(Value::Array),
		Json::Object(mut object) => match object.remove(TYPE_TAG) {
			None => record_value(object),
			Some(Json::String(tag)) => {
				let payload = object.remove(PAYLOAD_KEY);
				decode_tagged(&tag, payload)
			}
			Some(other) => Err(CodecError::UnknownTag(other.to_string())),
		},
	}
}

fn number_value(number: &Number) -> Value {
	if let Some(i) = number.as_i64() {
		Value::Int(i)
	} else if let Some(u) = number.as_u64() {
		Value::BigInt(u.into())
	} else {
		Value::Float(number.as_f64().unwrap_or(f64::NAN))
	}
}

fn record_value(object: Map<String, Json>) -> Result<Value, CodecError> {
	object
		.into_iter()
		.map(|(k, v)| from_wire_json(v).map(|v| (k, v)))
		.collect::<Result<_, _>>()
		.map(Value::Record)
}

fn payload_str(tag: &'static str, payload: Option<Json>) -> Result<String, CodecError> {
	match payload {
		Some(Json::String(s)) => Ok(s),
		_ => Err(CodecError::payload(tag, "expected a string")),
	}
}

fn payload_array(tag: &'static str, payload: Option<Json>) -> Result<Vec<Json>, CodecError> {
	match payload {
		Some(Json::Array(items)) => Ok(items),
		_ => Err(CodecError::payload(tag, "expected an array")),
	}
}

fn decode_tagged(tag: &str, payload: Option<Json>) -> Result<Value, CodecError> {
	match tag {
		"undefined" => Ok(Value::Undefined),
		"float" => match payload_str("float", payload)?.as_str() {
			"NaN" => Ok(Value::Float(f64::NAN)),
			"Infinity" => Ok(Value::Float(f64::INFINITY)),
			"-Infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
			other => Err(CodecError::payload("float", format!("unknown float `{other}`"))),
		},
		"bigint" => payload_str("bigint", payload)?
			.parse::<i128>()
			.map(Value::BigInt)
			.map_err(|e| CodecError::payload("bigint", e.to_string())),
		"bytes" => STANDARD
			.decode(payload_str("bytes", payload)?)
			.map(Value::Bytes)
			.map_err(|e| CodecError::payload("bytes", e.to_string())),
		"date" => DateTime::parse_from_rfc3339(&payload_str("date", payload)?)
			.map(|date| Value::Date(date.with_timezone(&Utc)))
			.map_err(|e| CodecError::payload("date", e.to_string())),
		"set" => payload_array("set", payload)?
			.into_iter()
			.map(from_wire_json)
			.collect::<Result<Vec<_>, _>>()
			.map(Value::Set),
		"map" => payload_array("map", payload)?
			.into_iter()
			.map(|entry| match entry {
				Json::Array(mut pair) if pair.len() == 2 => {
					let value = pair.pop().unwrap_or(Json::Null);
					let key = pair.pop().unwrap_or(Json::Null);
					Ok((from_wire_json(key)?, from_wire_json(value)?))
				}
				_ => Err(CodecError::payload("map", "expected [key, value] pairs")),
			})
			.collect::<Result<Vec<_>, _>>()
			.map(Value::Map),
		"record" => match payload {
			Some(Json::Object(object)) => record_value(object),
			_ => Err(CodecError::payload("record", "expected an object")),
		},
		other => Err(CodecError::UnknownTag(other.to_string())),
	}
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		to_wire_json(self).serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let json = Json::deserialize(deserializer)?;
		from_wire_json(json).map_err(D::Error::custom)
	}
}
