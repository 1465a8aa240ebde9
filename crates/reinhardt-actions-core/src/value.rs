//! Dynamic values exchanged between the two sides of an action call.
//!
//! [`Value`] is richer than JSON: it distinguishes `undefined` from `null`,
//! carries non-finite floats, big integers, raw bytes, timestamps, sets and
//! maps with arbitrary keys. The [`codec`](crate::codec) module turns it into
//! JSON text and back.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A function value.
///
/// Callables only exist in memory. The codec drops them, so a callable never
/// crosses the wire.
#[derive(Clone)]
pub struct Callable(Arc<dyn Fn(Vec<Value>) -> Value + Send + Sync>);

impl Callable {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn call(&self, args: Vec<Value>) -> Value {
		(self.0)(args)
	}
}

impl fmt::Debug for Callable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Callable")
	}
}

impl PartialEq for Callable {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	BigInt(i128),
	String(String),
	Bytes(Vec<u8>),
	Date(DateTime<Utc>),
	Array(Vec<Value>),
	Set(Vec<Value>),
	/// Ordered entries with arbitrary keys.
	Map(Vec<(Value, Value)>),
	/// Ordered string-keyed fields.
	Record(IndexMap<String, Value>),
	Callable(Callable),
}

impl Value {
	/// Builds a record from key/value pairs, keeping their order.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_actions_core::Value;
	///
	/// let user = Value::record([("id", Value::Int(1)), ("name", Value::from("ada"))]);
	/// assert_eq!(user.get("id"), Some(&Value::Int(1)));
	/// ```
	pub fn record<K, I>(fields: I) -> Self
	where
		K: Into<String>,
		I: IntoIterator<Item = (K, Value)>,
	{
		Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
	}

	/// Returns a field of a record.
	pub fn get(&self, key: &str) -> Option<&Value> {
		match self {
			Self::Record(fields) => fields.get(key),
			_ => None,
		}
	}

	pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
		match self {
			Self::Record(fields) => Some(fields),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the value as an integer when it holds a whole number.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Int(n) => Some(*n),
			Self::BigInt(n) => i64::try_from(*n).ok(),
			Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
			_ => None,
		}
	}

	pub fn is_record(&self) -> bool {
		matches!(self, Self::Record(_))
	}

	/// `true` for `undefined` and `null`.
	pub fn is_nullish(&self) -> bool {
		matches!(self, Self::Undefined | Self::Null)
	}

	pub fn is_callable(&self) -> bool {
		matches!(self, Self::Callable(_))
	}

	/// Name of the variant, used in error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Undefined => "undefined",
			Self::Null => "null",
			Self::Bool(_) => "bool",
			Self::Int(_) => "int",
			Self::Float(_) => "float",
			Self::BigInt(_) => "bigint",
			Self::String(_) => "string",
			Self::Bytes(_) => "bytes",
			Self::Date(_) => "date",
			Self::Array(_) => "array",
			Self::Set(_) => "set",
			Self::Map(_) => "map",
			Self::Record(_) => "record",
			Self::Callable(_) => "callable",
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			// NaN equals NaN so a value survives a round trip.
			(Self::Float(a), Self::Float(b)) => (a.is_nan() && b.is_nan()) || a == b,
			(Self::BigInt(a), Self::BigInt(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::Bytes(a), Self::Bytes(b)) => a == b,
			(Self::Date(a), Self::Date(b)) => a == b,
			(Self::Array(a), Self::Array(b)) | (Self::Set(a), Self::Set(b)) => a == b,
			(Self::Map(a), Self::Map(b)) => a == b,
			(Self::Record(a), Self::Record(b)) => {
				a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
			}
			(Self::Callable(a), Self::Callable(b)) => a == b,
			_ => false,
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<u16> for Value {
	fn from(value: u16) -> Self {
		Self::Int(value.into())
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<Vec<u8>> for Value {
	fn from(value: Vec<u8>) -> Self {
		Self::Bytes(value)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(value: DateTime<Utc>) -> Self {
		Self::Date(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Self::Array(value)
	}
}

impl From<IndexMap<String, Value>> for Value {
	fn from(value: IndexMap<String, Value>) -> Self {
		Self::Record(value)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// Plain JSON converts losslessly: objects become records.
impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Bool(b),
			serde_json::Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					Self::Int(i)
				} else if let Some(u) = n.as_u64() {
					Self::BigInt(u.into())
				} else {
					Self::Float(n.as_f64().unwrap_or(f64::NAN))
				}
			}
			serde_json::Value::String(s) => Self::String(s),
			serde_json::Value::Array(items) => Self::Array(items.into_iter().map(Into::into).collect()),
			serde_json::Value::Object(fields) => {
				Self::Record(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_nan_equals_itself() {
		assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
		assert_ne!(Value::Float(0.0), Value::Int(0));
	}

	#[rstest]
	fn test_record_equality_respects_order() {
		let a = Value::record([("a", Value::Int(1)), ("b", Value::Int(2))]);
		let b = Value::record([("b", Value::Int(2)), ("a", Value::Int(1))]);

		assert_ne!(a, b);
		assert_eq!(a, a.clone());
	}

	#[rstest]
	fn test_callables_compare_by_identity() {
		let f = Callable::new(|_| Value::Null);
		let g = Callable::new(|_| Value::Null);

		assert_eq!(Value::Callable(f.clone()), Value::Callable(f.clone()));
		assert_ne!(Value::Callable(f), Value::Callable(g));
	}

	#[rstest]
	fn test_from_json_object() {
		let json = serde_json::json!({ "x": 1, "big": u64::MAX, "ratio": 0.5, "tags": ["a"] });

		let value = Value::from(json);

		assert_eq!(value.get("x"), Some(&Value::Int(1)));
		assert_eq!(value.get("big"), Some(&Value::BigInt(u64::MAX.into())));
		assert_eq!(value.get("ratio"), Some(&Value::Float(0.5)));
		assert_eq!(value.get("tags"), Some(&Value::Array(vec![Value::from("a")])));
	}

	#[rstest]
	#[case(Value::Int(7), Some(7))]
	#[case(Value::Float(7.0), Some(7))]
	#[case(Value::Float(7.5), None)]
	#[case(Value::BigInt(1 << 70), None)]
	#[case(Value::from("7"), None)]
	fn test_as_i64(#[case] value: Value, #[case] expected: Option<i64>) {
		assert_eq!(value.as_i64(), expected);
	}
}
