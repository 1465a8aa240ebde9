//! Per-call context handed to an action.

use crate::value::Value;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use std::sync::Arc;

/// A file sent along with a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
	pub field_name: String,
	pub file_name: String,
	pub content_type: Option<String>,
	pub bytes: Bytes,
}

impl UploadedFile {
	pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
		Self {
			field_name: "files".to_string(),
			file_name: file_name.into(),
			content_type: None,
			bytes: bytes.into(),
		}
	}

	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());
		self
	}
}

/// A response written directly by an action, bypassing the envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl RawResponse {
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}
}

/// Holds at most one response for the current call.
///
/// Clones share the slot. The first [`ResponseSlot::respond`] wins; later
/// attempts are rejected so a call is answered exactly once.
#[derive(Debug, Clone, Default)]
pub struct ResponseSlot {
	inner: Arc<Mutex<SlotState>>,
}

#[derive(Debug, Default)]
enum SlotState {
	#[default]
	Empty,
	Filled(RawResponse),
	Taken,
}

impl ResponseSlot {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `response` unless one was already written.
	///
	/// Returns the rejected response when the slot is not empty.
	pub fn respond(&self, response: RawResponse) -> Result<(), RawResponse> {
		let mut state = self.inner.lock();
		match *state {
			SlotState::Empty => {
				*state = SlotState::Filled(response);
				Ok(())
			}
			_ => Err(response),
		}
	}

	/// Removes the stored response. The slot stays closed afterwards.
	pub fn take(&self) -> Option<RawResponse> {
		let mut state = self.inner.lock();
		match std::mem::replace(&mut *state, SlotState::Taken) {
			SlotState::Filled(response) => Some(response),
			SlotState::Empty | SlotState::Taken => None,
		}
	}

	pub fn is_filled(&self) -> bool {
		matches!(*self.inner.lock(), SlotState::Filled(_))
	}
}

/// The inbound request of the endpoint that is serving the current call.
#[derive(Debug, Clone)]
pub struct TransportHandles {
	pub method: Method,
	pub uri: Uri,
	pub headers: HeaderMap,
	pub response: ResponseSlot,
}

impl TransportHandles {
	pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
		Self {
			method,
			uri,
			headers,
			response: ResponseSlot::new(),
		}
	}

	/// `scheme://host` of the inbound request, when a host is known.
	///
	/// The scheme comes from `X-Forwarded-Proto` when present, then from the
	/// request URI, and defaults to `http`.
	pub fn origin(&self) -> Option<String> {
		let host = self
			.headers
			.get(http::header::HOST)
			.and_then(|value| value.to_str().ok())
			.map(str::to_string)
			.or_else(|| self.uri.authority().map(|authority| authority.to_string()))?;
		let scheme = self
			.headers
			.get("x-forwarded-proto")
			.and_then(|value| value.to_str().ok())
			.map(str::to_string)
			.or_else(|| self.uri.scheme_str().map(str::to_string))
			.unwrap_or_else(|| "http".to_string());
		Some(format!("{scheme}://{host}"))
	}
}

/// Everything an action receives for one call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
	pub data: Value,
	pub headers: HeaderMap,
	pub files: Vec<UploadedFile>,
	/// Present when the call is served by, or issued from inside, an action
	/// endpoint.
	pub transport: Option<TransportHandles>,
}

impl CallContext {
	pub fn new(data: impl Into<Value>) -> Self {
		Self {
			data: data.into(),
			..Self::default()
		}
	}

	pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn with_file(mut self, file: UploadedFile) -> Self {
		self.files.push(file);
		self
	}

	pub fn with_transport(mut self, transport: TransportHandles) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Writes a raw response for the current call.
	///
	/// Fails when the call is not served by an endpoint or a response was
	/// already written.
	pub fn respond(&self, response: RawResponse) -> Result<(), RawResponse> {
		match &self.transport {
			Some(transport) => transport.response.respond(response),
			None => Err(response),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::HeaderValue;
	use rstest::rstest;

	#[rstest]
	fn test_slot_accepts_one_response() {
		let slot = ResponseSlot::new();
		let shared = slot.clone();

		assert!(shared.respond(RawResponse::new(StatusCode::CREATED)).is_ok());
		assert!(slot.respond(RawResponse::new(StatusCode::OK)).is_err());
		assert_eq!(slot.take().map(|r| r.status), Some(StatusCode::CREATED));
		assert!(slot.take().is_none());
		assert!(slot.respond(RawResponse::new(StatusCode::OK)).is_err());
	}

	#[rstest]
	fn test_respond_without_transport_is_rejected() {
		let context = CallContext::new(Value::Null);

		assert!(context.respond(RawResponse::new(StatusCode::OK)).is_err());
	}

	#[rstest]
	#[case(None, "http://app.test")]
	#[case(Some("https"), "https://app.test")]
	fn test_origin(#[case] forwarded: Option<&'static str>, #[case] expected: &str) {
		let mut headers = HeaderMap::new();
		headers.insert(http::header::HOST, HeaderValue::from_static("app.test"));
		if let Some(proto) = forwarded {
			headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));
		}

		let handles = TransportHandles::new(Method::POST, Uri::from_static("/api/action"), headers);

		assert_eq!(handles.origin().as_deref(), Some(expected));
	}
}
