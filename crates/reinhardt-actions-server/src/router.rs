//! The action router.
//!
//! One inbound call moves through the phases of [`CallPhase`]:
//!
//! ```text
//! Received -> Parsed -> Resolved | NotFound
//!          -> MethodChecked | MethodRejected
//!          -> Invoked -> Succeeded | Failed -> Responded
//! ```
//!
//! Every response the router produces carries the marker header, so callers
//! can tell "unknown action" (404 with marker) from "no action endpoint here"
//! (404 without it).

use crate::registry::{ActionKey, ActionRegistry};
use crate::request::{parse_body, parse_query};
use bytes::Bytes;
use futures::FutureExt;
use http::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri};
use reinhardt_actions_core::{
	ActionError, CallContext, DEFAULT_ENDPOINT, MARKER_HEADER, MARKER_VALUE, RawResponse, ResponseEnvelope,
	TransportHandles, WireFailure, WireSuccess,
};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Status used when an action panics.
const PANIC_STATUS: u16 = 500;

/// Status sent for an error whose own status is not an error status.
const FALLBACK_ERROR_STATUS: StatusCode = StatusCode::BAD_REQUEST;

/// Phases of one call, as traced by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
	Received,
	Parsed,
	Resolved,
	NotFound,
	MethodChecked,
	MethodRejected,
	Invoked,
	Succeeded,
	Failed,
	Responded,
}

/// Resolves inbound calls against an [`ActionRegistry`] and runs them.
#[derive(Debug, Clone)]
pub struct ActionRouter {
	registry: Arc<ActionRegistry>,
	endpoint: String,
}

impl ActionRouter {
	pub fn new(registry: Arc<ActionRegistry>) -> Self {
		Self {
			registry,
			endpoint: DEFAULT_ENDPOINT.to_string(),
		}
	}

	/// Serves the endpoint at `endpoint`, a path or an absolute URL.
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint_path(&endpoint.into());
		self
	}

	/// Path the router is mounted on.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn registry(&self) -> &ActionRegistry {
		&self.registry
	}

	/// `true` when `uri` addresses this router's endpoint.
	pub fn matches(&self, uri: &Uri) -> bool {
		uri.path() == self.endpoint
	}

	/// Handles one call. Always produces exactly one response.
	pub async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
		let (parts, body) = request.into_parts();
		trace_phase(CallPhase::Received, None);

		let key = parse_query(&parts.uri);
		let call = match parse_body(&parts.headers, body).await {
			Ok(call) => call,
			Err(error) => return self.failure(&error, key.as_ref()),
		};
		trace_phase(CallPhase::Parsed, key.as_ref());
		if let Some(caller_debug) = &call.debug {
			tracing::debug!(caller = %caller_debug, "caller debug information");
		}

		let Some((key, handler)) = key.and_then(|key| self.registry.get(&key).cloned().map(|handler| (key, handler)))
		else {
			trace_phase(CallPhase::NotFound, None);
			let error = ActionError::not_found(format!("No action registered for `{}`.", parts.uri));
			return self.failure(&error, None);
		};
		trace_phase(CallPhase::Resolved, Some(&key));

		if parts.method != Method::POST {
			trace_phase(CallPhase::MethodRejected, Some(&key));
			let error = ActionError::method_not_allowed(format!(
				"Method {} is not allowed. Actions are called with POST.",
				parts.method
			));
			let mut response = self.failure(&error, Some(&key));
			response.headers_mut().insert(ALLOW, HeaderValue::from_static("POST"));
			return response;
		}
		trace_phase(CallPhase::MethodChecked, Some(&key));

		let transport = TransportHandles::new(parts.method, parts.uri, parts.headers.clone());
		let slot = transport.response.clone();
		let context = CallContext {
			data: call.data,
			headers: parts.headers,
			files: call.files,
			transport: Some(transport),
		};

		trace_phase(CallPhase::Invoked, Some(&key));
		let result = match AssertUnwindSafe(handler.invoke(context)).catch_unwind().await {
			Ok(result) => result,
			Err(panic) => Err(ActionError::new(panic_message(panic.as_ref())).with_status(PANIC_STATUS)),
		};

		if let Some(raw) = slot.take() {
			trace_phase(CallPhase::Responded, Some(&key));
			return raw_response(raw);
		}

		match result.and_then(ResponseEnvelope::from_value) {
			Ok(envelope) => {
				trace_phase(CallPhase::Succeeded, Some(&key));
				self.success(&envelope, &key)
			}
			Err(error) => {
				trace_phase(CallPhase::Failed, Some(&key));
				self.failure(&error, Some(&key))
			}
		}
	}

	/// Failure response for an error raised outside any action, such as an
	/// oversized body.
	pub fn error_response(&self, error: &ActionError) -> Response<Bytes> {
		self.failure(error, None)
	}

	fn success(&self, envelope: &ResponseEnvelope, key: &ActionKey) -> Response<Bytes> {
		let status = StatusCode::from_u16(envelope.status).unwrap_or(StatusCode::OK);
		let mut response = json_response(status, &WireSuccess::from(envelope));
		for (name, value) in &envelope.headers {
			match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
				(Ok(name), Ok(_)) if is_reserved(&name) => {
					tracing::debug!(action = %key, header = %name, "ignoring reserved envelope header");
				}
				(Ok(name), Ok(value)) => {
					response.headers_mut().insert(name, value);
				}
				_ => {
					let error = ActionError::validation(format!("Envelope header `{name}` is not a valid HTTP header."));
					return self.failure(&error, Some(key));
				}
			}
		}
		trace_phase(CallPhase::Responded, Some(key));
		response
	}

	fn failure(&self, error: &ActionError, key: Option<&ActionKey>) -> Response<Bytes> {
		match key {
			Some(key) => tracing::warn!(action = %key, status = error.status(), error = %error, "action call failed"),
			None => tracing::warn!(status = error.status(), error = %error, "action call failed"),
		}
		let status = error_status(error.status());
		let mut wire = WireFailure::from(error);
		wire.error.status = status.as_u16();
		let mut response = json_response(status, &wire);
		for (name, value) in error.headers().into_iter().flatten() {
			if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str()))
				&& !is_reserved(&name)
			{
				response.headers_mut().insert(name, value);
			}
		}
		trace_phase(CallPhase::Responded, key);
		response
	}
}

/// Path component of an endpoint given as a path or an absolute URL.
fn endpoint_path(endpoint: &str) -> String {
	if endpoint.starts_with('/') {
		return endpoint.to_string();
	}
	url::Url::parse(endpoint)
		.map(|url| url.path().to_string())
		.unwrap_or_else(|_| endpoint.to_string())
}

/// Headers the router owns on every response it builds.
fn is_reserved(name: &HeaderName) -> bool {
	name == CONTENT_TYPE || name == CONTENT_LENGTH || name == TRANSFER_ENCODING || name.as_str() == MARKER_HEADER
}

/// HTTP status for an error, falling back to 400 outside `400..=599`.
fn error_status(status: u16) -> StatusCode {
	StatusCode::from_u16(status)
		.ok()
		.filter(|status| status.is_client_error() || status.is_server_error())
		.unwrap_or(FALLBACK_ERROR_STATUS)
}

fn trace_phase(phase: CallPhase, key: Option<&ActionKey>) {
	match key {
		Some(key) => tracing::debug!(?phase, action = %key, "action call"),
		None => tracing::debug!(?phase, "action call"),
	}
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	let detail = panic
		.downcast_ref::<&str>()
		.map(|s| s.to_string())
		.or_else(|| panic.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "unknown panic".to_string());
	format!("Action panicked: {detail}")
}

fn marked(mut response: Response<Bytes>) -> Response<Bytes> {
	response
		.headers_mut()
		.insert(MARKER_HEADER, HeaderValue::from_static(MARKER_VALUE));
	response
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
	let mut response = match serde_json::to_vec(body) {
		Ok(json) => {
			let mut response = Response::new(Bytes::from(json));
			*response.status_mut() = status;
			response
		}
		Err(error) => {
			tracing::error!(%error, "failed to serialize action response");
			let mut response = Response::new(Bytes::from_static(b"{}"));
			*response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
			response
		}
	};
	response
		.headers_mut()
		.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	marked(response)
}

fn raw_response(raw: RawResponse) -> Response<Bytes> {
	let mut response = Response::new(raw.body);
	*response.status_mut() = raw.status;
	*response.headers_mut() = raw.headers;
	marked(response)
}
