//! Interpretation of endpoint responses.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use reinhardt_actions_core::{
	ActionError, ActionResult, ErrorKind, MARKER_HEADER, RawResponse, Value, WireFailure, WireSuccess,
};

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
	/// Decoded `data` of the response envelope.
	pub value: Value,
	/// The raw response, kept when the value is a record or when the action
	/// answered with a response of its own.
	pub response: Option<RawResponse>,
}

impl ActionOutput {
	pub fn into_value(self) -> Value {
		self.value
	}
}

/// Turns an endpoint response into the call's result.
///
/// - 2xx with a success body: the decoded value.
/// - an error body: the reconstructed [`ActionError`].
/// - 404 without the marker header: [`ErrorKind::EndpointMissing`].
/// - a marked 2xx/3xx without an envelope: a response the action wrote
///   itself, returned as is.
/// - anything else: [`ErrorKind::Transport`] with the status and body.
pub fn interpret(status: StatusCode, headers: HeaderMap, body: Bytes) -> ActionResult<ActionOutput> {
	let marked = headers.contains_key(MARKER_HEADER);
	let raw = RawResponse {
		status,
		headers,
		body,
	};

	if status == StatusCode::NOT_FOUND && !marked {
		return Err(ActionError::endpoint_missing(
			"The action endpoint was not found. Is the action router mounted at this endpoint?",
		));
	}

	if status.is_success()
		&& let Ok(success) = serde_json::from_slice::<WireSuccess>(&raw.body)
	{
		let value = success.decode_data()?;
		let response = value.is_record().then_some(raw);
		return Ok(ActionOutput { value, response });
	}

	if let Ok(failure) = serde_json::from_slice::<WireFailure>(&raw.body) {
		return Err(ActionError::from_serialized(failure.error));
	}

	if marked && (status.is_success() || status.is_redirection()) {
		return Ok(ActionOutput {
			value: Value::Undefined,
			response: Some(raw),
		});
	}

	let text = String::from_utf8_lossy(&raw.body).into_owned();
	Err(ActionError::transport(status.as_u16(), text))
}

/// `true` for errors that never reached an action.
pub fn is_transport_error(error: &ActionError) -> bool {
	matches!(error.kind(), ErrorKind::Transport | ErrorKind::EndpointMissing)
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::HeaderValue;
	use reinhardt_actions_core::{MARKER_VALUE, ResponseEnvelope, SerializedError};
	use rstest::rstest;

	fn marked() -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(MARKER_HEADER, HeaderValue::from_static(MARKER_VALUE));
		headers
	}

	#[rstest]
	fn test_success_record_keeps_raw_response() {
		let envelope = ResponseEnvelope::new(Value::record([("y", Value::Int(2))]));
		let body = serde_json::to_vec(&WireSuccess::from(&envelope)).unwrap();

		let output = interpret(StatusCode::OK, marked(), Bytes::from(body)).unwrap();

		assert_eq!(output.value, Value::record([("y", Value::Int(2))]));
		assert_eq!(output.response.map(|r| r.status), Some(StatusCode::OK));
	}

	#[rstest]
	fn test_success_scalar_has_no_raw_response() {
		let body = serde_json::to_vec(&WireSuccess::from(&ResponseEnvelope::new(Value::Int(3)))).unwrap();

		let output = interpret(StatusCode::OK, marked(), Bytes::from(body)).unwrap();

		assert_eq!(output.value, Value::Int(3));
		assert!(output.response.is_none());
	}

	#[rstest]
	fn test_error_envelope_is_reconstructed() {
		let failure = WireFailure {
			error: SerializedError {
				name: "ActionError".to_string(),
				message: "bad input".to_string(),
				stack: None,
				status: 422,
				key: Some("E_BAD_INPUT".to_string()),
				data: None,
				headers: None,
			},
		};
		let body = serde_json::to_vec(&failure).unwrap();

		let error = interpret(StatusCode::UNPROCESSABLE_ENTITY, marked(), Bytes::from(body)).unwrap_err();

		assert_eq!(error.status(), 422);
		assert_eq!(error.key(), Some("E_BAD_INPUT"));
		assert_eq!(error.message(), "bad input");
	}

	#[rstest]
	#[case::unmarked_404(StatusCode::NOT_FOUND, HeaderMap::new(), ErrorKind::EndpointMissing)]
	#[case::gateway(StatusCode::BAD_GATEWAY, HeaderMap::new(), ErrorKind::Transport)]
	#[case::unmarked_ok(StatusCode::OK, HeaderMap::new(), ErrorKind::Transport)]
	fn test_non_action_responses(#[case] status: StatusCode, #[case] headers: HeaderMap, #[case] kind: ErrorKind) {
		let error = interpret(status, headers, Bytes::from_static(b"<html>oops</html>")).unwrap_err();

		assert_eq!(error.kind(), kind);
		assert!(is_transport_error(&error));
	}

	#[rstest]
	fn test_transport_error_keeps_status() {
		let error = interpret(StatusCode::BAD_GATEWAY, HeaderMap::new(), Bytes::from_static(b"upstream")).unwrap_err();

		assert_eq!(error.status(), 502);
		assert!(error.message().contains("upstream"));
	}

	#[rstest]
	fn test_marked_redirect_is_returned() {
		let mut headers = marked();
		headers.insert(http::header::LOCATION, HeaderValue::from_static("/done"));

		let output = interpret(StatusCode::SEE_OTHER, headers, Bytes::new()).unwrap();

		assert_eq!(output.value, Value::Undefined);
		assert_eq!(output.response.unwrap().headers[http::header::LOCATION], "/done");
	}
}
