//! Parsing of inbound action calls.
//!
//! The action is addressed by the query string (`?a=<action id>&f=<file id>`);
//! its arguments travel in the body, either as `multipart/form-data` with the
//! fields `debug` and `data` plus any file parts, or as a JSON object
//! `{"debug": ..., "data": ...}`.

use crate::registry::ActionKey;
use bytes::Bytes;
use futures::future::ready;
use futures::stream::once;
use http::{HeaderMap, Uri};
use reinhardt_actions_core::{
	ACTION_QUERY_PARAM, ActionError, ActionId, ActionResult, FILE_QUERY_PARAM, FileId, UploadedFile, Value,
	codec,
};

/// Multipart field carrying the codec-encoded arguments.
pub const DATA_FIELD: &str = "data";

/// Multipart field carrying the caller's debug information.
pub const DEBUG_FIELD: &str = "debug";

/// Arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallBody {
	pub data: Value,
	/// Debug information sent by the caller; only logged.
	pub debug: Option<serde_json::Value>,
	pub files: Vec<UploadedFile>,
}

/// Reads the action key from the query string.
///
/// # Examples
///
/// ```
/// use http::Uri;
/// use reinhardt_actions_server::request::parse_query;
///
/// let key = parse_query(&Uri::from_static("/api/action?a=4e5f6a7b&f=0a1b2c3d")).unwrap();
/// assert_eq!(key.action_id.as_str(), "4e5f6a7b");
/// assert_eq!(key.file_id.as_str(), "0a1b2c3d");
///
/// assert!(parse_query(&Uri::from_static("/api/action?a=4e5f6a7b")).is_none());
/// ```
pub fn parse_query(uri: &Uri) -> Option<ActionKey> {
	let query = uri.query()?;
	let mut action_id = None;
	let mut file_id = None;
	for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
		match name.as_ref() {
			ACTION_QUERY_PARAM => action_id = Some(ActionId::new(value.into_owned())),
			FILE_QUERY_PARAM => file_id = Some(FileId::new(value.into_owned())),
			_ => {}
		}
	}
	Some(ActionKey::new(file_id?, action_id?))
}

/// Parses the request body according to its content type.
///
/// An empty body is a call with `null` data.
pub async fn parse_body(headers: &HeaderMap, body: Bytes) -> ActionResult<CallBody> {
	if body.is_empty() {
		return Ok(CallBody {
			data: Value::Null,
			..CallBody::default()
		});
	}

	let content_type = headers
		.get(http::header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default();
	let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

	match essence.as_str() {
		"multipart/form-data" => parse_multipart(content_type, body).await,
		"application/json" => parse_json(&body),
		other => Err(ActionError::validation(format!(
			"Unsupported content type `{other}`. Send multipart/form-data or application/json."
		))),
	}
}

async fn parse_multipart(content_type: &str, body: Bytes) -> ActionResult<CallBody> {
	let boundary = multer::parse_boundary(content_type)
		.map_err(|e| ActionError::validation(format!("Failed to parse boundary: {e}")))?;
	let stream = once(ready(Ok::<_, std::io::Error>(body)));
	let mut multipart = multer::Multipart::new(stream, boundary);

	let mut call = CallBody {
		data: Value::Null,
		..CallBody::default()
	};
	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|e| ActionError::validation(format!("Failed to read multipart field: {e}")))?
	{
		let name = field.name().unwrap_or_default().to_string();

		if let Some(file_name) = field.file_name() {
			let file_name = file_name.to_string();
			let content_type = field.content_type().map(ToString::to_string);
			let bytes = field
				.bytes()
				.await
				.map_err(|e| ActionError::validation(format!("Failed to read file `{file_name}`: {e}")))?;
			call.files.push(UploadedFile {
				field_name: name,
				file_name,
				content_type,
				bytes,
			});
			continue;
		}

		let text = field
			.text()
			.await
			.map_err(|e| ActionError::validation(format!("Failed to read field `{name}`: {e}")))?;
		match name.as_str() {
			DATA_FIELD => call.data = codec::decode(&text)?,
			DEBUG_FIELD => call.debug = serde_json::from_str(&text).ok(),
			_ => tracing::debug!(field = %name, "ignoring unknown multipart field"),
		}
	}
	Ok(call)
}

fn parse_json(body: &[u8]) -> ActionResult<CallBody> {
	let json: serde_json::Value = serde_json::from_slice(body)
		.map_err(|e| ActionError::validation(format!("Request body is not valid JSON: {e}")))?;
	let serde_json::Value::Object(mut fields) = json else {
		return Err(ActionError::validation("Request body must be a JSON object."));
	};

	// A string is codec text; anything else is an already parsed wire tree.
	let data = match fields.remove(DATA_FIELD) {
		None => Value::Null,
		Some(serde_json::Value::String(text)) => codec::decode(&text)?,
		Some(tree) => codec::from_wire_json(tree)?,
	};
	Ok(CallBody {
		data,
		debug: fields.remove(DEBUG_FIELD),
		files: Vec::new(),
	})
}
