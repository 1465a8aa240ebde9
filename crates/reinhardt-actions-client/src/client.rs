//! The action client proxy.

use crate::response::{ActionOutput, interpret};
use http::HeaderMap;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use reinhardt_actions_core::{
	ACTION_QUERY_PARAM, Action, ActionError, ActionResult, ActionsSettings, CallContext, ErrorKind,
	FILE_QUERY_PARAM, codec,
};
use reqwest::multipart::{Form, Part};
use url::Url;

/// Headers of the inbound request that are never forwarded.
const NOT_FORWARDED: [http::HeaderName; 5] = [CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING];

/// Calls actions over HTTP.
///
/// # Examples
///
/// ```no_run
/// use reinhardt_actions_client::ActionClient;
/// use reinhardt_actions_core::{Action, CallContext, Value};
///
/// # async fn example(action: &Action) -> reinhardt_actions_core::ActionResult<()> {
/// let client = ActionClient::new()?.with_base_url("http://localhost:3000")?;
/// let output = client.call(action, CallContext::new(Value::record([("x", Value::Int(1))]))).await?;
/// println!("{:?}", output.value);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ActionClient {
	http: reqwest::Client,
	base_url: Option<Url>,
}

impl ActionClient {
	/// Creates a client that does not follow redirects, so a redirect an
	/// action answers with reaches the caller.
	pub fn new() -> ActionResult<Self> {
		let http = reqwest::Client::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(|e| ActionError::from_source(ErrorKind::Configuration, e))?;
		Ok(Self::with_http_client(http))
	}

	pub fn with_http_client(http: reqwest::Client) -> Self {
		Self { http, base_url: None }
	}

	/// Origin relative endpoints are resolved against when the call is not
	/// made from inside another action call.
	pub fn with_base_url(mut self, base_url: &str) -> ActionResult<Self> {
		let url = Url::parse(base_url)
			.map_err(|e| ActionError::configuration(format!("Invalid base URL `{base_url}`: {e}")))?;
		self.base_url = Some(url);
		Ok(self)
	}

	pub fn from_settings(settings: &ActionsSettings) -> ActionResult<Self> {
		let client = Self::new()?;
		match &settings.base_url {
			Some(base_url) => client.with_base_url(base_url),
			None => Ok(client),
		}
	}

	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// URL a call to `action` is sent to, query included.
	pub fn resolve_url(&self, action: &Action, context: &CallContext) -> ActionResult<Url> {
		let endpoint = action.endpoint();
		let mut url = match Url::parse(endpoint) {
			Ok(url) => url,
			Err(url::ParseError::RelativeUrlWithoutBase) => {
				let origin = match context.transport.as_ref().and_then(|transport| transport.origin()) {
					Some(origin) => Url::parse(&origin)
						.map_err(|e| ActionError::configuration(format!("Invalid request origin `{origin}`: {e}")))?,
					None => self.base_url.clone().ok_or_else(|| {
						ActionError::configuration(format!(
							"Cannot resolve the relative endpoint `{endpoint}` of action `{}` without a base URL.",
							action.function_name()
						))
					})?,
				};
				origin
					.join(endpoint)
					.map_err(|e| ActionError::configuration(format!("Invalid endpoint `{endpoint}`: {e}")))?
			}
			Err(e) => return Err(ActionError::configuration(format!("Invalid endpoint `{endpoint}`: {e}"))),
		};
		url.query_pairs_mut()
			.append_pair(ACTION_QUERY_PARAM, action.action_id().as_str())
			.append_pair(FILE_QUERY_PARAM, action.file_id().as_str());
		Ok(url)
	}

	/// Headers sent with a call: the inbound request's headers when the call
	/// is made from inside another call, overridden by the context's own.
	pub fn outgoing_headers(context: &CallContext) -> HeaderMap {
		let mut headers = HeaderMap::new();
		if let Some(transport) = &context.transport {
			for (name, value) in &transport.headers {
				if !NOT_FORWARDED.contains(name) {
					headers.append(name.clone(), value.clone());
				}
			}
		}
		for name in context.headers.keys() {
			headers.remove(name);
		}
		for (name, value) in &context.headers {
			headers.append(name.clone(), value.clone());
		}
		headers
	}

	fn form(action: &Action, context: &CallContext) -> ActionResult<Form> {
		let debug = serde_json::to_string(&action.descriptor().debug)
			.map_err(|e| ActionError::from_source(ErrorKind::Validation, e))?;
		let mut form = Form::new()
			.text("debug", debug)
			.text("data", codec::encode(&context.data));
		for (index, file) in context.files.iter().enumerate() {
			let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
			if let Some(content_type) = &file.content_type {
				part = part.mime_str(content_type).map_err(|e| {
					ActionError::validation(format!("Invalid content type `{content_type}` for `{}`: {e}", file.file_name))
				})?;
			}
			form = form.part(format!("files[{index}]"), part);
		}
		Ok(form)
	}

	/// Calls `action` with `context`.
	///
	/// Transport failures surface as [`ErrorKind::Transport`] with the
	/// underlying error as source. Nothing is retried.
	pub async fn call(&self, action: &Action, context: CallContext) -> ActionResult<ActionOutput> {
		let url = self.resolve_url(action, &context)?;
		let form = Self::form(action, &context)?;
		tracing::debug!(
			action = action.function_name(),
			location = %action.descriptor().debug.location(),
			%url,
			"calling action"
		);

		let response = self
			.http
			.post(url)
			.headers(Self::outgoing_headers(&context))
			.multipart(form)
			.send()
			.await
			.map_err(|e| ActionError::from_source(ErrorKind::Transport, e))?;

		let status = response.status();
		let headers = response.headers().clone();
		let body = response
			.bytes()
			.await
			.map_err(|e| ActionError::from_source(ErrorKind::Transport, e).with_status(status.as_u16()))?;

		let result = interpret(status, headers, body);
		if let Err(error) = &result {
			tracing::warn!(action = action.function_name(), status = error.status(), error = %error, "action call failed");
		}
		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::{HeaderValue, Method, Uri};
	use reinhardt_actions_core::{ActionDescriptor, ActionId, DebugInfo, FileId, TransportHandles, create_action};
	use rstest::{fixture, rstest};
	use std::borrow::Cow;

	fn action(endpoint: &'static str) -> Action {
		create_action(ActionDescriptor {
			action_id: ActionId::from_static("4e5f6a7b"),
			file_id: FileId::from_static("0a1b2c3d"),
			endpoint: Cow::Borrowed(endpoint),
			debug: DebugInfo {
				function_name: Cow::Borrowed("GET_USER"),
				source_file: Cow::Borrowed("src/users.rs"),
				line: 3,
				column: 30,
			},
		})
	}

	#[fixture]
	fn client() -> ActionClient {
		ActionClient::new().unwrap().with_base_url("http://base.test").unwrap()
	}

	fn inbound(host: &'static str) -> TransportHandles {
		let mut headers = HeaderMap::new();
		headers.insert(HOST, HeaderValue::from_static(host));
		headers.insert("cookie", HeaderValue::from_static("session=1"));
		headers.insert("x-request-id", HeaderValue::from_static("inbound"));
		TransportHandles::new(Method::POST, Uri::from_static("/page"), headers)
	}

	#[rstest]
	fn test_relative_endpoint_uses_base_url(client: ActionClient) {
		let url = client.resolve_url(&action("/api/action"), &CallContext::default()).unwrap();

		assert_eq!(url.as_str(), "http://base.test/api/action?a=4e5f6a7b&f=0a1b2c3d");
	}

	#[rstest]
	fn test_relative_endpoint_uses_inbound_origin(client: ActionClient) {
		let context = CallContext::default().with_transport(inbound("app.test:8080"));

		let url = client.resolve_url(&action("/api/action"), &context).unwrap();

		assert_eq!(url.as_str(), "http://app.test:8080/api/action?a=4e5f6a7b&f=0a1b2c3d");
	}

	#[rstest]
	fn test_absolute_endpoint_is_kept(client: ActionClient) {
		let url = client
			.resolve_url(&action("https://rpc.test/actions"), &CallContext::default())
			.unwrap();

		assert_eq!(url.host_str(), Some("rpc.test"));
		assert_eq!(url.path(), "/actions");
	}

	#[rstest]
	fn test_relative_endpoint_without_origin_is_a_configuration_error() {
		let client = ActionClient::new().unwrap();

		let error = client.resolve_url(&action("/api/action"), &CallContext::default()).unwrap_err();

		assert_eq!(error.kind(), ErrorKind::Configuration);
	}

	#[rstest]
	fn test_inbound_headers_are_merged_under_caller_headers() {
		let context = CallContext::default()
			.with_transport(inbound("app.test"))
			.with_header(http::HeaderName::from_static("x-request-id"), HeaderValue::from_static("caller"));

		let headers = ActionClient::outgoing_headers(&context);

		assert_eq!(headers["cookie"], "session=1");
		assert_eq!(headers["x-request-id"], "caller");
		assert_eq!(headers.get_all("x-request-id").iter().count(), 1);
		assert!(!headers.contains_key(HOST));
	}
}
