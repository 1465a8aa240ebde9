//! Serve the build script's server output and call it through the client
//! output, so every request runs a hoisted implementation.

use reinhardt_actions::{
	Action, ActionClient, ActionRegistry, ActionRouter, ActionServer, CallAction, CallContext, ErrorKind,
	MARKER_HEADER, Value, create_action,
};
use reinhardt_actions_integration_tests::{client, server};
use rstest::{fixture, rstest};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::net::TcpListener;

struct Deployment {
	base_url: String,
	action_count: usize,
}

impl Deployment {
	fn client(&self) -> ActionClient {
		ActionClient::new().unwrap().with_base_url(&self.base_url).unwrap()
	}
}

#[fixture]
async fn deployment() -> Deployment {
	let registry = ActionRegistry::from_modules(server::compiled_modules()).unwrap();
	let action_count = registry.len();
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(ActionServer::new(ActionRouter::new(Arc::new(registry))).serve(listener));

	Deployment {
		base_url: format!("http://{addr}"),
		action_count,
	}
}

#[rstest]
#[tokio::test]
async fn test_every_generated_action_is_registered(#[future] deployment: Deployment) {
	let deployment = deployment.await;

	assert_eq!(deployment.action_count, 8);
	assert_eq!(server::compiled_modules().len(), 2);
}

#[rstest]
fn test_client_output_keeps_identity_and_debug_info() {
	let increment: &Action = &client::math::INCREMENT;

	assert_eq!(increment.function_name(), "INCREMENT");
	assert_eq!(increment.file_id(), client::math::VALIDATE.file_id());
	assert_ne!(increment.action_id(), client::math::VALIDATE.action_id());
	assert_ne!(increment.file_id(), client::jobs::PING.file_id());
	assert_eq!(client::math::heading(), "Math");
}

#[rstest]
#[tokio::test]
async fn test_increment_round_trip(#[future] deployment: Deployment) {
	// Arrange
	let deployment = deployment.await;

	// Act
	let output = client::math::INCREMENT
		.call_with(
			&deployment.client(),
			CallContext::new(Value::record([("x", Value::Int(1))])),
		)
		.await
		.unwrap();

	// Assert
	assert_eq!(output.value, Value::record([("y", Value::Int(2))]));
	let response = output.response.unwrap();
	assert_eq!(response.headers[MARKER_HEADER], "true");
}

#[rstest]
#[tokio::test]
async fn test_errors_are_rebuilt_on_the_calling_side(#[future] deployment: Deployment) {
	let deployment = deployment.await;

	let error = client::math::VALIDATE
		.call_with(&deployment.client(), CallContext::default())
		.await
		.unwrap_err();

	assert_eq!(error.kind(), ErrorKind::Application);
	assert_eq!(error.status(), 422);
	assert_eq!(error.key(), Some("E_BAD_INPUT"));
	assert_eq!(error.message(), "bad input");
	assert_eq!(error.data(), Some(&Value::record([("field", Value::from("x"))])));
}

#[rstest]
#[tokio::test]
async fn test_invalid_envelope_is_a_validation_error(#[future] deployment: Deployment) {
	let deployment = deployment.await;

	let error = client::math::LEAKY
		.call_with(&deployment.client(), CallContext::default())
		.await
		.unwrap_err();

	assert_eq!(error.kind(), ErrorKind::Validation);
	assert_eq!(error.status(), 400);
}

#[rstest]
#[case::named(Value::from("ada"), "hello ada")]
#[case::anonymous(Value::Null, "hello world")]
#[tokio::test]
async fn test_trait_import_survives_in_server_output(
	#[future] deployment: Deployment,
	#[case] data: Value,
	#[case] expected: &str,
) {
	let deployment = deployment.await;

	let output = client::math::GREET
		.call_with(&deployment.client(), CallContext::new(data))
		.await
		.unwrap();

	assert_eq!(output.value, Value::from(expected));
}

#[rstest]
#[tokio::test]
async fn test_qualified_call_is_served(#[future] deployment: Deployment) {
	let deployment = deployment.await;

	let output = client::jobs::PING
		.call_with(&deployment.client(), CallContext::default())
		.await
		.unwrap();

	assert_eq!(output.value, Value::from("pong"));
}

#[rstest]
#[tokio::test]
async fn test_call_from_inside_an_action_uses_the_inbound_origin(#[future] deployment: Deployment) {
	let deployment = deployment.await;

	let output = client::math::FORWARD
		.call_with(
			&deployment.client(),
			CallContext::new(Value::record([("x", Value::Int(41))])),
		)
		.await
		.unwrap();

	assert_eq!(output.value, Value::record([("y", Value::Int(42))]));
}

#[rstest]
#[tokio::test]
async fn test_nested_action_is_hosted_and_callable(#[future] deployment: Deployment) {
	let deployment = deployment.await;

	let output = client::math::TWICE
		.call_with(
			&deployment.client(),
			CallContext::new(Value::record([("x", Value::Int(21))])),
		)
		.await
		.unwrap();

	assert_eq!(output.value, Value::Int(42));
}

#[rstest]
#[tokio::test]
async fn test_unknown_action_is_not_found(#[future] deployment: Deployment) {
	let deployment = deployment.await;
	let mut descriptor = client::math::INCREMENT.descriptor().clone();
	descriptor.action_id = reinhardt_actions::ActionId::from_static("ffffffff");

	let error = deployment
		.client()
		.call(&create_action(descriptor), CallContext::default())
		.await
		.unwrap_err();

	assert_eq!(error.kind(), ErrorKind::NotFound);
	assert_eq!(error.status(), 404);
}

#[rstest]
#[tokio::test]
async fn test_get_is_method_not_allowed(#[future] deployment: Deployment) {
	let deployment = deployment.await;
	let action = &client::math::INCREMENT;
	let url = format!(
		"{}/api/action?a={}&f={}",
		deployment.base_url,
		action.action_id(),
		action.file_id()
	);

	let response = reqwest::get(url).await.unwrap();

	assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
	assert_eq!(response.headers()[MARKER_HEADER], "true");
}

#[rstest]
#[tokio::test]
async fn test_missing_endpoint_is_reported(#[future] deployment: Deployment) {
	let deployment = deployment.await;
	let mut descriptor = client::math::INCREMENT.descriptor().clone();
	descriptor.endpoint = Cow::Borrowed("/elsewhere");

	let error = deployment
		.client()
		.call(&create_action(descriptor), CallContext::default())
		.await
		.unwrap_err();

	assert_eq!(error.kind(), ErrorKind::EndpointMissing);
}
