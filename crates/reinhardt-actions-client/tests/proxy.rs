//! Client calls against a live action server.

use reinhardt_actions_client::{ActionClient, CallAction};
use reinhardt_actions_core::{
	Action, ActionDescriptor, ActionId, CallContext, DebugInfo, ErrorKind, FileId, UploadedFile, Value,
	create_action,
};
use reinhardt_actions_server::{ActionRegistry, ActionRouter, ActionServer, CompiledModule, handler_fn};
use rstest::rstest;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::net::TcpListener;

const FILE: FileId = FileId::from_static("0a1b2c3d");

fn action(id: &'static str, endpoint: &'static str) -> Action {
	create_action(ActionDescriptor {
		action_id: ActionId::from_static(id),
		file_id: FILE,
		endpoint: Cow::Borrowed(endpoint),
		debug: DebugInfo {
			function_name: Cow::Borrowed("upload"),
			source_file: Cow::Borrowed("src/files.rs"),
			line: 1,
			column: 0,
		},
	})
}

async fn spawn_server() -> String {
	let module = CompiledModule::new(FILE)
		.with_action(
			ActionId::from_static("00000001"),
			handler_fn(|ctx: CallContext| async move {
				let names: Vec<Value> = ctx
					.files
					.iter()
					.map(|file| Value::from(format!("{}:{}", file.file_name, file.bytes.len())))
					.collect();
				let token = ctx
					.headers
					.get("x-token")
					.and_then(|value| value.to_str().ok())
					.map(str::to_string);
				Ok(Value::record([(
					"data",
					Value::record([("files", Value::Array(names)), ("token", Value::from(token))]),
				)]))
			}),
		)
		.with_action(
			ActionId::from_static("00000002"),
			handler_fn(|ctx: CallContext| async move { Ok(Value::record([("data", ctx.data)])) }),
		);
	let registry = ActionRegistry::from_modules([module]).unwrap();
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(ActionServer::new(ActionRouter::new(Arc::new(registry))).serve(listener));
	format!("http://{addr}")
}

#[rstest]
#[tokio::test]
async fn test_files_and_headers_reach_the_action() {
	// Arrange
	let base = spawn_server().await;
	let client = ActionClient::new().unwrap().with_base_url(&base).unwrap();
	let context = CallContext::new(Value::Null)
		.with_header(http::HeaderName::from_static("x-token"), http::HeaderValue::from_static("t1"))
		.with_file(UploadedFile::new("a.txt", &b"hello"[..]).with_content_type("text/plain"));

	// Act
	let output = action("00000001", "/api/action").call_with(&client, context).await.unwrap();

	// Assert
	assert_eq!(
		output.value,
		Value::record([
			("files", Value::Array(vec![Value::from("a.txt:5")])),
			("token", Value::from("t1")),
		])
	);
	assert!(output.response.is_some());
}

#[rstest]
#[tokio::test]
async fn test_codec_values_survive_the_trip() {
	let base = spawn_server().await;
	let client = ActionClient::new().unwrap().with_base_url(&base).unwrap();
	let data = Value::record([
		("big", Value::BigInt(1 << 80)),
		("bytes", Value::Bytes(vec![0, 255])),
		("set", Value::Set(vec![Value::Int(1), Value::Int(2)])),
		("missing", Value::Undefined),
	]);

	let output = client
		.call(&action("00000002", "/api/action"), CallContext::new(data.clone()))
		.await
		.unwrap();

	assert_eq!(output.value, data);
}

#[rstest]
#[tokio::test]
async fn test_wrong_endpoint_is_endpoint_missing() {
	let base = spawn_server().await;
	let client = ActionClient::new().unwrap().with_base_url(&base).unwrap();

	let error = client
		.call(&action("00000002", "/not/mounted"), CallContext::default())
		.await
		.unwrap_err();

	assert_eq!(error.kind(), ErrorKind::EndpointMissing);
}

#[rstest]
#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);
	let client = ActionClient::new().unwrap().with_base_url(&format!("http://{addr}")).unwrap();

	let error = client
		.call(&action("00000002", "/api/action"), CallContext::default())
		.await
		.unwrap_err();

	assert_eq!(error.kind(), ErrorKind::Transport);
	assert!(std::error::Error::source(&error).is_some());
}
