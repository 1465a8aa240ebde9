//! Exercises the endpoint server over a real socket.

use reinhardt_actions_core::{ActionId, CallContext, FileId, MARKER_HEADER, Value};
use reinhardt_actions_server::{ActionRegistry, ActionRouter, ActionServer, CompiledModule, handler_fn};
use rstest::rstest;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn spawn_server(max_body_size: usize) -> SocketAddr {
	let module = CompiledModule::new(FileId::from_static("0a1b2c3d")).with_action(
		ActionId::from_static("4e5f6a7b"),
		handler_fn(|ctx: CallContext| async move { Ok(Value::record([("data", ctx.data)])) }),
	);
	let registry = ActionRegistry::from_modules([module]).unwrap();
	let server = ActionServer::new(ActionRouter::new(Arc::new(registry))).with_max_body_size(max_body_size);
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(server.serve(listener));
	addr
}

async fn send(addr: SocketAddr, path: &str, body: &str) -> String {
	let mut stream = TcpStream::connect(addr).await.unwrap();
	let request = format!(
		"POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
		body.len()
	);
	stream.write_all(request.as_bytes()).await.unwrap();
	let mut response = String::new();
	stream.read_to_string(&mut response).await.unwrap();
	response.to_ascii_lowercase()
}

#[rstest]
#[tokio::test]
async fn test_other_paths_are_plain_404() {
	let addr = spawn_server(1024).await;

	let response = send(addr, "/somewhere/else", "{}").await;

	assert!(response.starts_with("http/1.1 404"));
	assert!(!response.contains(MARKER_HEADER));
}

#[rstest]
#[tokio::test]
async fn test_endpoint_answers_with_marker() {
	let addr = spawn_server(1024).await;

	let response = send(addr, "/api/action?a=4e5f6a7b&f=0a1b2c3d", r#"{"data":"7"}"#).await;

	assert!(response.starts_with("http/1.1 200"));
	assert!(response.contains(&format!("{MARKER_HEADER}: true")));
	assert!(response.contains(r#""data":"7""#));
}

#[rstest]
#[tokio::test]
async fn test_oversized_body_is_rejected() {
	let addr = spawn_server(16).await;

	let response = send(addr, "/api/action?a=4e5f6a7b&f=0a1b2c3d", r#"{"data":"\"a long string value\""}"#).await;

	assert!(response.starts_with("http/1.1 413"));
	assert!(response.contains(MARKER_HEADER));
}
