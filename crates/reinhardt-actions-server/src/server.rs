//! HTTP/1 server exposing a single action endpoint.

use crate::registry::ActionRegistry;
use crate::router::ActionRouter;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use reinhardt_actions_core::{ActionError, ActionsSettings};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Default request body limit.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("Invalid bind address `{0}`")]
	InvalidAddress(String),

	#[error("Failed to bind {addr}: {source}")]
	Bind {
		addr: SocketAddr,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to accept a connection: {0}")]
	Accept(#[source] std::io::Error),

	#[error("Connection error: {0}")]
	Connection(#[from] hyper::Error),
}

/// Serves one [`ActionRouter`] over HTTP/1.
///
/// Requests to any path other than the router's endpoint get a plain 404
/// without the marker header.
pub struct ActionServer {
	router: Arc<ActionRouter>,
	max_body_size: usize,
}

impl ActionServer {
	pub fn new(router: ActionRouter) -> Self {
		Self {
			router: Arc::new(router),
			max_body_size: DEFAULT_MAX_BODY_SIZE,
		}
	}

	/// Builds a server for `registry` configured from `settings`.
	pub fn from_settings(registry: Arc<ActionRegistry>, settings: &ActionsSettings) -> Self {
		Self::new(ActionRouter::new(registry).with_endpoint(settings.endpoint.clone()))
			.with_max_body_size(settings.max_body_size)
	}

	pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
		self.max_body_size = max_body_size;
		self
	}

	pub fn router(&self) -> &ActionRouter {
		&self.router
	}

	/// Binds `addr` and serves until an accept error.
	pub async fn listen(self, addr: SocketAddr) -> Result<(), ServerError> {
		let listener = TcpListener::bind(addr)
			.await
			.map_err(|source| ServerError::Bind { addr, source })?;
		self.serve(listener).await
	}

	/// Binds the address configured in `settings`.
	pub async fn listen_with_settings(self, settings: &ActionsSettings) -> Result<(), ServerError> {
		let addr: SocketAddr = settings
			.bind_address
			.parse()
			.map_err(|_| ServerError::InvalidAddress(settings.bind_address.clone()))?;
		self.listen(addr).await
	}

	pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
		self.serve_with_shutdown(listener, std::future::pending()).await
	}

	/// Serves until `shutdown` resolves. Connections already accepted keep
	/// running on their own tasks.
	pub async fn serve_with_shutdown(
		self,
		listener: TcpListener,
		shutdown: impl Future<Output = ()>,
	) -> Result<(), ServerError> {
		if let Ok(addr) = listener.local_addr() {
			tracing::info!(%addr, endpoint = self.router.endpoint(), "action server listening");
		}
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				result = listener.accept() => {
					let (stream, remote_addr) = result.map_err(ServerError::Accept)?;
					let router = self.router.clone();
					let max_body_size = self.max_body_size;
					tokio::task::spawn(async move {
						if let Err(error) = Self::handle_connection(stream, router, max_body_size).await {
							tracing::debug!(%remote_addr, %error, "connection closed with error");
						}
					});
				}
				_ = &mut shutdown => {
					tracing::info!("action server shutting down");
					return Ok(());
				}
			}
		}
	}

	pub async fn handle_connection(
		stream: TcpStream,
		router: Arc<ActionRouter>,
		max_body_size: usize,
	) -> Result<(), ServerError> {
		let io = TokioIo::new(stream);
		let service = RequestService { router, max_body_size };
		http1::Builder::new().serve_connection(io, service).await?;
		Ok(())
	}
}

/// Service implementation for hyper
struct RequestService {
	router: Arc<ActionRouter>,
	max_body_size: usize,
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = Infallible;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let router = self.router.clone();
		let max_body_size = self.max_body_size;

		Box::pin(async move {
			if !router.matches(req.uri()) {
				let mut response = hyper::Response::new(Full::new(Bytes::from_static(b"Not Found")));
				*response.status_mut() = http::StatusCode::NOT_FOUND;
				return Ok(response);
			}

			let (parts, body) = req.into_parts();
			let body = match Limited::new(body, max_body_size).collect().await {
				Ok(collected) => collected.to_bytes(),
				Err(error) => {
					let error = ActionError::validation(format!("Failed to read request body: {error}"))
						.with_status(http::StatusCode::PAYLOAD_TOO_LARGE.as_u16());
					return Ok(router.error_response(&error).map(Full::new));
				}
			};

			let response = router.handle(hyper::Request::from_parts(parts, body)).await;
			Ok(response.map(Full::new))
		})
	}
}
