//! Action handlers and middleware chains.
//!
//! Hoisted action implementations are plain async closures. The build output
//! wraps them with [`handler_fn`] and, for actions declared with several
//! functions, chains the leading ones in front of the last one with
//! [`ActionChain`].

use async_trait::async_trait;
use reinhardt_actions_core::{ActionResult, CallContext, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A registered action implementation.
#[async_trait]
pub trait ActionHandler: Send + Sync {
	async fn invoke(&self, context: CallContext) -> ActionResult<Value>;
}

/// Blanket implementation for `Arc<T>` where T: ActionHandler
#[async_trait]
impl<T: ActionHandler + ?Sized> ActionHandler for Arc<T> {
	async fn invoke(&self, context: CallContext) -> ActionResult<Value> {
		(**self).invoke(context).await
	}
}

pub type BoxedHandler = Arc<dyn ActionHandler>;

/// A function placed in front of an action's handler.
///
/// A middleware either returns a result itself or hands the (possibly
/// modified) context on to `next`.
#[async_trait]
pub trait ActionMiddleware: Send + Sync {
	async fn process(&self, context: CallContext, next: BoxedHandler) -> ActionResult<Value>;
}

pub type BoxedMiddleware = Arc<dyn ActionMiddleware>;

/// [`ActionHandler`] over an async closure.
pub struct FnHandler<F, Fut> {
	f: F,
	_future: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F, Fut>
where
	F: Fn(CallContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ActionResult<Value>> + Send + 'static,
{
	async fn invoke(&self, context: CallContext) -> ActionResult<Value> {
		(self.f)(context).await
	}
}

/// Boxes an async closure as a handler.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::{CallContext, Value};
/// use reinhardt_actions_server::handler_fn;
///
/// let handler = handler_fn(|ctx: CallContext| async move {
/// 	Ok(Value::record([("data", ctx.data)]))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> BoxedHandler
where
	F: Fn(CallContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ActionResult<Value>> + Send + 'static,
{
	Arc::new(FnHandler {
		f,
		_future: PhantomData,
	})
}

/// [`ActionMiddleware`] over an async closure.
pub struct FnMiddleware<F, Fut> {
	f: F,
	_future: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> ActionMiddleware for FnMiddleware<F, Fut>
where
	F: Fn(CallContext, BoxedHandler) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ActionResult<Value>> + Send + 'static,
{
	async fn process(&self, context: CallContext, next: BoxedHandler) -> ActionResult<Value> {
		(self.f)(context, next).await
	}
}

/// Boxes an async closure as a middleware.
pub fn middleware_fn<F, Fut>(f: F) -> BoxedMiddleware
where
	F: Fn(CallContext, BoxedHandler) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ActionResult<Value>> + Send + 'static,
{
	Arc::new(FnMiddleware {
		f,
		_future: PhantomData,
	})
}

/// A handler preceded by middleware.
///
/// Middleware runs in the order it is added; the handler runs last.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::{CallContext, Value};
/// use reinhardt_actions_server::{ActionChain, handler_fn, middleware_fn};
///
/// let chain = ActionChain::new(handler_fn(|ctx: CallContext| async move { Ok(ctx.data) }))
/// 	.with_middleware(middleware_fn(|ctx: CallContext, next| async move { next.invoke(ctx).await }))
/// 	.boxed();
/// # let _ = chain;
/// ```
pub struct ActionChain {
	middlewares: Vec<BoxedMiddleware>,
	handler: BoxedHandler,
}

impl ActionChain {
	pub fn new(handler: BoxedHandler) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	pub fn with_middleware(mut self, middleware: BoxedMiddleware) -> Self {
		self.middlewares.push(middleware);
		self
	}

	/// Composes the chain into a single handler.
	pub fn boxed(self) -> BoxedHandler {
		let mut handler = self.handler;
		for middleware in self.middlewares.into_iter().rev() {
			handler = Arc::new(Layer { middleware, next: handler });
		}
		handler
	}
}

/// A middleware bound to the handler after it.
struct Layer {
	middleware: BoxedMiddleware,
	next: BoxedHandler,
}

#[async_trait]
impl ActionHandler for Layer {
	async fn invoke(&self, context: CallContext) -> ActionResult<Value> {
		self.middleware.process(context, self.next.clone()).await
	}
}
