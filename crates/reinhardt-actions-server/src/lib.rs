//! # Reinhardt Actions Server
//!
//! Receiving side of isomorphic actions.
//!
//! Server outputs produced by `reinhardt-actions-build` expose one
//! `__action_manifest()` per module, returning a [`CompiledModule`]. Those
//! modules are gathered into an [`ActionRegistry`], which an [`ActionRouter`]
//! resolves calls against. [`ActionServer`] exposes the router over HTTP.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use reinhardt_actions_core::{ActionId, CallContext, FileId, Value};
//! use reinhardt_actions_server::{ActionRegistry, ActionRouter, CompiledModule, handler_fn};
//!
//! let module = CompiledModule::new(FileId::from_static("0a1b2c3d")).with_action(
//! 	ActionId::from_static("4e5f6a7b"),
//! 	handler_fn(|ctx: CallContext| async move { Ok(Value::record([("data", ctx.data)])) }),
//! );
//! let registry = ActionRegistry::from_modules([module]).unwrap();
//! let router = ActionRouter::new(Arc::new(registry));
//! assert_eq!(router.endpoint(), "/api/action");
//! ```

pub mod handler;
pub mod loader;
pub mod module;
pub mod registry;
pub mod request;
pub mod router;
pub mod server;

pub use handler::{
	ActionChain, ActionHandler, ActionMiddleware, BoxedHandler, BoxedMiddleware, FnHandler, FnMiddleware,
	handler_fn, middleware_fn,
};
pub use loader::{LoadError, ModuleLoader, StaticModuleLoader};
pub use module::CompiledModule;
pub use registry::{ActionKey, ActionRegistry};
pub use request::CallBody;
pub use router::{ActionRouter, CallPhase};
pub use server::{ActionServer, ServerError};
