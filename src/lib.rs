//! # Reinhardt Actions
//!
//! Isomorphic actions: a function is declared once with [`create_action`] and
//! runs wherever it is hosted, while calls from the other side of the wire
//! are routed to it over HTTP.
//!
//! ## How it fits together
//!
//! 1. At build time, `reinhardt-actions-build` rewrites each `create_action`
//!    call into an [`ActionDescriptor`] and hoists the implementation into a
//!    `__action_<id>()` function. Each module is then pruned twice: the
//!    client output keeps the module's public surface without any
//!    implementation, the server output keeps only the implementations.
//! 2. At startup, the server outputs are collected into an
//!    [`ActionRegistry`] and served by an [`ActionRouter`].
//! 3. At call time, the client output calls the action through
//!    [`ActionClient`], which posts to the endpoint and rebuilds the result or
//!    the error.
//!
//! ## Feature Flags
//!
//! - `server` (default) - registry, router and the hyper endpoint
//! - `client` (default) - reqwest-based proxy
//! - `build` - the source transform, usually enabled for build scripts
//! - `full` - all of the above
//!
//! ## Example
//!
//! ```
//! # #[cfg(feature = "server")]
//! # {
//! use std::sync::Arc;
//! use reinhardt_actions::{ActionId, ActionRegistry, ActionRouter, CallContext, CompiledModule, FileId, Value, handler_fn};
//!
//! let module = CompiledModule::new(FileId::from_static("0a1b2c3d")).with_action(
//! 	ActionId::from_static("4e5f6a7b"),
//! 	handler_fn(|ctx: CallContext| async move { Ok(Value::record([("data", ctx.data)])) }),
//! );
//! let router = ActionRouter::new(Arc::new(ActionRegistry::from_modules([module]).unwrap()));
//! assert_eq!(router.registry().len(), 1);
//! # }
//! ```

pub mod logging;

pub use reinhardt_actions_core::{
	ACTION_QUERY_PARAM, Action, ActionConfig, ActionDescriptor, ActionError, ActionId, ActionResult,
	ActionsSettings, CallContext, Callable, CodecError, DEFAULT_ENDPOINT, DebugInfo, ErrorKind,
	FILE_QUERY_PARAM, FileId, LoggingSettings, MARKER_HEADER, MARKER_VALUE, RawResponse, ResponseEnvelope,
	ResponseSlot, SerializedError, SettingsError, TransportHandles, UploadedFile, Value, codec, create_action,
	define_action, settings, short_hash,
};

#[cfg(feature = "server")]
pub use reinhardt_actions_server::{
	ActionChain, ActionHandler, ActionKey, ActionMiddleware, ActionRegistry, ActionRouter, ActionServer,
	BoxedHandler, BoxedMiddleware, CallPhase, CompiledModule, LoadError, ModuleLoader, ServerError,
	StaticModuleLoader, handler_fn, middleware_fn,
};

#[cfg(feature = "client")]
pub use reinhardt_actions_client::{ActionClient, ActionOutput, CallAction, default_client};

/// The build-time transform.
#[cfg(feature = "build")]
pub mod build {
	pub use reinhardt_actions_build::*;
}

pub use logging::{LoggingError, init_logging};
