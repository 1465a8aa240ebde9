//! # Reinhardt Actions Core
//!
//! Types shared by the build-time transform, the receiving router and the
//! calling proxy of isomorphic actions.
//!
//! ## Modules
//!
//! - [`identity`]: deterministic short hashes for modules and call sites
//! - [`value`]: the dynamic value model exchanged by actions
//! - [`codec`]: the envelope codec (tagged JSON)
//! - [`error`]: the runtime error taxonomy and its wire form
//! - [`descriptor`]: the descriptor baked into transformed call sites
//! - [`context`]: the per-call context handed to an action
//! - [`envelope`]: the response envelope and wire bodies
//! - [`settings`]: layered configuration
//!
//! ## Example
//!
//! ```
//! use reinhardt_actions_core::codec;
//! use reinhardt_actions_core::value::Value;
//!
//! let value = Value::record([("x", Value::Int(1))]);
//! let encoded = codec::encode(&value);
//! assert_eq!(encoded, r#"{"x":1}"#);
//! assert_eq!(codec::decode(&encoded).unwrap(), value);
//! ```

pub mod codec;
pub mod context;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod settings;
pub mod value;

pub use codec::CodecError;
pub use context::{CallContext, RawResponse, ResponseSlot, TransportHandles, UploadedFile};
pub use descriptor::{
	Action, ActionConfig, ActionDescriptor, DEFAULT_ENDPOINT, DESCRIPTOR_MARKER_FIELD, DebugInfo,
	create_action, define_action,
};
pub use envelope::{ResponseEnvelope, WireFailure, WireSuccess};
pub use error::{ActionError, ActionResult, ErrorKind, SerializedError};
pub use identity::{ActionId, FileId, short_hash};
pub use settings::{ActionsSettings, LoggingSettings, SettingsError};
pub use value::{Callable, Value};

/// Response header set on every response produced by an action endpoint.
pub const MARKER_HEADER: &str = "x-isomorphic-action";

/// Value of [`MARKER_HEADER`].
pub const MARKER_VALUE: &str = "true";

/// Query parameter carrying the action id.
pub const ACTION_QUERY_PARAM: &str = "a";

/// Query parameter carrying the file id.
pub const FILE_QUERY_PARAM: &str = "f";
