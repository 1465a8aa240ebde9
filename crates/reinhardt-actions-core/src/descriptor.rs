//! Action descriptors and the `create_action` primitive.
//!
//! Source code declares an action by calling [`create_action`] with the
//! implementation. The build transform rewrites that call so it receives an
//! [`ActionDescriptor`] instead, and moves the implementation into a hoisted
//! server-side function. At runtime the resulting [`Action`] is only an
//! address: calling it goes through the client proxy.

use crate::error::{ActionError, ActionResult};
use crate::identity::{ActionId, FileId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "/api/action";

/// Field of a descriptor literal that marks a call site as already transformed.
pub const DESCRIPTOR_MARKER_FIELD: &str = "action_id";

/// Function name recorded for actions not bound to a name.
pub const ANONYMOUS_FUNCTION_NAME: &str = "[anonymous]";

/// Where an action was declared, for error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
	pub function_name: Cow<'static, str>,
	pub source_file: Cow<'static, str>,
	pub line: u32,
	pub column: u32,
}

impl DebugInfo {
	/// `file:line:column` of the declaration.
	pub fn location(&self) -> String {
		format!("{}:{}:{}", self.source_file, self.line, self.column)
	}
}

/// The address of an action, baked into transformed call sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
	pub action_id: ActionId,
	pub file_id: FileId,
	pub endpoint: Cow<'static, str>,
	pub debug: DebugInfo,
}

/// Client-side handle of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
	descriptor: ActionDescriptor,
}

impl Action {
	pub fn descriptor(&self) -> &ActionDescriptor {
		&self.descriptor
	}

	pub fn action_id(&self) -> &ActionId {
		&self.descriptor.action_id
	}

	pub fn file_id(&self) -> &FileId {
		&self.descriptor.file_id
	}

	pub fn endpoint(&self) -> &str {
		&self.descriptor.endpoint
	}

	pub fn function_name(&self) -> &str {
		&self.descriptor.debug.function_name
	}

	/// Builds an action from whatever reached the primitive at runtime.
	///
	/// Only a descriptor is valid. A raw implementation means the module was
	/// compiled without the build transform.
	pub fn from_config(config: ActionConfig) -> ActionResult<Self> {
		match config {
			ActionConfig::Descriptor(descriptor) => Ok(Self { descriptor }),
			ActionConfig::Callable { type_name } => Err(ActionError::configuration(format!(
				"`create_action` received the implementation `{type_name}` instead of a descriptor. \
				 Run the action build transform over this module."
			))),
		}
	}
}

/// What the action primitive received.
#[derive(Debug, Clone)]
pub enum ActionConfig {
	Descriptor(ActionDescriptor),
	/// An untransformed implementation.
	Callable { type_name: &'static str },
}

impl ActionConfig {
	/// Records an untransformed implementation by its type name.
	pub fn callable<F>(_implementation: &F) -> Self {
		Self::Callable {
			type_name: std::any::type_name::<F>(),
		}
	}
}

impl From<ActionDescriptor> for ActionConfig {
	fn from(descriptor: ActionDescriptor) -> Self {
		Self::Descriptor(descriptor)
	}
}

/// The action primitive, as it looks after the build transform.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::{ActionDescriptor, ActionId, DebugInfo, FileId, create_action};
/// use std::borrow::Cow;
///
/// static GET_USER: reinhardt_actions_core::Action = create_action(ActionDescriptor {
/// 	action_id: ActionId::from_static("1a2b3c4d"),
/// 	file_id: FileId::from_static("9f8e7d6c"),
/// 	endpoint: Cow::Borrowed("/api/action"),
/// 	debug: DebugInfo {
/// 		function_name: Cow::Borrowed("GET_USER"),
/// 		source_file: Cow::Borrowed("src/users.rs"),
/// 		line: 4,
/// 		column: 30,
/// 	},
/// });
///
/// assert_eq!(GET_USER.action_id().as_str(), "1a2b3c4d");
/// ```
pub const fn create_action(descriptor: ActionDescriptor) -> Action {
	Action { descriptor }
}

/// Fallible form of [`create_action`] for runtime-built configurations.
pub fn define_action(config: impl Into<ActionConfig>) -> ActionResult<Action> {
	Action::from_config(config.into())
}
