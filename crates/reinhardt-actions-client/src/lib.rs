//! # Reinhardt Actions Client
//!
//! Calling side of isomorphic actions. A transformed call site holds an
//! [`Action`] whose descriptor names the endpoint and the action's
//! identities; [`ActionClient::call`] sends the call there and turns the
//! answer back into a value or an [`ActionError`](reinhardt_actions_core::ActionError)
//! with the same status, key and data the action raised.
//!
//! ## Example
//!
//! ```no_run
//! use reinhardt_actions_client::CallAction;
//! use reinhardt_actions_core::{Action, CallContext, Value};
//!
//! # async fn example(get_user: &Action) -> reinhardt_actions_core::ActionResult<()> {
//! let user = get_user.invoke(CallContext::new(Value::Int(7))).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod response;

pub use client::ActionClient;
pub use response::{ActionOutput, interpret, is_transport_error};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reinhardt_actions_core::{Action, ActionError, ActionResult, ActionsSettings, CallContext, ErrorKind, Value};

static DEFAULT_CLIENT: OnceCell<ActionClient> = OnceCell::new();

/// Client used by [`CallAction`], configured from the environment on first
/// use.
pub fn default_client() -> ActionResult<&'static ActionClient> {
	DEFAULT_CLIENT.get_or_try_init(|| {
		let settings = ActionsSettings::load(None).map_err(|e| ActionError::from_source(ErrorKind::Configuration, e))?;
		ActionClient::from_settings(&settings)
	})
}

/// Calling an [`Action`] directly.
#[async_trait]
pub trait CallAction {
	/// Calls the action with the default client and returns its value.
	async fn invoke(&self, context: CallContext) -> ActionResult<Value>;

	/// Calls the action with `client`.
	async fn call_with(&self, client: &ActionClient, context: CallContext) -> ActionResult<ActionOutput>;
}

#[async_trait]
impl CallAction for Action {
	async fn invoke(&self, context: CallContext) -> ActionResult<Value> {
		let client = default_client()?;
		Ok(client.call(self, context).await?.into_value())
	}

	async fn call_with(&self, client: &ActionClient, context: CallContext) -> ActionResult<ActionOutput> {
		client.call(self, context).await
	}
}
