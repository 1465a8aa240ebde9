//! The action registry.

use crate::handler::BoxedHandler;
use crate::loader::{LoadError, ModuleLoader};
use crate::module::CompiledModule;
use reinhardt_actions_core::{ActionId, FileId};
use std::collections::HashMap;
use std::fmt;

/// Registry key of an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
	pub file_id: FileId,
	pub action_id: ActionId,
}

impl ActionKey {
	pub fn new(file_id: FileId, action_id: ActionId) -> Self {
		Self { file_id, action_id }
	}
}

impl fmt::Display for ActionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.file_id, self.action_id)
	}
}

/// Every registered action, keyed by file id and action id.
///
/// Built once at startup and read-only afterwards.
#[derive(Default)]
pub struct ActionRegistry {
	entries: HashMap<ActionKey, BoxedHandler>,
}

impl ActionRegistry {
	/// Builds a registry from compiled modules.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_actions_core::{ActionId, CallContext, FileId};
	/// use reinhardt_actions_server::{ActionRegistry, CompiledModule, handler_fn};
	///
	/// let module = CompiledModule::new(FileId::from_static("0a1b2c3d"))
	/// 	.with_action(ActionId::from_static("4e5f6a7b"), handler_fn(|ctx: CallContext| async move { Ok(ctx.data) }));
	///
	/// let registry = ActionRegistry::from_modules([module]).unwrap();
	/// assert_eq!(registry.len(), 1);
	/// ```
	pub fn from_modules(modules: impl IntoIterator<Item = CompiledModule>) -> Result<Self, LoadError> {
		let mut registry = Self::default();
		for module in modules {
			registry.register_module(&module)?;
		}
		tracing::info!(actions = registry.len(), "action registry built");
		Ok(registry)
	}

	/// Loads every module the loader knows and builds a registry from them.
	pub async fn from_loader(loader: &dyn ModuleLoader) -> Result<Self, LoadError> {
		let mut modules = Vec::new();
		for file_id in loader.file_ids() {
			let module = loader.load(&file_id).await?;
			if module.file_id() != &file_id {
				return Err(LoadError::MismatchedModule {
					requested: file_id,
					found: module.file_id().clone(),
				});
			}
			modules.push(module);
		}
		Self::from_modules(modules)
	}

	fn register_module(&mut self, module: &CompiledModule) -> Result<(), LoadError> {
		for (action_id, handler) in module.actions() {
			let key = ActionKey::new(module.file_id().clone(), action_id.clone());
			if self.entries.contains_key(&key) {
				return Err(LoadError::DuplicateAction {
					file_id: key.file_id,
					action_id: key.action_id,
				});
			}
			tracing::debug!(action = %key, "registered action");
			self.entries.insert(key, handler.clone());
		}
		Ok(())
	}

	pub fn get(&self, key: &ActionKey) -> Option<&BoxedHandler> {
		self.entries.get(key)
	}

	pub fn contains(&self, key: &ActionKey) -> bool {
		self.entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for ActionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut keys: Vec<_> = self.entries.keys().map(ToString::to_string).collect();
		keys.sort();
		f.debug_struct("ActionRegistry").field("actions", &keys).finish()
	}
}
