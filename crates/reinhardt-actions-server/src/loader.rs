//! Access to compiled modules by file id.

use crate::module::CompiledModule;
use async_trait::async_trait;
use reinhardt_actions_core::{ActionId, FileId};
use std::collections::BTreeMap;

/// Errors raised while loading modules or building a registry from them.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("No compiled module for file id `{0}`")]
	UnknownModule(FileId),

	#[error("Module `{requested}` resolved to a module with file id `{found}`")]
	MismatchedModule { requested: FileId, found: FileId },

	#[error("Action `{action_id}` is registered twice for file id `{file_id}`")]
	DuplicateAction { file_id: FileId, action_id: ActionId },

	#[error("Failed to load module `{file_id}`: {source}")]
	Failed {
		file_id: FileId,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},
}

/// Returns the compiled server output for a file id.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
	async fn load(&self, file_id: &FileId) -> Result<CompiledModule, LoadError>;

	/// Every file id this loader can resolve.
	fn file_ids(&self) -> Vec<FileId>;
}

/// A loader over modules linked into the binary.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::{ActionId, CallContext, FileId};
/// use reinhardt_actions_server::{CompiledModule, ModuleLoader, StaticModuleLoader, handler_fn};
///
/// let module = CompiledModule::new(FileId::from_static("0a1b2c3d"))
/// 	.with_action(ActionId::from_static("4e5f6a7b"), handler_fn(|ctx: CallContext| async move { Ok(ctx.data) }));
/// let loader = StaticModuleLoader::new([module]);
/// assert_eq!(loader.file_ids(), vec![FileId::from_static("0a1b2c3d")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticModuleLoader {
	modules: BTreeMap<FileId, CompiledModule>,
}

impl StaticModuleLoader {
	pub fn new(modules: impl IntoIterator<Item = CompiledModule>) -> Self {
		Self {
			modules: modules
				.into_iter()
				.map(|module| (module.file_id().clone(), module))
				.collect(),
		}
	}
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
	async fn load(&self, file_id: &FileId) -> Result<CompiledModule, LoadError> {
		self.modules
			.get(file_id)
			.cloned()
			.ok_or_else(|| LoadError::UnknownModule(file_id.clone()))
	}

	fn file_ids(&self) -> Vec<FileId> {
		self.modules.keys().cloned().collect()
	}
}
