//! Compiled action modules.

use crate::handler::BoxedHandler;
use reinhardt_actions_core::{ActionId, FileId};
use std::fmt;

/// The actions of one server output, as returned by its
/// `__action_manifest()` function.
#[derive(Clone)]
pub struct CompiledModule {
	file_id: FileId,
	actions: Vec<(ActionId, BoxedHandler)>,
}

impl CompiledModule {
	pub fn new(file_id: FileId) -> Self {
		Self {
			file_id,
			actions: Vec::new(),
		}
	}

	pub fn with_action(mut self, action_id: ActionId, handler: BoxedHandler) -> Self {
		self.actions.push((action_id, handler));
		self
	}

	pub fn file_id(&self) -> &FileId {
		&self.file_id
	}

	pub fn actions(&self) -> impl Iterator<Item = (&ActionId, &BoxedHandler)> {
		self.actions.iter().map(|(id, handler)| (id, handler))
	}

	pub fn len(&self) -> usize {
		self.actions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}
}

impl fmt::Debug for CompiledModule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompiledModule")
			.field("file_id", &self.file_id)
			.field("actions", &self.actions.iter().map(|(id, _)| id).collect::<Vec<_>>())
			.finish()
	}
}
