//! Reachability pruning.
//!
//! Each build target keeps a different part of an extracted module:
//!
//! - [`BuildTarget::Client`] roots are the module's exports, minus the
//!   hoisted implementations. Whatever only the implementations used goes
//!   away with them.
//! - [`BuildTarget::Server`] roots are the hoisted implementations and the
//!   action manifest. The original exports are not roots there.
//!
//! Pruning repeats until a pass removes nothing, so a declaration that only
//! became unused because another one was removed is caught as well.

use crate::extract::{MANIFEST_FN, is_hoisted_export};
use crate::graph::{Declaration, ModuleGraph, NodeId};
use crate::imports::retain_leaves;
use std::collections::BTreeSet;
use std::fmt;
use syn::{File, Item};

/// Which output a module is pruned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
	Client,
	Server,
}

impl fmt::Display for BuildTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Client => f.write_str("client"),
			Self::Server => f.write_str("server"),
		}
	}
}

impl BuildTarget {
	/// `true` when `declaration` must survive pruning for this target.
	pub fn is_root(self, declaration: &Declaration) -> bool {
		let binding = declaration.binding.as_deref();
		let generated = binding.is_some_and(|name| is_hoisted_export(name) || name == MANIFEST_FN);
		match self {
			Self::Client => declaration.exported && !generated,
			Self::Server => generated,
		}
	}
}

/// What a pruning run removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
	/// Passes run, including the final one that removed nothing.
	pub passes: usize,
	/// Descriptions of removed declarations, in removal order.
	pub removed: Vec<String>,
}

/// Removes every declaration unreachable from `target`'s roots.
pub fn prune_module(mut file: File, target: BuildTarget) -> (File, PruneReport) {
	let mut report = PruneReport::default();
	let mut trait_imports = None;
	loop {
		report.passes += 1;
		let graph = ModuleGraph::analyze(&file);
		// Only imports unreferenced before pruning count as trait imports.
		let trait_imports = trait_imports.get_or_insert_with(|| graph.trait_imports());
		let live = graph.live_set_with(|declaration| target.is_root(declaration), trait_imports);
		let dead: Vec<String> = graph
			.declarations()
			.iter()
			.filter(|declaration| !live.contains(&declaration.id))
			.map(Declaration::describe)
			.collect();
		if dead.is_empty() {
			break;
		}
		tracing::trace!(%target, pass = report.passes, removed = ?dead, "pruning pass");
		report.removed.extend(dead);
		file = rewrite_module(&file, &live);
	}
	(file, report)
}

/// Rebuilds `file` with only the nodes in `live`.
///
/// A `use` item keeps its live leaves and disappears when none is left.
pub fn rewrite_module(file: &File, live: &BTreeSet<NodeId>) -> File {
	let items = file
		.items
		.iter()
		.enumerate()
		.filter_map(|(index, item)| match item {
			Item::Use(item_use) => {
				let tree = retain_leaves(&item_use.tree, &mut |leaf| {
					live.contains(&NodeId {
						item: index,
						leaf: Some(leaf),
					})
				})?;
				let mut item_use = item_use.clone();
				item_use.tree = tree;
				Some(Item::Use(item_use))
			}
			item => live
				.contains(&NodeId { item: index, leaf: None })
				.then(|| item.clone()),
		})
		.collect();

	File {
		shebang: file.shebang.clone(),
		attrs: file.attrs.clone(),
		items,
	}
}

/// References of retained declarations that no retained declaration binds
/// any more. Empty for a correctly pruned module.
pub fn dangling_references(original: &File, pruned: &File) -> BTreeSet<String> {
	let before = ModuleGraph::analyze(original);
	let after = ModuleGraph::analyze(pruned);
	after
		.declarations()
		.iter()
		.flat_map(|declaration| declaration.references.iter())
		.filter(|name| before.is_bound(name) && !after.is_bound(name))
		.cloned()
		.collect()
}
