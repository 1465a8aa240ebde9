//! `use` tree helpers.
//!
//! A `use` item is a tree; the pruner treats each of its leaves as a
//! separate declaration. Leaves are numbered in depth-first order, and
//! [`flatten`] and [`retain_leaves`] agree on that numbering.

use crate::options::TransformOptions;
use proc_macro2::Span;
use std::collections::BTreeSet;
use syn::punctuated::Punctuated;
use syn::{File, Item, ItemUse, UseTree};

/// What a leaf binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
	/// `path::name`, binding `name`.
	Name,
	/// `path::name as alias`, binding `alias` (nothing for `as _`).
	Rename(String),
	/// `path::*`.
	Glob,
}

/// One leaf of a `use` tree.
#[derive(Debug, Clone)]
pub struct UseLeaf {
	/// Segments leading to the leaf, including a leading `::` as `""`.
	pub prefix: Vec<String>,
	/// Imported name (`*` for globs, `self` for `path::{self}`).
	pub name: String,
	pub kind: LeafKind,
	pub span: Span,
}

impl UseLeaf {
	/// Local name bound by the leaf.
	pub fn binding(&self) -> Option<String> {
		match &self.kind {
			LeafKind::Glob => None,
			LeafKind::Rename(alias) if alias == "_" => None,
			LeafKind::Rename(alias) => Some(alias.clone()),
			LeafKind::Name if self.name == "self" => self.prefix.last().cloned(),
			LeafKind::Name => Some(self.name.clone()),
		}
	}

	/// First real path segment, usually the crate the leaf comes from.
	pub fn root_segment(&self) -> Option<&str> {
		self.prefix
			.iter()
			.chain(std::iter::once(&self.name))
			.map(String::as_str)
			.find(|segment| !segment.is_empty())
	}

	/// The imported item's own name, before any renaming.
	pub fn imported_name(&self) -> &str {
		if self.name == "self" {
			self.prefix.last().map(String::as_str).unwrap_or("self")
		} else {
			&self.name
		}
	}
}

/// Flattens a `use` item into its leaves.
pub fn flatten(item: &ItemUse) -> Vec<UseLeaf> {
	let mut leaves = Vec::new();
	let mut prefix = Vec::new();
	if item.leading_colon.is_some() {
		prefix.push(String::new());
	}
	collect(&item.tree, &mut prefix, &mut leaves);
	leaves
}

fn collect(tree: &UseTree, prefix: &mut Vec<String>, leaves: &mut Vec<UseLeaf>) {
	match tree {
		UseTree::Path(path) => {
			prefix.push(path.ident.to_string());
			collect(&path.tree, prefix, leaves);
			prefix.pop();
		}
		UseTree::Name(name) => leaves.push(UseLeaf {
			prefix: prefix.clone(),
			name: name.ident.to_string(),
			kind: LeafKind::Name,
			span: name.ident.span(),
		}),
		UseTree::Rename(rename) => leaves.push(UseLeaf {
			prefix: prefix.clone(),
			name: rename.ident.to_string(),
			kind: LeafKind::Rename(rename.rename.to_string()),
			span: rename.rename.span(),
		}),
		UseTree::Glob(glob) => leaves.push(UseLeaf {
			prefix: prefix.clone(),
			name: "*".to_string(),
			kind: LeafKind::Glob,
			span: glob.star_token.spans[0],
		}),
		UseTree::Group(group) => {
			for item in &group.items {
				collect(item, prefix, leaves);
			}
		}
	}
}

/// Rebuilds a `use` tree keeping only the leaves for which `keep` returns
/// `true`. Returns `None` when no leaf is left.
pub fn retain_leaves(tree: &UseTree, keep: &mut dyn FnMut(usize) -> bool) -> Option<UseTree> {
	let mut index = 0;
	retain(tree, keep, &mut index)
}

fn retain(tree: &UseTree, keep: &mut dyn FnMut(usize) -> bool, index: &mut usize) -> Option<UseTree> {
	match tree {
		UseTree::Path(path) => {
			let inner = retain(&path.tree, keep, index)?;
			let mut path = path.clone();
			path.tree = Box::new(inner);
			Some(UseTree::Path(path))
		}
		UseTree::Name(_) | UseTree::Rename(_) | UseTree::Glob(_) => {
			let current = *index;
			*index += 1;
			keep(current).then(|| tree.clone())
		}
		UseTree::Group(group) => {
			let mut items = Punctuated::new();
			for item in &group.items {
				if let Some(kept) = retain(item, keep, index) {
					items.push(kept);
				}
			}
			if items.is_empty() {
				return None;
			}
			let mut group = group.clone();
			group.items = items;
			Some(UseTree::Group(group))
		}
	}
}

/// Local names under which the action primitive is imported.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_build::imports::primitive_aliases;
/// use reinhardt_actions_build::TransformOptions;
///
/// let file = syn::parse_file(
/// 	"use reinhardt_actions::{Action, create_action as action};",
/// ).unwrap();
/// let aliases = primitive_aliases(&file, &TransformOptions::default());
/// assert!(aliases.contains("action"));
/// ```
pub fn primitive_aliases(file: &File, options: &TransformOptions) -> BTreeSet<String> {
	file.items
		.iter()
		.filter_map(|item| match item {
			Item::Use(item) => Some(item),
			_ => None,
		})
		.flat_map(flatten)
		.filter_map(|leaf| {
			let from_primitive_crate = leaf
				.root_segment()
				.is_some_and(|root| options.primitive_crates.iter().any(|c| c == root));
			if !from_primitive_crate {
				return None;
			}
			match leaf.kind {
				// `use reinhardt_actions::*;` brings the primitive in under its own name.
				LeafKind::Glob if leaf.prefix.iter().filter(|s| !s.is_empty()).count() == 1 => {
					Some(options.primitive_name.clone())
				}
				_ if leaf.imported_name() == options.primitive_name => leaf.binding(),
				_ => None,
			}
		})
		.collect()
}

/// Names the primitive crates are reachable under: the crates themselves
/// and any `use reinhardt_actions as alias;` bindings.
pub fn primitive_crate_names(file: &File, options: &TransformOptions) -> BTreeSet<String> {
	let aliases = file
		.items
		.iter()
		.filter_map(|item| match item {
			Item::Use(item) => Some(item),
			_ => None,
		})
		.flat_map(flatten)
		.filter(|leaf| {
			leaf.prefix.iter().all(String::is_empty)
				&& options.primitive_crates.iter().any(|c| c == leaf.imported_name())
		})
		.filter_map(|leaf| leaf.binding());
	options.primitive_crates.iter().cloned().chain(aliases).collect()
}

/// Root segments of every import in the module, deduplicated.
pub fn module_dependencies(file: &File) -> Vec<String> {
	let roots: BTreeSet<String> = file
		.items
		.iter()
		.filter_map(|item| match item {
			Item::Use(item) => Some(item),
			_ => None,
		})
		.flat_map(flatten)
		.filter_map(|leaf| leaf.root_segment().map(str::to_string))
		.collect();
	roots.into_iter().collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use quote::ToTokens;
	use rstest::rstest;

	fn parse_use(source: &str) -> ItemUse {
		syn::parse_str(source).unwrap()
	}

	#[rstest]
	fn test_flatten_grouped_tree() {
		let item = parse_use("use a::{b, c::{d as e, *}, self};");

		let leaves = flatten(&item);

		let bindings: Vec<_> = leaves.iter().map(UseLeaf::binding).collect();
		assert_eq!(
			bindings,
			vec![Some("b".to_string()), Some("e".to_string()), None, Some("a".to_string())]
		);
		assert_eq!(leaves[1].imported_name(), "d");
	}

	#[rstest]
	fn test_retain_drops_empty_groups() {
		let item = parse_use("use a::{b, c::{d, e}};");

		let kept = retain_leaves(&item.tree, &mut |index| index == 0).unwrap();

		assert_eq!(kept.to_token_stream().to_string(), "a :: { b }");
		assert!(retain_leaves(&item.tree, &mut |_| false).is_none());
	}

	#[rstest]
	#[case("use reinhardt_actions::create_action;", Some("create_action"))]
	#[case("use ::reinhardt_actions::create_action as make;", Some("make"))]
	#[case("use reinhardt_actions::{Value, create_action};", Some("create_action"))]
	#[case("use other::create_action;", None)]
	#[case("use reinhardt_actions::create_action as _;", None)]
	#[case("use reinhardt_actions::*;", Some("create_action"))]
	#[case("use reinhardt_actions::codec::*;", None)]
	fn test_primitive_aliases(#[case] source: &str, #[case] expected: Option<&str>) {
		let file = syn::parse_file(source).unwrap();

		let aliases = primitive_aliases(&file, &TransformOptions::default());

		assert_eq!(aliases.iter().next().map(String::as_str), expected);
	}

	#[rstest]
	fn test_primitive_crate_names() {
		let file = syn::parse_file("use reinhardt_actions as actions;\nuse other as unrelated;").unwrap();

		let names = primitive_crate_names(&file, &TransformOptions::default());

		assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["actions", "reinhardt_actions"]);
	}

	#[rstest]
	fn test_module_dependencies() {
		let file = syn::parse_file("use serde::Serialize;\nuse crate::db::{Pool, query};\nuse ::tokio::sync;").unwrap();

		assert_eq!(module_dependencies(&file), vec!["crate", "serde", "tokio"]);
	}
}
