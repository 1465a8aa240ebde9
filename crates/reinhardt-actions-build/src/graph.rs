//! Module dependency graph.
//!
//! Nodes are the module's top-level items, with `use` items split into one
//! node per leaf. An edge goes from a node to every node binding an
//! identifier that appears anywhere in its tokens. Macro bodies and format
//! strings are scanned too, so the graph over-approximates real references:
//! a name the compiler would resolve elsewhere may keep a declaration alive,
//! but a declaration that is used is never left unreachable.
//!
//! Trait imports are used without their name appearing (`s.write_str(..)`,
//! `i64::from_str(..)`). A named `use` leaf that nothing in the module refers
//! to is therefore a possible trait import, kept whenever a live node uses
//! method-call syntax, a path call or a macro.

use crate::imports::{LeafKind, flatten};
use proc_macro2::{Delimiter, Spacing, TokenStream, TokenTree};
use quote::ToTokens;
use std::collections::{BTreeSet, HashMap, VecDeque};
use syn::{File, Item, Type, Visibility};

/// Identifies a node: an item, or one leaf of a `use` item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
	pub item: usize,
	pub leaf: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	Fn,
	Static,
	Const,
	Struct,
	Enum,
	Union,
	TypeAlias,
	Trait,
	TraitAlias,
	MacroRules,
	MacroCall,
	Use,
	Impl,
	Mod,
	ExternCrate,
	ForeignMod,
	Other,
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
	pub id: NodeId,
	pub kind: NodeKind,
	/// Name bound in the module namespace.
	pub binding: Option<String>,
	/// Part of the module's public surface.
	pub exported: bool,
	/// Identifiers used by the declaration.
	pub references: BTreeSet<String>,
	/// Type an `impl` block belongs to.
	pub anchor: Option<String>,
	/// Kept regardless of roots.
	pub always_live: bool,
	/// Contains a method call, a path call or a macro invocation, any of
	/// which may rely on a trait import.
	pub calls_methods: bool,
}

impl Declaration {
	fn new(id: NodeId, kind: NodeKind) -> Self {
		Self {
			id,
			kind,
			binding: None,
			exported: false,
			references: BTreeSet::new(),
			anchor: None,
			always_live: false,
			calls_methods: false,
		}
	}

	/// Short description for logs.
	pub fn describe(&self) -> String {
		match &self.binding {
			Some(name) => format!("{:?} `{name}`", self.kind),
			None => format!("{:?} #{}", self.kind, self.id.item),
		}
	}
}

/// Declarations of a module and the names they bind.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
	declarations: Vec<Declaration>,
	bindings: HashMap<String, Vec<usize>>,
	anchored: HashMap<String, Vec<usize>>,
}

impl ModuleGraph {
	/// Builds the graph of `file`. Pure: the file is not modified.
	pub fn analyze(file: &File) -> Self {
		let mut declarations = Vec::new();
		for (index, item) in file.items.iter().enumerate() {
			match item {
				Item::Use(item_use) => {
					let exported = is_exported(&item_use.vis);
					for (leaf_index, leaf) in flatten(item_use).into_iter().enumerate() {
						let mut declaration = Declaration::new(
							NodeId {
								item: index,
								leaf: Some(leaf_index),
							},
							NodeKind::Use,
						);
						declaration.binding = leaf.binding();
						declaration.exported = exported;
						declaration.references = leaf
							.prefix
							.iter()
							.filter(|segment| !segment.is_empty())
							.cloned()
							.collect();
						declaration.always_live = matches!(leaf.kind, LeafKind::Glob) || leaf.binding().is_none();
						declarations.push(declaration);
					}
				}
				item => declarations.push(item_declaration(index, item)),
			}
		}

		let mut bindings: HashMap<String, Vec<usize>> = HashMap::new();
		for (position, declaration) in declarations.iter().enumerate() {
			if let Some(name) = &declaration.binding {
				bindings.entry(name.clone()).or_default().push(position);
			}
		}

		// Impls of types declared elsewhere cannot be tied to a local node.
		let mut anchored: HashMap<String, Vec<usize>> = HashMap::new();
		for (position, declaration) in declarations.iter_mut().enumerate() {
			if declaration.kind != NodeKind::Impl {
				continue;
			}
			match &declaration.anchor {
				Some(anchor) if bindings.contains_key(anchor) => {
					anchored.entry(anchor.clone()).or_default().push(position);
				}
				_ => declaration.always_live = true,
			}
		}

		Self {
			declarations,
			bindings,
			anchored,
		}
	}

	pub fn declarations(&self) -> &[Declaration] {
		&self.declarations
	}

	/// Declarations binding `name`.
	pub fn bound(&self, name: &str) -> impl Iterator<Item = &Declaration> {
		self.bindings
			.get(name)
			.into_iter()
			.flatten()
			.map(|&position| &self.declarations[position])
	}

	pub fn is_bound(&self, name: &str) -> bool {
		self.bindings.contains_key(name)
	}

	/// Names bound by `use` leaves that no declaration refers to.
	pub fn trait_imports(&self) -> BTreeSet<String> {
		let referenced: BTreeSet<&String> = self
			.declarations
			.iter()
			.flat_map(|declaration| declaration.references.iter())
			.collect();
		self.declarations
			.iter()
			.filter(|declaration| declaration.kind == NodeKind::Use)
			.filter_map(|declaration| declaration.binding.as_ref())
			.filter(|name| !referenced.contains(name))
			.cloned()
			.collect()
	}

	/// Nodes reachable from the roots selected by `is_root` and from
	/// always-live nodes.
	pub fn live_set(&self, is_root: impl Fn(&Declaration) -> bool) -> BTreeSet<NodeId> {
		self.live_set_with(is_root, &self.trait_imports())
	}

	/// Like [`ModuleGraph::live_set`], with the possible trait imports given
	/// by name. Pruning passes use the names found in the unpruned module.
	pub fn live_set_with(
		&self,
		is_root: impl Fn(&Declaration) -> bool,
		trait_imports: &BTreeSet<String>,
	) -> BTreeSet<NodeId> {
		let mut visited = vec![false; self.declarations.len()];
		let mut queue: VecDeque<usize> = self
			.declarations
			.iter()
			.enumerate()
			.filter(|(_, declaration)| declaration.always_live || is_root(declaration))
			.map(|(position, _)| position)
			.collect();
		let mut traits_added = false;

		loop {
			while let Some(position) = queue.pop_front() {
				if std::mem::replace(&mut visited[position], true) {
					continue;
				}
				let declaration = &self.declarations[position];
				for name in &declaration.references {
					if let Some(targets) = self.bindings.get(name) {
						queue.extend(targets.iter().copied().filter(|&t| !visited[t]));
					}
				}
				if let Some(name) = &declaration.binding
					&& let Some(impls) = self.anchored.get(name)
				{
					queue.extend(impls.iter().copied().filter(|&t| !visited[t]));
				}
			}

			let calls_methods = self
				.declarations
				.iter()
				.zip(&visited)
				.any(|(declaration, live)| *live && declaration.calls_methods);
			if traits_added || !calls_methods {
				break;
			}
			traits_added = true;
			queue.extend(
				self.declarations
					.iter()
					.enumerate()
					.filter(|(position, declaration)| {
						!visited[*position]
							&& declaration.kind == NodeKind::Use
							&& declaration
								.binding
								.as_ref()
								.is_some_and(|name| trait_imports.contains(name))
					})
					.map(|(position, _)| position),
			);
		}

		self.declarations
			.iter()
			.zip(visited)
			.filter(|(_, live)| *live)
			.map(|(declaration, _)| declaration.id)
			.collect()
	}
}

fn is_exported(vis: &Visibility) -> bool {
	!matches!(vis, Visibility::Inherited)
}

fn item_declaration(index: usize, item: &Item) -> Declaration {
	let id = NodeId { item: index, leaf: None };
	let (kind, binding, vis) = match item {
		Item::Fn(item) => (NodeKind::Fn, Some(&item.sig.ident), Some(&item.vis)),
		Item::Static(item) => (NodeKind::Static, Some(&item.ident), Some(&item.vis)),
		Item::Const(item) => (NodeKind::Const, Some(&item.ident), Some(&item.vis)),
		Item::Struct(item) => (NodeKind::Struct, Some(&item.ident), Some(&item.vis)),
		Item::Enum(item) => (NodeKind::Enum, Some(&item.ident), Some(&item.vis)),
		Item::Union(item) => (NodeKind::Union, Some(&item.ident), Some(&item.vis)),
		Item::Type(item) => (NodeKind::TypeAlias, Some(&item.ident), Some(&item.vis)),
		Item::Trait(item) => (NodeKind::Trait, Some(&item.ident), Some(&item.vis)),
		Item::TraitAlias(item) => (NodeKind::TraitAlias, Some(&item.ident), Some(&item.vis)),
		Item::Mod(item) => (NodeKind::Mod, Some(&item.ident), Some(&item.vis)),
		Item::ExternCrate(item) => (
			NodeKind::ExternCrate,
			Some(item.rename.as_ref().map_or(&item.ident, |(_, rename)| rename)),
			Some(&item.vis),
		),
		Item::Macro(item) if item.ident.is_some() => (NodeKind::MacroRules, item.ident.as_ref(), None),
		Item::Macro(_) => (NodeKind::MacroCall, None, None),
		Item::Impl(_) => (NodeKind::Impl, None, None),
		Item::ForeignMod(_) => (NodeKind::ForeignMod, None, None),
		_ => (NodeKind::Other, None, None),
	};

	let mut declaration = Declaration::new(id, kind);
	declaration.binding = binding.map(ToString::to_string);
	declaration.exported = match item {
		Item::Macro(item) => item.attrs.iter().any(|attr| attr.path().is_ident("macro_export")),
		_ => vis.is_some_and(is_exported),
	};
	let tokens = item.to_token_stream();
	declaration.calls_methods = uses_method_syntax(tokens.clone());
	declaration.references = collect_identifiers(tokens);
	if let Some(name) = &declaration.binding {
		declaration.references.remove(name);
	}
	if let Item::Impl(item_impl) = item {
		declaration.anchor = type_anchor(&item_impl.self_ty);
	}
	declaration.always_live = matches!(
		kind,
		NodeKind::MacroCall | NodeKind::Mod | NodeKind::ExternCrate | NodeKind::ForeignMod | NodeKind::Other
	) || (kind == NodeKind::Fn && declaration.binding.as_deref() == Some("main"));
	declaration
}

/// Name of the type an `impl` block is for.
fn type_anchor(ty: &Type) -> Option<String> {
	match ty {
		Type::Path(path) if path.qself.is_none() => path.path.segments.last().map(|s| s.ident.to_string()),
		Type::Reference(reference) => type_anchor(&reference.elem),
		Type::Paren(paren) => type_anchor(&paren.elem),
		Type::Group(group) => type_anchor(&group.elem),
		_ => None,
	}
}

/// Every identifier in `tokens`, including names captured by format strings
/// such as `"{value}"`.
pub fn collect_identifiers(tokens: TokenStream) -> BTreeSet<String> {
	let mut identifiers = BTreeSet::new();
	collect_into(tokens, &mut identifiers);
	identifiers
}

fn collect_into(tokens: TokenStream, identifiers: &mut BTreeSet<String>) {
	for token in tokens {
		match token {
			TokenTree::Ident(ident) => {
				let name = ident.to_string();
				let name = name.strip_prefix("r#").map(str::to_string).unwrap_or(name);
				identifiers.insert(name);
			}
			TokenTree::Group(group) => collect_into(group.stream(), identifiers),
			TokenTree::Literal(literal) => {
				let text = literal.to_string();
				if text.ends_with('"') || text.ends_with('#') {
					identifiers.extend(format_arguments(&text));
				}
			}
			TokenTree::Punct(_) => {}
		}
	}
}

/// `true` when `tokens` contain `.name(`, `.name::<`, `::name(` or `name!`.
pub fn uses_method_syntax(tokens: TokenStream) -> bool {
	let tokens: Vec<TokenTree> = tokens.into_iter().collect();
	let is_punct = |token: Option<&TokenTree>, ch: char| matches!(token, Some(TokenTree::Punct(p)) if p.as_char() == ch);
	let is_call = |token: Option<&TokenTree>| {
		matches!(token, Some(TokenTree::Group(group)) if group.delimiter() == Delimiter::Parenthesis)
	};
	for (index, token) in tokens.iter().enumerate() {
		match token {
			TokenTree::Punct(punct) if punct.as_char() == '.' || punct.as_char() == ':' => {
				let path_step = punct.as_char() == '.' || is_punct(index.checked_sub(1).and_then(|i| tokens.get(i)), ':');
				if path_step
					&& matches!(tokens.get(index + 1), Some(TokenTree::Ident(_)))
					&& (is_call(tokens.get(index + 2)) || is_punct(tokens.get(index + 2), ':'))
				{
					return true;
				}
			}
			TokenTree::Ident(_) => {
				if let Some(TokenTree::Punct(bang)) = tokens.get(index + 1)
					&& bang.as_char() == '!'
					&& bang.spacing() == Spacing::Alone
				{
					return true;
				}
			}
			TokenTree::Group(group) if uses_method_syntax(group.stream()) => return true,
			_ => {}
		}
	}
	false
}

/// Identifiers named inside `{...}` placeholders of a string literal.
fn format_arguments(text: &str) -> Vec<String> {
	let mut names = Vec::new();
	let mut rest = text;
	while let Some(open) = rest.find('{') {
		rest = &rest[open + 1..];
		if rest.starts_with('{') {
			rest = &rest[1..];
			continue;
		}
		let end = rest.find(['}', ':']).unwrap_or(rest.len());
		let candidate = rest[..end].trim();
		let is_identifier = candidate
			.chars()
			.next()
			.is_some_and(|c| c.is_alphabetic() || c == '_')
			&& candidate.chars().all(|c| c.is_alphanumeric() || c == '_');
		if is_identifier {
			names.push(candidate.to_string());
		}
	}
	names
}
