//! Action extraction.
//!
//! Every call to the action primitive is rewritten in place:
//!
//! ```text
//! pub static GET_USER: Action = create_action(|ctx: CallContext| async move { .. });
//! ```
//!
//! becomes
//!
//! ```text
//! pub static GET_USER: Action = create_action(::reinhardt_actions::ActionDescriptor { .. });
//!
//! #[doc(hidden)]
//! pub fn __action_1a2b3c4d() -> ::reinhardt_actions::BoxedHandler {
//!     ::reinhardt_actions::handler_fn(|ctx: CallContext| async move { .. })
//! }
//! ```
//!
//! The action id hashes the call exactly as written, before any rewriting,
//! so the client and server builds of a module agree on it.

use crate::error::{BuildError, BuildResult, SourceLocation};
use crate::imports::{LeafKind, flatten, primitive_aliases, primitive_crate_names};
use crate::options::TransformOptions;
use proc_macro2::{Literal, Span};
use quote::{ToTokens, format_ident};
use reinhardt_actions_core::descriptor::{ANONYMOUS_FUNCTION_NAME, DESCRIPTOR_MARKER_FIELD};
use reinhardt_actions_core::{ActionId, FileId};
use std::collections::{BTreeSet, HashSet};
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::visit_mut::{self, VisitMut};
use syn::{Expr, ExprCall, File, Item, ItemConst, ItemFn, ItemStatic, Local, Pat, Stmt, Visibility};

/// Prefix of hoisted implementation functions.
pub const HOISTED_PREFIX: &str = "__action_";

/// Name of the manifest function emitted into server outputs.
pub const MANIFEST_FN: &str = "__action_manifest";

/// Name of the hoisted function holding the implementation of `action_id`.
pub fn hoisted_export_name(action_id: &ActionId) -> String {
	format!("{HOISTED_PREFIX}{action_id}")
}

/// `true` for hoisted implementation functions, not the manifest.
pub fn is_hoisted_export(name: &str) -> bool {
	name.starts_with(HOISTED_PREFIX) && name != MANIFEST_FN
}

/// Where the value of an action call ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingContext {
	/// Initializer of a `static`, `const` or `let` binding.
	Named(String),
	/// Tail expression of a top-level function; holds the function name.
	DefaultExport(String),
	Anonymous,
}

impl BindingContext {
	/// Name recorded in the descriptor's debug information.
	pub fn function_name(&self) -> &str {
		match self {
			Self::Named(name) | Self::DefaultExport(name) => name,
			Self::Anonymous => ANONYMOUS_FUNCTION_NAME,
		}
	}
}

/// One rewritten call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAction {
	pub action_id: ActionId,
	pub file_id: FileId,
	pub binding: BindingContext,
	pub location: SourceLocation,
	/// Name of the hoisted implementation function.
	pub export_name: String,
	/// Action whose implementation contains this call site.
	pub enclosing: Option<ActionId>,
}

impl ExtractedAction {
	pub fn function_name(&self) -> &str {
		self.binding.function_name()
	}
}

/// A module after extraction.
#[derive(Debug, Clone)]
pub struct ExtractedModule {
	pub file: File,
	pub file_id: FileId,
	pub source_path: String,
	/// Rewritten call sites in source order.
	pub actions: Vec<ExtractedAction>,
}

impl ExtractedModule {
	pub fn has_actions(&self) -> bool {
		!self.actions.is_empty()
	}
}

/// Rewrites every action call of `file`.
///
/// A module that does not import the primitive is returned unchanged, as is
/// every call that already carries a descriptor.
pub fn extract_actions(
	mut file: File,
	source_path: &str,
	options: &TransformOptions,
) -> BuildResult<ExtractedModule> {
	let file_id = FileId::from_path(source_path);
	let aliases = primitive_aliases(&file, options);
	if aliases.is_empty() && !calls_primitive_by_path(&file, options) {
		return Ok(ExtractedModule {
			file,
			file_id,
			source_path: source_path.to_string(),
			actions: Vec::new(),
		});
	}

	let crate_names = primitive_crate_names(&file, options);
	let mut extractor = Extractor {
		aliases: &aliases,
		crate_names: &crate_names,
		options,
		runtime: options.runtime(),
		file_id: file_id.clone(),
		source_path: source_path.to_string(),
		slot: None,
		actions: Vec::new(),
		hoisted: Vec::new(),
		hoisted_ids: HashSet::new(),
		enclosing: Vec::new(),
		fn_depth: 0,
		error: None,
	};
	extractor.visit_file_mut(&mut file);
	if let Some(error) = extractor.error {
		return Err(error);
	}

	check_renamed_exports(&file, &extractor.actions, source_path)?;

	let Extractor { actions, hoisted, .. } = extractor;
	tracing::debug!(
		path = source_path,
		file_id = %file_id,
		actions = actions.len(),
		"extracted actions"
	);
	file.items.extend(hoisted);

	Ok(ExtractedModule {
		file,
		file_id,
		source_path: source_path.to_string(),
		actions,
	})
}

struct Extractor<'a> {
	aliases: &'a BTreeSet<String>,
	/// Names a qualified call such as `reinhardt_actions::create_action(..)`
	/// may start with.
	crate_names: &'a BTreeSet<String>,
	options: &'a TransformOptions,
	runtime: syn::Path,
	file_id: FileId,
	source_path: String,
	/// Binding context offered to the next visited expression.
	slot: Option<BindingContext>,
	actions: Vec<ExtractedAction>,
	hoisted: Vec<Item>,
	hoisted_ids: HashSet<ActionId>,
	/// Actions whose arguments are being visited, innermost last.
	enclosing: Vec<ActionId>,
	/// Nesting depth of `fn` items being visited.
	fn_depth: usize,
	error: Option<BuildError>,
}

impl Extractor<'_> {
	fn is_primitive_call(&self, call: &ExprCall) -> bool {
		match call.func.as_ref() {
			Expr::Path(path) if path.qself.is_none() && path.path.leading_colon.is_none() => {
				path.path
					.get_ident()
					.is_some_and(|ident| self.aliases.contains(&ident.to_string()))
					|| is_qualified_primitive(&path.path, self.crate_names, self.options)
			}
			Expr::Path(path) if path.qself.is_none() => {
				is_qualified_primitive(&path.path, self.crate_names, self.options)
			}
			_ => false,
		}
	}

	fn location(&self, span: Span) -> SourceLocation {
		let start = span.start();
		SourceLocation {
			file: self.source_path.clone(),
			line: u32::try_from(start.line).unwrap_or(u32::MAX),
			column: u32::try_from(start.column).unwrap_or(u32::MAX),
		}
	}

	fn visit_with_slot(&mut self, expr: &mut Expr, slot: Option<BindingContext>) {
		self.slot = slot;
		self.visit_expr_mut(expr);
		self.slot = None;
	}

	fn rewrite_action_call(&mut self, call: &mut ExprCall, slot: Option<BindingContext>) {
		if call.args.first().is_some_and(is_descriptor_literal) {
			return;
		}

		let canonical = call.to_token_stream().to_string();
		let action_id = ActionId::from_call_text(&canonical);
		let location = self.location(call.span());
		let binding = slot.unwrap_or(BindingContext::Anonymous);

		if call.args.is_empty() {
			self.error.get_or_insert(BuildError::MissingImplementation {
				name: binding.function_name().to_string(),
				location,
			});
			return;
		}

		// Nested actions inside the implementation are rewritten too.
		let enclosing = self.enclosing.last().cloned();
		self.enclosing.push(action_id.clone());
		for arg in call.args.iter_mut() {
			self.visit_with_slot(arg, None);
		}
		self.enclosing.pop();

		let implementation: Vec<Expr> = std::mem::take(&mut call.args).into_iter().collect();
		call.args.push(self.descriptor_literal(&action_id, binding.function_name(), &location));

		let export_name = hoisted_export_name(&action_id);
		if self.hoisted_ids.insert(action_id.clone()) {
			self.hoisted.push(self.hoisted_function(&export_name, implementation));
		}

		self.actions.push(ExtractedAction {
			action_id,
			file_id: self.file_id.clone(),
			binding,
			location,
			export_name,
			enclosing,
		});
	}

	fn descriptor_literal(&self, action_id: &ActionId, function_name: &str, location: &SourceLocation) -> Expr {
		let rt = &self.runtime;
		let action_id = action_id.as_str();
		let file_id = self.file_id.as_str();
		let endpoint = self.options.endpoint.as_str();
		let source_file = self.source_path.as_str();
		let line = Literal::u32_unsuffixed(location.line);
		let column = Literal::u32_unsuffixed(location.column);
		syn::parse_quote! {
			#rt::ActionDescriptor {
				action_id: #rt::ActionId::from_static(#action_id),
				file_id: #rt::FileId::from_static(#file_id),
				endpoint: ::std::borrow::Cow::Borrowed(#endpoint),
				debug: #rt::DebugInfo {
					function_name: ::std::borrow::Cow::Borrowed(#function_name),
					source_file: ::std::borrow::Cow::Borrowed(#source_file),
					line: #line,
					column: #column,
				},
			}
		}
	}

	/// One argument is the handler; with several, the leading ones wrap it
	/// as middleware in call order.
	fn hoisted_function(&self, export_name: &str, mut implementation: Vec<Expr>) -> Item {
		let rt = &self.runtime;
		let ident = format_ident!("{}", export_name);
		let handler = implementation.pop();
		let body: Expr = if implementation.is_empty() {
			syn::parse_quote!(#rt::handler_fn(#handler))
		} else {
			let middleware = implementation
				.iter()
				.map(|m| quote::quote!(#rt::middleware_fn(#m)));
			syn::parse_quote! {
				#rt::ActionChain::new(#rt::handler_fn(#handler))
					#(.with_middleware(#middleware))*
					.boxed()
			}
		};
		syn::parse_quote! {
			#[doc(hidden)]
			pub fn #ident() -> #rt::BoxedHandler {
				#body
			}
		}
	}
}

impl VisitMut for Extractor<'_> {
	fn visit_item_static_mut(&mut self, item: &mut ItemStatic) {
		let slot = Some(BindingContext::Named(item.ident.to_string()));
		self.visit_with_slot(&mut item.expr, slot);
	}

	fn visit_item_const_mut(&mut self, item: &mut ItemConst) {
		let slot = Some(BindingContext::Named(item.ident.to_string()));
		self.visit_with_slot(&mut item.expr, slot);
	}

	fn visit_local_mut(&mut self, local: &mut Local) {
		let Some(init) = local.init.as_mut() else {
			return;
		};
		let slot = binding_name(&local.pat).map(BindingContext::Named);
		self.visit_with_slot(&mut init.expr, slot);
		if let Some((_, diverge)) = init.diverge.as_mut() {
			self.visit_with_slot(diverge, None);
		}
	}

	fn visit_item_fn_mut(&mut self, item: &mut ItemFn) {
		let name = item.sig.ident.to_string();
		let top_level = self.fn_depth == 0;
		let last = item.block.stmts.len().checked_sub(1);
		self.fn_depth += 1;
		for (index, stmt) in item.block.stmts.iter_mut().enumerate() {
			match stmt {
				Stmt::Expr(expr, None) if top_level && Some(index) == last => {
					self.visit_with_slot(expr, Some(BindingContext::DefaultExport(name.clone())));
				}
				_ => self.visit_stmt_mut(stmt),
			}
		}
		self.fn_depth -= 1;
	}

	fn visit_expr_mut(&mut self, expr: &mut Expr) {
		let slot = self.slot.take();
		match expr {
			Expr::Call(call) if self.is_primitive_call(call) => self.rewrite_action_call(call, slot),
			// Wrapping calls and parentheses pass the binding through.
			Expr::Call(call) => {
				self.visit_with_slot(&mut call.func, slot.clone());
				for arg in call.args.iter_mut() {
					self.visit_with_slot(arg, slot.clone());
				}
			}
			Expr::Paren(paren) => self.visit_with_slot(&mut paren.expr, slot),
			_ => visit_mut::visit_expr_mut(self, expr),
		}
	}
}

/// `true` for `krate::create_action` where `krate` names a primitive crate.
fn is_qualified_primitive(path: &syn::Path, crate_names: &BTreeSet<String>, options: &TransformOptions) -> bool {
	let segments: Vec<_> = path.segments.iter().collect();
	match segments.as_slice() {
		[krate, name] => {
			krate.arguments.is_none()
				&& name.arguments.is_none()
				&& crate_names.contains(&krate.ident.to_string())
				&& name.ident == options.primitive_name
		}
		_ => false,
	}
}

/// `true` when `file` calls the primitive through a crate path, with or
/// without importing anything from the crate.
pub fn calls_primitive_by_path(file: &File, options: &TransformOptions) -> bool {
	struct Finder<'a> {
		crate_names: BTreeSet<String>,
		options: &'a TransformOptions,
		found: bool,
	}

	impl<'ast> Visit<'ast> for Finder<'_> {
		fn visit_expr_call(&mut self, call: &'ast ExprCall) {
			if let Expr::Path(path) = call.func.as_ref()
				&& path.qself.is_none()
				&& is_qualified_primitive(&path.path, &self.crate_names, self.options)
			{
				self.found = true;
			}
			visit::visit_expr_call(self, call);
		}
	}

	let mut finder = Finder {
		crate_names: primitive_crate_names(file, options),
		options,
		found: false,
	};
	finder.visit_file(file);
	finder.found
}

fn binding_name(pat: &Pat) -> Option<String> {
	match pat {
		Pat::Ident(pat) => Some(pat.ident.to_string()),
		Pat::Type(pat) => binding_name(&pat.pat),
		_ => None,
	}
}

/// `true` when `expr` is a descriptor literal produced by an earlier run.
pub fn is_descriptor_literal(expr: &Expr) -> bool {
	let Expr::Struct(literal) = expr else {
		return false;
	};
	let named_descriptor = literal
		.path
		.segments
		.last()
		.is_some_and(|segment| segment.ident == "ActionDescriptor");
	named_descriptor
		&& literal.fields.iter().any(|field| match &field.member {
			syn::Member::Named(ident) => ident == DESCRIPTOR_MARKER_FIELD,
			syn::Member::Unnamed(_) => false,
		})
}

/// Rejects `pub use` leaves that give an action a different public name.
fn check_renamed_exports(file: &File, actions: &[ExtractedAction], source_path: &str) -> BuildResult<()> {
	let action_names: BTreeSet<&str> = actions
		.iter()
		.filter_map(|action| match &action.binding {
			BindingContext::Named(name) | BindingContext::DefaultExport(name) => Some(name.as_str()),
			BindingContext::Anonymous => None,
		})
		.collect();

	for item in &file.items {
		let Item::Use(item) = item else {
			continue;
		};
		if matches!(item.vis, Visibility::Inherited) {
			continue;
		}
		for leaf in flatten(item) {
			let LeafKind::Rename(alias) = &leaf.kind else {
				continue;
			};
			let name = leaf.imported_name();
			if action_names.contains(name) && alias != name {
				let start = leaf.span.start();
				return Err(BuildError::RenamedExport {
					name: name.to_string(),
					exported_as: alias.clone(),
					location: SourceLocation {
						file: source_path.to_string(),
						line: u32::try_from(start.line).unwrap_or(u32::MAX),
						column: u32::try_from(start.column).unwrap_or(u32::MAX),
					},
				});
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn extract(source: &str) -> BuildResult<ExtractedModule> {
		let file = syn::parse_file(source).unwrap();
		extract_actions(file, "src/users.rs", &TransformOptions::default())
	}

	fn render(module: &ExtractedModule) -> String {
		prettyplease::unparse(&module.file)
	}

	#[rstest]
	fn test_module_without_primitive_is_untouched() {
		let source = "pub fn create_action(x: u8) -> u8 { x }\npub static A: u8 = create_action(1);";

		let module = extract(source).unwrap();

		assert!(!module.has_actions());
		assert_eq!(render(&module), prettyplease::unparse(&syn::parse_file(source).unwrap()));
	}

	#[rstest]
	#[case::glob_import("use reinhardt_actions::*;\npub static A: Action = create_action(handler);")]
	#[case::qualified_call("pub static A: reinhardt_actions::Action = reinhardt_actions::create_action(handler);")]
	#[case::absolute_call("pub static A: Action = ::reinhardt_actions::create_action(handler);")]
	#[case::crate_alias("use reinhardt_actions as rt;\npub static A: rt::Action = rt::create_action(handler);")]
	fn test_other_call_forms_are_extracted(#[case] source: &str) {
		let module = extract(source).unwrap();

		assert_eq!(module.actions.len(), 1);
		assert_eq!(module.actions[0].function_name(), "A");
		assert!(render(&module).contains("ActionDescriptor"));
	}

	#[rstest]
	fn test_static_binding_is_named() {
		let source = r#"
use reinhardt_actions::create_action;

pub static GET_USER: Action = create_action(|ctx: CallContext| async move { Ok(ctx.data) });
"#;

		let module = extract(source).unwrap();

		assert_eq!(module.actions.len(), 1);
		let action = &module.actions[0];
		assert_eq!(action.binding, BindingContext::Named("GET_USER".to_string()));
		assert_eq!(action.location.line, 4);
		assert_eq!(action.location.column, 30);
		assert_eq!(action.export_name, format!("__action_{}", action.action_id));

		let output = render(&module);
		assert!(output.contains("ActionDescriptor"));
		assert!(output.contains(&format!("pub fn __action_{}()", action.action_id)));
		assert!(output.contains("::reinhardt_actions::handler_fn("));
		assert!(output.contains("Ok(ctx.data)"));
	}

	#[rstest]
	#[case::wrapped("pub static A: Wrapped = wrap(create_action(handler));", BindingContext::Named("A".into()))]
	#[case::parenthesized("pub const A: Action = (create_action(handler));", BindingContext::Named("A".into()))]
	#[case::accessor("pub fn action() -> Action { create_action(handler) }", BindingContext::DefaultExport("action".into()))]
	#[case::local("fn setup() { let local = create_action(handler); drop(local); }", BindingContext::Named("local".into()))]
	#[case::argument("fn setup() { register([create_action(handler)]); }", BindingContext::Anonymous)]
	#[case::nested_fn("fn outer() { fn inner() -> Action { create_action(handler) } }", BindingContext::Anonymous)]
	fn test_binding_contexts(#[case] body: &str, #[case] expected: BindingContext) {
		let source = format!("use reinhardt_actions::create_action;\n{body}");

		let module = extract(&source).unwrap();

		assert_eq!(module.actions.len(), 1);
		assert_eq!(module.actions[0].binding, expected);
	}

	#[rstest]
	fn test_renamed_primitive_import() {
		let source = "use reinhardt_actions::{Action, create_action as action};\npub static A: Action = action(handler);";

		let module = extract(source).unwrap();

		assert_eq!(module.actions.len(), 1);
	}

	#[rstest]
	fn test_extraction_is_idempotent() {
		let source = r#"
use reinhardt_actions::create_action;

pub static GET_USER: Action = create_action(|ctx: CallContext| async move { Ok(ctx.data) });
"#;
		let first = extract(source).unwrap();
		let first_output = render(&first);

		let second = extract_actions(first.file.clone(), "src/users.rs", &TransformOptions::default()).unwrap();

		assert!(second.actions.is_empty());
		assert_eq!(render(&second), first_output);
	}

	#[rstest]
	fn test_identity_follows_call_text_not_binding() {
		let a = extract("use reinhardt_actions::create_action;\npub static A: Action = create_action(handler);").unwrap();
		let b = extract("use reinhardt_actions::create_action;\npub static B: Action = create_action( handler );").unwrap();
		let c = extract("use reinhardt_actions::create_action;\npub static A: Action = create_action(other);").unwrap();

		assert_eq!(a.actions[0].action_id, b.actions[0].action_id);
		assert_ne!(a.actions[0].action_id, c.actions[0].action_id);
	}

	#[rstest]
	fn test_identical_call_sites_share_one_export() {
		let source = "use reinhardt_actions::create_action;\npub static A: Action = create_action(handler);\npub static B: Action = create_action(handler);";

		let module = extract(source).unwrap();

		assert_eq!(module.actions.len(), 2);
		assert_eq!(module.actions[0].action_id, module.actions[1].action_id);
		assert_eq!(render(&module).matches("pub fn __action_").count(), 1);
	}

	#[rstest]
	fn test_several_arguments_build_a_chain() {
		let source = "use reinhardt_actions::create_action;\npub static A: Action = create_action(auth, audit, handler);";

		let module = extract(source).unwrap();

		let output = render(&module);
		assert!(output.contains("ActionChain::new(::reinhardt_actions::handler_fn(handler))"));
		assert!(output.contains(".with_middleware(::reinhardt_actions::middleware_fn(auth))"));
		assert!(output.contains(".with_middleware(::reinhardt_actions::middleware_fn(audit))"));
	}

	#[rstest]
	fn test_nested_actions_are_extracted() {
		let source = r#"
use reinhardt_actions::create_action;

pub static OUTER: Action = create_action(|ctx: CallContext| async move {
	let inner = create_action(helper);
	Ok(ctx.data)
});
"#;

		let module = extract(source).unwrap();

		let names: Vec<_> = module.actions.iter().map(ExtractedAction::function_name).collect();
		assert_eq!(names, vec!["inner", "OUTER"]);
		assert_eq!(module.actions[0].enclosing.as_ref(), Some(&module.actions[1].action_id));
		assert_eq!(module.actions[1].enclosing, None);
	}

	#[rstest]
	fn test_renamed_export_is_rejected() {
		let source = "use reinhardt_actions::create_action;\npub static GET_USER: Action = create_action(handler);\npub use self::GET_USER as FETCH_USER;";

		let error = extract(source).unwrap_err();

		assert!(matches!(
			error,
			BuildError::RenamedExport { ref name, ref exported_as, .. } if name == "GET_USER" && exported_as == "FETCH_USER"
		));
		assert!(error.is_contract_violation());
	}

	#[rstest]
	fn test_call_without_implementation_is_rejected() {
		let error = extract("use reinhardt_actions::create_action;\npub static A: Action = create_action();").unwrap_err();

		assert!(matches!(error, BuildError::MissingImplementation { .. }));
	}
}
