//! Per-module compilation: extraction, pruning and the reachability check.

use crate::error::{BuildError, BuildResult};
use crate::extract::{ExtractedAction, MANIFEST_FN, extract_actions, is_descriptor_literal};
use crate::options::TransformOptions;
use crate::prune::{BuildTarget, prune_module};
use quote::format_ident;
use reinhardt_actions_core::FileId;
use std::collections::BTreeSet;
use syn::visit::{self, Visit};
use syn::{Expr, File, Item, Lit};

/// Client and server outputs of one module.
#[derive(Debug, Clone)]
pub struct CompiledModuleSource {
	pub source_path: String,
	pub file_id: FileId,
	pub actions: Vec<ExtractedAction>,
	pub client: File,
	/// Only present when the module declares actions.
	pub server: Option<File>,
}

impl CompiledModuleSource {
	pub fn client_source(&self) -> String {
		prettyplease::unparse(&self.client)
	}

	pub fn server_source(&self) -> Option<String> {
		self.server.as_ref().map(prettyplease::unparse)
	}
}

/// Compiles modules with fixed options.
#[derive(Debug, Clone, Default)]
pub struct ModuleCompiler {
	options: TransformOptions,
}

impl ModuleCompiler {
	pub fn new(options: TransformOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> &TransformOptions {
		&self.options
	}

	/// Parses and compiles the module at `source_path`.
	///
	/// A module without actions is passed through untouched as its client
	/// output and has no server output.
	pub fn compile_source(&self, source_path: &str, source: &str) -> BuildResult<CompiledModuleSource> {
		let file = syn::parse_file(source).map_err(|e| {
			let start = e.span().start();
			BuildError::Parse {
				path: source_path.to_string(),
				message: format!("{e} (at {}:{})", start.line, start.column),
			}
		})?;
		self.compile_file(source_path, file)
	}

	pub fn compile_file(&self, source_path: &str, file: File) -> BuildResult<CompiledModuleSource> {
		let extracted = extract_actions(file, source_path, &self.options)?;
		if !extracted.has_actions() {
			return Ok(CompiledModuleSource {
				source_path: extracted.source_path,
				file_id: extracted.file_id,
				actions: Vec::new(),
				client: extracted.file,
				server: None,
			});
		}

		let (client, client_report) = prune_module(extracted.file.clone(), BuildTarget::Client);
		ensure_reachable(&client, &extracted.actions, BuildTarget::Client)?;

		let mut server_input = extracted.file;
		server_input.items.push(self.manifest_function(&extracted.file_id, &extracted.actions));
		let (server, server_report) = prune_module(server_input, BuildTarget::Server);
		ensure_reachable(&server, &extracted.actions, BuildTarget::Server)?;

		tracing::debug!(
			path = source_path,
			actions = extracted.actions.len(),
			client_removed = client_report.removed.len(),
			server_removed = server_report.removed.len(),
			"compiled action module"
		);

		Ok(CompiledModuleSource {
			source_path: extracted.source_path,
			file_id: extracted.file_id,
			actions: extracted.actions,
			client,
			server: Some(server),
		})
	}

	/// `__action_manifest()` listing every hoisted implementation.
	fn manifest_function(&self, file_id: &FileId, actions: &[ExtractedAction]) -> Item {
		let rt = self.options.runtime();
		let manifest = format_ident!("{}", MANIFEST_FN);
		let file_id = file_id.as_str();
		let mut seen = BTreeSet::new();
		let entries = actions
			.iter()
			.filter(|action| seen.insert(action.action_id.clone()))
			.map(|action| {
				let action_id = action.action_id.as_str();
				let export = format_ident!("{}", action.export_name);
				quote::quote!(.with_action(#rt::ActionId::from_static(#action_id), #export()))
			});
		syn::parse_quote! {
			#[doc(hidden)]
			pub fn #manifest() -> #rt::CompiledModule {
				#rt::CompiledModule::new(#rt::FileId::from_static(#file_id))
					#(#entries)*
			}
		}
	}
}

/// Fails when an action did not survive pruning for `target`.
///
/// The client output must still carry the action's descriptor, the server
/// output its hoisted implementation. A nested action's descriptor lives in
/// the enclosing implementation, so only the server output is checked for it.
fn ensure_reachable(file: &File, actions: &[ExtractedAction], target: BuildTarget) -> BuildResult<()> {
	let present = match target {
		BuildTarget::Client => {
			let mut collector = DescriptorIds::default();
			collector.visit_file(file);
			collector.ids
		}
		BuildTarget::Server => file
			.items
			.iter()
			.filter_map(|item| match item {
				Item::Fn(item) => Some(item.sig.ident.to_string()),
				_ => None,
			})
			.collect(),
	};

	for action in actions {
		if target == BuildTarget::Client && action.enclosing.is_some() {
			continue;
		}
		let key = match target {
			BuildTarget::Client => action.action_id.to_string(),
			BuildTarget::Server => action.export_name.clone(),
		};
		if !present.contains(&key) {
			return Err(BuildError::UnreachableAction {
				name: action.function_name().to_string(),
				location: action.location.clone(),
				target,
			});
		}
	}
	Ok(())
}

/// Action ids of the descriptor literals left in a module.
#[derive(Default)]
struct DescriptorIds {
	ids: BTreeSet<String>,
}

impl<'ast> Visit<'ast> for DescriptorIds {
	fn visit_expr(&mut self, expr: &'ast Expr) {
		if is_descriptor_literal(expr)
			&& let Expr::Struct(literal) = expr
			&& let Some(id) = literal.fields.iter().find_map(|field| match (&field.member, &field.expr) {
				(syn::Member::Named(name), Expr::Call(call)) if name == "action_id" => {
					call.args.first().and_then(|arg| match arg {
						Expr::Lit(lit) => match &lit.lit {
							Lit::Str(id) => Some(id.value()),
							_ => None,
						},
						_ => None,
					})
				}
				_ => None,
			}) {
			self.ids.insert(id);
		}
		visit::visit_expr(self, expr);
	}
}
