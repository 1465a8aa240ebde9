//! Build manifest and the registry module generated for server outputs.

use crate::extract::{ExtractedAction, MANIFEST_FN};
use crate::options::TransformOptions;
use quote::format_ident;
use reinhardt_actions_core::FileId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the manifest written next to the outputs.
pub const MANIFEST_FILE: &str = "actions.json";

/// `true` when a module importing `dependencies` may declare actions.
///
/// Modules that do not import a primitive crate are passed through without
/// being parsed for actions.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_build::{TransformOptions, module_declares_action};
///
/// let options = TransformOptions::default();
/// assert!(module_declares_action(&["serde".into(), "reinhardt_actions".into()], &options));
/// assert!(!module_declares_action(&["serde".into()], &options));
/// ```
pub fn module_declares_action(dependencies: &[String], options: &TransformOptions) -> bool {
	dependencies
		.iter()
		.any(|dependency| options.primitive_crates.iter().any(|name| name == dependency))
}

/// One action in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAction {
	pub action_id: String,
	pub function_name: String,
	pub export_name: String,
	pub line: u32,
	pub column: u32,
}

/// One action module in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModule {
	pub file_id: String,
	pub source_path: String,
	/// Server output, relative to the output directory.
	pub server_output: String,
	pub actions: Vec<ManifestAction>,
}

/// Every action module of a build, sorted by source path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionManifest {
	pub endpoint: String,
	pub modules: Vec<ManifestModule>,
}

impl ActionManifest {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			modules: Vec::new(),
		}
	}

	/// Adds a compiled module. Modules without actions are skipped.
	pub fn add_module(&mut self, file_id: &FileId, source_path: &str, actions: &[ExtractedAction]) {
		if actions.is_empty() {
			return;
		}
		self.modules.push(ManifestModule {
			file_id: file_id.to_string(),
			source_path: source_path.to_string(),
			server_output: format!("server/{file_id}.rs"),
			actions: actions
				.iter()
				.map(|action| ManifestAction {
					action_id: action.action_id.to_string(),
					function_name: action.function_name().to_string(),
					export_name: action.export_name.clone(),
					line: action.location.line,
					column: action.location.column,
				})
				.collect(),
		});
		self.modules.sort_by(|a, b| a.source_path.cmp(&b.source_path));
	}

	pub fn action_count(&self) -> usize {
		self.modules.iter().map(|module| module.actions.len()).sum()
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}

	/// Source of the module that gathers every server output.
	///
	/// Each server output is included through an absolute `#[path]`, so the
	/// generated module can be pulled in from anywhere with `include!`.
	pub fn registry_source(&self, output_dir: &Path, options: &TransformOptions) -> String {
		let rt = options.runtime();
		let manifest = format_ident!("{}", MANIFEST_FN);
		let modules: Vec<_> = self
			.modules
			.iter()
			.map(|module| {
				let path = output_dir.join(&module.server_output).to_string_lossy().into_owned();
				let ident = format_ident!("module_{}", module.file_id);
				(path, ident)
			})
			.collect();
		let declarations = modules.iter().map(|(path, ident)| {
			quote::quote! {
				#[path = #path]
				pub mod #ident;
			}
		});
		let calls = modules.iter().map(|(_, ident)| quote::quote!(#ident::#manifest()));
		let file: syn::File = syn::parse_quote! {
			#(#declarations)*

			/// Every compiled action module of this build.
			pub fn compiled_modules() -> ::std::vec::Vec<#rt::CompiledModule> {
				::std::vec![#(#calls),*]
			}
		};
		prettyplease::unparse(&file)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::compile::ModuleCompiler;
	use rstest::rstest;

	#[rstest]
	fn test_manifest_lists_action_modules_only() {
		let compiler = ModuleCompiler::default();
		let with_actions = compiler
			.compile_source(
				"src/users.rs",
				"use reinhardt_actions::{Action, create_action};\npub static GET_USER: Action = create_action(handler);",
			)
			.unwrap();
		let without = compiler.compile_source("src/ui.rs", "pub fn view() {}").unwrap();

		let mut manifest = ActionManifest::new("/api/action");
		manifest.add_module(&without.file_id, &without.source_path, &without.actions);
		manifest.add_module(&with_actions.file_id, &with_actions.source_path, &with_actions.actions);

		assert_eq!(manifest.modules.len(), 1);
		assert_eq!(manifest.action_count(), 1);
		let module = &manifest.modules[0];
		assert_eq!(module.actions[0].function_name, "GET_USER");
		assert_eq!(module.server_output, format!("server/{}.rs", with_actions.file_id));

		let registry = manifest.registry_source(Path::new("/out"), &TransformOptions::default());
		assert!(registry.contains(&format!("#[path = \"/out/server/{}.rs\"]", module.file_id)));
		assert!(registry.contains(&format!("module_{}::__action_manifest()", module.file_id)));
	}
}
