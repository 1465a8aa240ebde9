//! Transform options.

use reinhardt_actions_core::DEFAULT_ENDPOINT;

/// Options of the action transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
	/// Crates whose `create_action` import marks a module as declaring actions.
	pub primitive_crates: Vec<String>,
	/// Name of the primitive inside those crates.
	pub primitive_name: String,
	/// Endpoint baked into descriptors.
	pub endpoint: String,
	/// Path generated code uses to reach the runtime.
	pub runtime_path: String,
}

impl Default for TransformOptions {
	fn default() -> Self {
		Self {
			primitive_crates: vec!["reinhardt_actions".to_string()],
			primitive_name: "create_action".to_string(),
			endpoint: DEFAULT_ENDPOINT.to_string(),
			runtime_path: "::reinhardt_actions".to_string(),
		}
	}
}

impl TransformOptions {
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();
		self
	}

	pub fn with_primitive_crate(mut self, name: impl Into<String>) -> Self {
		self.primitive_crates.push(name.into());
		self
	}

	pub fn with_runtime_path(mut self, path: impl Into<String>) -> Self {
		self.runtime_path = path.into();
		self
	}

	/// Parsed [`TransformOptions::runtime_path`].
	pub(crate) fn runtime(&self) -> syn::Path {
		syn::parse_str(&self.runtime_path).unwrap_or_else(|_| syn::parse_quote!(::reinhardt_actions))
	}
}
