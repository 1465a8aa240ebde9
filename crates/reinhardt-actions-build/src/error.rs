//! Build errors.

use crate::prune::BuildTarget;
use std::fmt;
use std::path::PathBuf;

pub type BuildResult<T> = Result<T, BuildError>;

/// Position of a declaration in its source module.
///
/// Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
	pub file: String,
	pub line: u32,
	pub column: u32,
}

impl fmt::Display for SourceLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}", self.file, self.line, self.column)
	}
}

/// Errors that stop a build.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
	#[error("Failed to parse {path}: {message}")]
	Parse { path: String, message: String },

	#[error("I/O error on {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to write the action manifest: {0}")]
	Manifest(#[from] serde_json::Error),

	#[error("Action `{name}` declared at {location} has no implementation")]
	MissingImplementation { name: String, location: SourceLocation },

	/// An action is no longer reachable after pruning for `target`.
	#[error(
		"Action `{name}` declared at {location} is unreachable in the {target} output. \
		 Actions must be bound to an exported name."
	)]
	UnreachableAction {
		name: String,
		location: SourceLocation,
		target: BuildTarget,
	},

	/// An action-bound name is re-exported under another name.
	#[error(
		"Action `{name}` is re-exported as `{exported_as}` at {location}. \
		 Actions must be exported under the name they are declared with."
	)]
	RenamedExport {
		name: String,
		exported_as: String,
		location: SourceLocation,
	},
}

impl BuildError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// `true` for violations of the action declaration rules, as opposed to
	/// parse or I/O failures.
	pub fn is_contract_violation(&self) -> bool {
		matches!(
			self,
			Self::MissingImplementation { .. } | Self::UnreachableAction { .. } | Self::RenamedExport { .. }
		)
	}
}
