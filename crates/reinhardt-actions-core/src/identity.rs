//! Deterministic identities for modules and action call sites.
//!
//! Both identities are the first four bytes of a SHA-256 digest rendered as
//! lowercase hex. The space is 32 bits wide; collisions are not detected.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

/// Number of digest bytes kept in a short hash.
pub const SHORT_HASH_BYTES: usize = 4;

/// Hashes `text` into an 8 character lowercase hex string.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::identity::short_hash;
///
/// let hash = short_hash("hello");
/// assert_eq!(hash, "2cf24dba");
/// assert_eq!(hash, short_hash("hello"));
/// ```
pub fn short_hash(text: &str) -> String {
	let digest = Sha256::digest(text.as_bytes());
	hex::encode(&digest[..SHORT_HASH_BYTES])
}

/// Lexically normalizes a module path.
///
/// Backslashes become `/`, `.` segments are dropped and `..` segments pop
/// their parent. The file system is never consulted, so the result only
/// depends on the input text.
///
/// # Examples
///
/// ```
/// use reinhardt_actions_core::identity::normalize_module_path;
///
/// assert_eq!(normalize_module_path("src/./api/../users.rs"), "src/users.rs");
/// assert_eq!(normalize_module_path("src\\users.rs"), "src/users.rs");
/// assert_eq!(normalize_module_path("/srv/app//src/lib.rs"), "/srv/app/src/lib.rs");
/// ```
pub fn normalize_module_path(path: &str) -> String {
	let unified = path.replace('\\', "/");
	let absolute = unified.starts_with('/');
	let mut segments: Vec<&str> = Vec::new();

	for segment in unified.split('/') {
		match segment {
			"" | "." => {}
			".." => {
				if segments.last().is_some_and(|last| *last != "..") {
					segments.pop();
				} else if !absolute {
					segments.push("..");
				}
			}
			other => segments.push(other),
		}
	}

	let joined = segments.join("/");
	if absolute {
		format!("/{joined}")
	} else {
		joined
	}
}

macro_rules! short_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Cow<'static, str>);

		impl $name {
			/// Wraps an identity baked into generated code.
			pub const fn from_static(id: &'static str) -> Self {
				Self(Cow::Borrowed(id))
			}

			/// Wraps an identity received at runtime.
			pub fn new(id: impl Into<String>) -> Self {
				Self(Cow::Owned(id.into()))
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

short_id! {
	/// Identity of a source module, derived from its normalized path.
	FileId
}

short_id! {
	/// Identity of an action, derived from the canonical text of its call site.
	ActionId
}

impl FileId {
	/// Computes the identity of the module at `path`.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_actions_core::FileId;
	///
	/// assert_eq!(FileId::from_path("src/users.rs"), FileId::from_path("./src/users.rs"));
	/// ```
	pub fn from_path(path: &str) -> Self {
		Self::new(short_hash(&normalize_module_path(path)))
	}
}

impl ActionId {
	/// Computes the identity of a call site from its canonical text.
	///
	/// The text is expected to be a token-stream rendering of the call, which
	/// already discards comments and formatting. Runs of whitespace are
	/// collapsed once more so callers passing hand-written text agree with
	/// the transform.
	pub fn from_call_text(text: &str) -> Self {
		let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
		Self::new(short_hash(&collapsed))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use rstest::rstest;

	#[rstest]
	#[case("src/users.rs", "src/users.rs")]
	#[case("./src/users.rs", "src/users.rs")]
	#[case("src/api/../users.rs", "src/users.rs")]
	#[case("src\\api\\users.rs", "src/api/users.rs")]
	#[case("../shared/lib.rs", "../shared/lib.rs")]
	#[case("/../lib.rs", "/lib.rs")]
	#[case("a/b/../../../c.rs", "../c.rs")]
	fn test_normalize_module_path(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(normalize_module_path(input), expected);
	}

	#[rstest]
	fn test_short_hash_shape() {
		let hash = short_hash("create_action(|ctx| async move { Ok(ctx.data) })");

		assert_eq!(hash.len(), 8);
		assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}

	#[rstest]
	fn test_file_id_ignores_path_spelling() {
		assert_eq!(
			FileId::from_path("src/actions/users.rs"),
			FileId::from_path("src/actions/../actions/./users.rs")
		);
		assert_ne!(
			FileId::from_path("src/actions/users.rs"),
			FileId::from_path("src/actions/posts.rs")
		);
	}

	#[rstest]
	fn test_action_id_ignores_whitespace() {
		assert_eq!(
			ActionId::from_call_text("create_action (handler)"),
			ActionId::from_call_text("create_action  (\n\thandler\n)")
		);
	}

	#[rstest]
	fn test_static_and_owned_ids_compare_equal() {
		assert_eq!(ActionId::from_static("2cf24dba"), ActionId::new("2cf24dba"));
	}

	proptest! {
		#[test]
		fn prop_short_hash_is_deterministic(text in ".*") {
			prop_assert_eq!(short_hash(&text), short_hash(&text));
			prop_assert_eq!(short_hash(&text).len(), 8);
		}

		#[test]
		fn prop_normalization_is_idempotent(path in "[a-z./\\\\]{0,24}") {
			let once = normalize_module_path(&path);
			prop_assert_eq!(normalize_module_path(&once), once.clone());
		}
	}
}
