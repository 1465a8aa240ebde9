//! # Reinhardt Actions Build
//!
//! Build-time half of isomorphic actions. A module that imports the
//! `create_action` primitive is compiled twice:
//!
//! - the **client** output keeps the module's public surface, with every
//!   action call rewritten to carry an [`ActionDescriptor`] and every
//!   implementation removed;
//! - the **server** output keeps only the hoisted implementations and what
//!   they need, plus an `__action_manifest()` function used to build the
//!   action registry.
//!
//! ## Example
//!
//! ```
//! use reinhardt_actions_build::{ModuleCompiler, TransformOptions};
//!
//! let source = r#"
//! use reinhardt_actions::create_action;
//!
//! pub static ECHO: reinhardt_actions::Action =
//!     create_action(|ctx: reinhardt_actions::CallContext| async move {
//!         Ok(reinhardt_actions::Value::record([("data", ctx.data)]))
//!     });
//! "#;
//!
//! let compiled = ModuleCompiler::new(TransformOptions::default())
//!     .compile_source("src/echo.rs", source)
//!     .unwrap();
//!
//! assert_eq!(compiled.actions.len(), 1);
//! assert!(compiled.client_source().contains("ActionDescriptor"));
//! assert!(compiled.server_source().unwrap().contains("__action_manifest"));
//! ```
//!
//! [`ActionDescriptor`]: reinhardt_actions_core::ActionDescriptor

pub mod compile;
pub mod error;
pub mod extract;
pub mod graph;
pub mod imports;
pub mod manifest;
pub mod options;
pub mod prune;
pub mod tree;

pub use compile::{CompiledModuleSource, ModuleCompiler};
pub use error::{BuildError, BuildResult, SourceLocation};
pub use extract::{BindingContext, ExtractedAction, ExtractedModule, extract_actions};
pub use graph::{Declaration, ModuleGraph, NodeId, NodeKind};
pub use manifest::{ActionManifest, ManifestAction, ManifestModule, module_declares_action};
pub use options::TransformOptions;
pub use prune::{BuildTarget, PruneReport, prune_module};
pub use tree::{GeneratedFile, TreeCompiler};
