//! Compiles `actions/` into client and server outputs under `OUT_DIR`.

use reinhardt_actions_build::{ModuleCompiler, TransformOptions, TreeCompiler};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
	let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
	let actions = manifest_dir.join("actions");
	println!("cargo:rerun-if-changed={}", actions.display());

	TreeCompiler::new(ModuleCompiler::new(TransformOptions::default()), &actions, out_dir.join("actions"))
		.compile_tree()?;
	Ok(())
}
