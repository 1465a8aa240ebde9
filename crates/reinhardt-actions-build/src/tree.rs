//! Whole-tree compilation.
//!
//! [`TreeCompiler`] walks a source tree, compiles every module and lays the
//! outputs out as:
//!
//! ```text
//! <out>/client/<relative path>    every module, actions replaced by descriptors
//! <out>/server/<file id>.rs       one per action module
//! <out>/server/mod.rs             `compiled_modules()` over all of them
//! <out>/actions.json              the build manifest
//! ```

use crate::compile::ModuleCompiler;
use crate::error::{BuildError, BuildResult};
use crate::extract::{ExtractedAction, calls_primitive_by_path};
use crate::imports::module_dependencies;
use crate::manifest::{ActionManifest, MANIFEST_FILE, module_declares_action};
use reinhardt_actions_core::FileId;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never compiled.
const SKIPPED_DIRS: &[&str] = &["target", ".git"];

/// A single generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
	/// Path relative to the output directory
	pub path: PathBuf,
	/// File content
	pub content: String,
}

impl GeneratedFile {
	pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			content: content.into(),
		}
	}
}

/// Everything a tree build produces.
#[derive(Debug, Clone, Default)]
pub struct TreeOutput {
	pub files: Vec<GeneratedFile>,
	pub manifest: ActionManifest,
}

impl TreeOutput {
	pub fn file(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
		self.files.iter().find(|file| file.path == path.as_ref())
	}
}

/// Output of one module, rendered on the worker that compiled it.
enum ModuleOutput {
	/// No action primitive imported; copied as is.
	Passthrough { source_path: String, source: String },
	Compiled {
		source_path: String,
		file_id: FileId,
		actions: Vec<ExtractedAction>,
		client: String,
		server: Option<String>,
	},
}

/// Compiles every `.rs` file below a root directory.
pub struct TreeCompiler {
	compiler: ModuleCompiler,
	root: PathBuf,
	out_dir: PathBuf,
	workers: usize,
}

impl TreeCompiler {
	/// Creates a compiler for the tree at `root`, writing into `out_dir`.
	///
	/// `out_dir` is skipped when it lies inside `root`.
	pub fn new(compiler: ModuleCompiler, root: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
		let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
		Self {
			compiler,
			root: root.into(),
			out_dir: out_dir.into(),
			workers,
		}
	}

	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers.max(1);
		self
	}

	pub fn out_dir(&self) -> &Path {
		&self.out_dir
	}

	/// Source files of the tree, sorted.
	pub fn sources(&self) -> BuildResult<Vec<PathBuf>> {
		let mut sources = Vec::new();
		let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
			let skipped = entry.file_type().is_dir()
				&& entry.depth() > 0
				&& (entry.path() == self.out_dir
					|| entry
						.file_name()
						.to_str()
						.is_some_and(|name| SKIPPED_DIRS.contains(&name)));
			!skipped
		});
		for entry in walker {
			let entry = entry.map_err(|e| {
				let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
				BuildError::io(path, std::io::Error::other(e.to_string()))
			})?;
			if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "rs") {
				sources.push(entry.into_path());
			}
		}
		sources.sort();
		Ok(sources)
	}

	/// Compiles the tree without touching the output directory.
	pub fn generate(&self) -> BuildResult<TreeOutput> {
		let sources = self.sources()?;
		let chunk_size = sources.len().div_ceil(self.workers).max(1);

		let results: Vec<BuildResult<ModuleOutput>> = std::thread::scope(|scope| {
			let handles: Vec<_> = sources
				.chunks(chunk_size)
				.map(|chunk| {
					scope.spawn(move || chunk.iter().map(|path| self.compile_path(path)).collect::<Vec<_>>())
				})
				.collect();
			handles
				.into_iter()
				.flat_map(|handle| match handle.join() {
					Ok(results) => results,
					Err(panic) => std::panic::resume_unwind(panic),
				})
				.collect()
		});

		let mut output = TreeOutput {
			files: Vec::new(),
			manifest: ActionManifest::new(self.compiler.options().endpoint.clone()),
		};
		for result in results {
			match result? {
				ModuleOutput::Passthrough { source_path, source } => {
					output.files.push(GeneratedFile::new(Path::new("client").join(source_path), source));
				}
				ModuleOutput::Compiled {
					source_path,
					file_id,
					actions,
					client,
					server,
				} => {
					output.manifest.add_module(&file_id, &source_path, &actions);
					output
						.files
						.push(GeneratedFile::new(Path::new("client").join(&source_path), client));
					if let Some(server) = server {
						output
							.files
							.push(GeneratedFile::new(format!("server/{file_id}.rs"), server));
					}
				}
			}
		}

		output.files.push(GeneratedFile::new(
			"server/mod.rs",
			output.manifest.registry_source(&self.out_dir, self.compiler.options()),
		));
		output
			.files
			.push(GeneratedFile::new(MANIFEST_FILE, output.manifest.to_json()?));

		tracing::info!(
			root = %self.root.display(),
			modules = output.manifest.modules.len(),
			actions = output.manifest.action_count(),
			"compiled action tree"
		);
		Ok(output)
	}

	/// Compiles the tree and writes every output file.
	pub fn compile_tree(&self) -> BuildResult<TreeOutput> {
		let output = self.generate()?;
		for file in &output.files {
			let path = self.out_dir.join(&file.path);
			if let Some(parent) = path.parent() {
				std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
			}
			std::fs::write(&path, &file.content).map_err(|e| BuildError::io(&path, e))?;
		}
		Ok(output)
	}

	fn compile_path(&self, path: &Path) -> BuildResult<ModuleOutput> {
		let source_path = self.relative(path);
		let source = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
		let file = syn::parse_file(&source).map_err(|e| {
			let start = e.span().start();
			BuildError::Parse {
				path: source_path.clone(),
				message: format!("{e} (at {}:{})", start.line, start.column),
			}
		})?;

		let options = self.compiler.options();
		if !module_declares_action(&module_dependencies(&file), options) && !calls_primitive_by_path(&file, options) {
			return Ok(ModuleOutput::Passthrough { source_path, source });
		}
		let compiled = self.compiler.compile_file(&source_path, file)?;
		Ok(ModuleOutput::Compiled {
			client: compiled.client_source(),
			server: compiled.server_source(),
			source_path: compiled.source_path,
			file_id: compiled.file_id,
			actions: compiled.actions,
		})
	}

	/// `path` relative to the root, with `/` separators.
	fn relative(&self, path: &Path) -> String {
		let relative = path.strip_prefix(&self.root).unwrap_or(path);
		relative
			.components()
			.map(|component| component.as_os_str().to_string_lossy())
			.collect::<Vec<_>>()
			.join("/")
	}
}
