//! Compiles a small multi-module tree and checks the outputs against each other.

use reinhardt_actions_build::{ActionManifest, BuildError, ModuleCompiler, TransformOptions, TreeCompiler};
use rstest::{fixture, rstest};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const USERS: &str = r#"
use reinhardt_actions::{Action, CallContext, Value, create_action};
use crate::db::load_user;

fn to_value(name: String) -> Value {
	Value::record([("name", Value::from(name))])
}

pub static GET_USER: Action = create_action(|ctx: CallContext| async move {
	let name = load_user(ctx.data.as_i64().unwrap_or_default()).await;
	Ok(Value::record([("data", to_value(name))]))
});

pub fn title() -> &'static str {
	"Users"
}
"#;

const ORDERS: &str = r#"
use reinhardt_actions as actions;
use reinhardt_actions::create_action as action;

pub fn list_orders() -> actions::Action {
	action(|_ctx: actions::CallContext| async move { Ok(actions::Value::Null) })
}
"#;

fn write(root: &Path, path: &str, content: &str) {
	let path = root.join(path);
	fs::create_dir_all(path.parent().unwrap()).unwrap();
	fs::write(path, content).unwrap();
}

#[fixture]
fn project() -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	write(dir.path(), "src/users.rs", USERS);
	write(dir.path(), "src/orders.rs", ORDERS);
	write(dir.path(), "src/db.rs", "pub async fn load_user(id: i64) -> String { id.to_string() }\n");
	dir
}

#[rstest]
fn test_tree_outputs_are_consistent(project: TempDir) {
	// Arrange
	let out = project.path().join("generated");
	let options = TransformOptions::default().with_endpoint("/rpc");
	let compiler = TreeCompiler::new(ModuleCompiler::new(options), project.path(), &out);

	// Act
	let output = compiler.compile_tree().unwrap();

	// Assert
	let manifest: ActionManifest =
		serde_json::from_str(&fs::read_to_string(out.join("actions.json")).unwrap()).unwrap();
	assert_eq!(manifest, output.manifest);
	assert_eq!(manifest.endpoint, "/rpc");
	let sources: Vec<_> = manifest.modules.iter().map(|m| m.source_path.as_str()).collect();
	assert_eq!(sources, vec!["src/orders.rs", "src/users.rs"]);
	assert_eq!(manifest.modules[0].actions[0].function_name, "list_orders");
	assert_eq!(manifest.modules[1].actions[0].function_name, "GET_USER");

	let client = fs::read_to_string(out.join("client/src/users.rs")).unwrap();
	assert!(client.contains("endpoint: ::std::borrow::Cow::Borrowed(\"/rpc\")"));
	assert!(client.contains("pub fn title()"));
	assert!(!client.contains("load_user"));
	assert!(!client.contains("fn to_value"));

	for module in &manifest.modules {
		let server = fs::read_to_string(out.join(&module.server_output)).unwrap();
		syn::parse_file(&server).unwrap();
		for action in &module.actions {
			assert!(server.contains(&format!("pub fn {}()", action.export_name)));
			assert!(client_for(&out, &module.source_path).contains(&action.action_id));
		}
	}

	let registry = fs::read_to_string(out.join("server/mod.rs")).unwrap();
	assert_eq!(registry.matches("pub mod module_").count(), 2);
	assert_eq!(
		fs::read_to_string(out.join("client/src/db.rs")).unwrap(),
		"pub async fn load_user(id: i64) -> String { id.to_string() }\n"
	);
}

fn client_for(out: &Path, source_path: &str) -> String {
	fs::read_to_string(out.join("client").join(source_path)).unwrap()
}

#[rstest]
fn test_renamed_export_fails_the_tree(project: TempDir) {
	write(
		project.path(),
		"src/reexport.rs",
		"use reinhardt_actions::{Action, create_action};\nstatic INNER: Action = create_action(handler);\npub use self::INNER as OUTER;",
	);

	let error = TreeCompiler::new(ModuleCompiler::default(), project.path(), project.path().join("out"))
		.generate()
		.unwrap_err();

	assert!(error.is_contract_violation());
	assert!(matches!(error, BuildError::RenamedExport { ref exported_as, .. } if exported_as == "OUTER"));
}
