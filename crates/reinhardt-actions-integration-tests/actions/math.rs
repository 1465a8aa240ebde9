use reinhardt_actions::{Action, ActionClient, ActionError, CallAction, CallContext, Value, create_action};
use std::fmt::Write;

pub static INCREMENT: Action = create_action(|ctx: CallContext| async move {
	let x = ctx.data.get("x").and_then(Value::as_i64).unwrap_or_default();
	Ok(Value::record([("data", Value::record([("y", Value::Int(x + 1))]))]))
});

pub static VALIDATE: Action = create_action(|_ctx: CallContext| async move {
	Err(ActionError::new("bad input")
		.with_status(422)
		.with_key("E_BAD_INPUT")
		.with_data(Value::record([("field", Value::from("x"))])))
});

pub static LEAKY: Action = create_action(|_ctx: CallContext| async move {
	Ok(Value::record([("data", Value::Null), ("redirect", Value::from("/"))]))
});

pub static GREET: Action = create_action(|ctx: CallContext| async move {
	let mut greeting = String::new();
	write!(greeting, "hello {}", ctx.data.as_str().unwrap_or("world"))
		.map_err(|e| ActionError::new(e.to_string()))?;
	Ok(Value::record([("data", Value::from(greeting))]))
});

pub static FORWARD: Action = create_action(|ctx: CallContext| async move {
	let mut forwarded = CallContext::new(ctx.data);
	forwarded.transport = ctx.transport;
	let output = INCREMENT.call_with(&ActionClient::new()?, forwarded).await?;
	Ok(Value::record([("data", output.value)]))
});

pub static TWICE: Action = create_action(|ctx: CallContext| async move {
	let double = create_action(|inner: CallContext| async move {
		let x = inner.data.get("x").and_then(Value::as_i64).unwrap_or_default();
		Ok(Value::record([("data", Value::Int(x * 2))]))
	});
	let mut forwarded = CallContext::new(ctx.data);
	forwarded.transport = ctx.transport;
	let output = double.call_with(&ActionClient::new()?, forwarded).await?;
	Ok(Value::record([("data", output.value)]))
});

pub fn heading() -> &'static str {
	"Math"
}
