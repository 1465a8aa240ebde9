pub static PING: reinhardt_actions::Action =
	reinhardt_actions::create_action(|_ctx: reinhardt_actions::CallContext| async move {
		Ok(reinhardt_actions::Value::record([("data", reinhardt_actions::Value::from("pong"))]))
	});
