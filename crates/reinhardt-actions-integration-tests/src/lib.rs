//! Actions from `actions/`, compiled by this crate's build script.
//!
//! [`client`] holds the calling-side outputs, where every action is a
//! descriptor. [`server`] holds the hosting-side outputs and
//! `compiled_modules()`, which feeds an action registry.

pub mod client {
	pub mod math {
		include!(concat!(env!("OUT_DIR"), "/actions/client/math.rs"));
	}

	pub mod jobs {
		include!(concat!(env!("OUT_DIR"), "/actions/client/jobs.rs"));
	}
}

pub mod server {
	include!(concat!(env!("OUT_DIR"), "/actions/server/mod.rs"));
}
