//! Auxiliary subcommands for driving the stores without a session.

pub mod history;
pub mod memory;
pub mod plan;
