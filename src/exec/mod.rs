// src/exec/mod.rs

//! Process-backed tasks.
//!
//! [`CommandTask`] runs a shell command with `tokio::process::Command` and
//! counts a zero exit status as a successful initialization.

pub mod command;

pub use command::CommandTask;
