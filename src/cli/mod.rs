//! Command-line interface for the `tplindex` binary.
//!
//! Argument parsing lives in [`args`]; each command in [`commands`].

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
