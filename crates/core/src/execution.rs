//! Graph execution module
//!
//! This module drives the concurrent execution of a frozen graph and turns
//! node configurations into runnable work.

pub mod command;
pub mod runner;

pub use command::CommandExecutor;
pub use runner::{Executor, ExecutorConfig};
