//! Parathread Core Library
//!
//! Parathread runs named units of work ("nodes") concurrently while making
//! sure a node only starts once every node it depends on has finished.
//!
//! ## Architecture
//!
//! The core library is organized into several modules:
//!
//! - [`signal`] - One-shot completion signal fired when a node's work returns
//! - [`node`] - Node identity, declared dependencies and work
//! - [`graph`] - Graph construction, freezing, closure extraction and filtering
//! - [`execution`] - Concurrent runner and command-backed work
//! - [`sink`] - Fire-and-forget status log with an explicit drain
//! - [`results`] - Per-node outcomes of a run
//! - [`configs`] - Thread file format
//! - [`thread_manager`] - Loading thread files into graphs
//! - [`colors`] - Terminal colors for node keys
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use parathread_core::{work_fn, Graph, LogSink, TracingWriter};
//!
//! # async fn example() -> parathread_core::ParathreadResult<()> {
//! let mut graph = Graph::new();
//! graph.attach_logger(LogSink::spawn(TracingWriter));
//! graph.add("bar", &[], work_fn(|| async { Ok(()) }));
//! graph.add("foo", &["bar"], work_fn(|| async { Ok(()) }));
//! graph.add("test", &["foo", "bar"], work_fn(|| async { Ok(()) }));
//!
//! // Re-run only what depends on "foo"
//! let mut partial = graph.rebuild_to_key("foo")?;
//! let report = partial.run().await;
//! # Ok(())
//! # }
//! ```

pub mod colors;
pub mod configs;
pub mod execution;
pub mod graph;
pub mod node;
pub mod results;
pub mod signal;
pub mod sink;
pub mod thread_manager;
pub mod types;

// Re-export the main types for easier usage
pub use execution::{Executor, ExecutorConfig};
pub use graph::Graph;
pub use node::{noop_work, work_fn, Node, Work, WorkResult};
pub use results::{NodeOutcome, RunReport};
pub use signal::CompletionSignal;
pub use sink::{LogMessage, LogSink, LogWriter, TracingWriter, WriteFuture};
pub use types::{ParathreadError, ParathreadResult};
