//! High-level thread file interface
//!
//! The [`ThreadManager`] loads a thread file, turns every configured node into
//! a graph node backed by its command or script, and applies the partial
//! re-execution selection requested by the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use parathread_core::thread_manager::{KeySelector, Selection, ThreadManager};
//! use std::path::Path;
//!
//! # async fn example() -> parathread_core::ParathreadResult<()> {
//! let manager = ThreadManager::load(Path::new("thread.yml"))?;
//!
//! let selection = Selection {
//!     from: Some(KeySelector::Pattern("^load".to_string())),
//!     ..Selection::default()
//! };
//! let mut graph = manager.select(manager.build_graph()?, &selection)?;
//!
//! let report = graph.run().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::configs::thread::{load_thread_config, LoggerConfig, ThreadFileConfig};
use crate::execution::command::CommandExecutor;
use crate::graph::Graph;
use crate::node::Node;
use crate::types::ParathreadResult;

/// One node or every node matching a regular expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    Key(String),
    Pattern(String),
}

/// Part of a graph to keep for a run. Applied in order: backward closure
/// (`from`), forward closure (`to`), then exclusion.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub from: Option<KeySelector>,
    pub to: Option<KeySelector>,
    pub exclude: Option<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.exclude.is_none()
    }
}

/// Loaded thread file plus the directory its commands run in
pub struct ThreadManager {
    pub config: ThreadFileConfig,
    pub root: PathBuf,
}

impl ThreadManager {
    /// Load a thread file; commands run in the directory containing it
    pub fn load(path: &Path) -> ParathreadResult<Self> {
        let config = load_thread_config(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::from_config(config, root))
    }

    pub fn from_config(config: ThreadFileConfig, root: PathBuf) -> Self {
        Self { config, root }
    }

    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("thread")
    }

    pub fn logger_config(&self) -> LoggerConfig {
        self.config.logger.clone().unwrap_or_default()
    }

    /// Build an open graph with one command-backed node per configured node
    pub fn build_graph(&self) -> ParathreadResult<Graph> {
        let executor = CommandExecutor::new(&self.root);
        let mut graph = Graph::new();
        let mut seen = HashSet::new();

        for node in &self.config.nodes {
            if !seen.insert(node.key.as_str()) {
                warn!(key = %node.key, "Node declared twice, the last declaration wins");
            }
            let work = executor.work_for(node)?;
            graph.try_add_node(Node::new(
                node.key.clone(),
                node.dependencies.clone().unwrap_or_default(),
                work,
            ))?;
        }

        Ok(graph)
    }

    /// Cut `graph` down to `selection`
    pub fn select(&self, mut graph: Graph, selection: &Selection) -> ParathreadResult<Graph> {
        if let Some(from) = &selection.from {
            graph = match from {
                KeySelector::Key(key) => graph.rebuild_from_key(key)?,
                KeySelector::Pattern(pattern) => graph.rebuild_from_regex(pattern)?,
            };
        }

        if let Some(to) = &selection.to {
            graph = match to {
                KeySelector::Key(key) => graph.rebuild_to_key(key)?,
                KeySelector::Pattern(pattern) => graph.rebuild_to_regex(pattern)?,
            };
        }

        if let Some(pattern) = &selection.exclude {
            graph = graph.exclude_keys(pattern)?;
        }

        Ok(graph)
    }
}
