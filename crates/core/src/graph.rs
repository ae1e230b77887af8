//! Dependency graph
//!
//! A [`Graph`] owns its nodes and the dependency relation between them. It is
//! open while callers add nodes and becomes immutable once frozen: freezing
//! deduplicates every node's declared dependency keys and resolves them to
//! the completion signals of the nodes they name. Keys that name no node are
//! dropped with an informational diagnostic.
//!
//! Frozen graphs can be cut down into fresh graphs with the closure and
//! filter operations in [`closure`], and executed with [`Graph::run`] or
//! [`Graph::dry_run`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use parathread_core::{work_fn, Graph};
//!
//! # async fn example() {
//! let mut graph = Graph::new();
//! graph.add("bar", &[], work_fn(|| async { Ok(()) }));
//! graph.add("foo", &["bar"], work_fn(|| async { Ok(()) }));
//! graph.add("test", &["foo", "bar"], work_fn(|| async { Ok(()) }));
//!
//! let report = graph.run().await;
//! assert_eq!(report.len(), 3);
//! # }
//! ```

pub mod closure;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use tracing::{debug, info};

use crate::execution::Executor;
use crate::node::{Dependency, Node, Work};
use crate::results::RunReport;
use crate::sink::LogSink;
use crate::types::{ParathreadError, ParathreadResult};

/// Owning collection of nodes plus their frozen dependency relation
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<String, Arc<Node>>,
    frozen: bool,
    logger: Option<Arc<LogSink>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty open graph sharing this graph's logger
    pub(crate) fn derived(&self) -> Self {
        Self {
            nodes: HashMap::new(),
            frozen: false,
            logger: self.logger.clone(),
        }
    }

    /// Add a node, replacing any node already registered under `key`.
    ///
    /// # Panics
    ///
    /// Adding to a frozen graph is a programming error and panics; use
    /// [`Graph::try_add`] to get an error instead.
    #[allow(clippy::panic)]
    #[track_caller]
    pub fn add(&mut self, key: &str, dependency_keys: &[&str], work: Work) {
        if let Err(e) = self.try_add(key, dependency_keys, work) {
            panic!("{}", e);
        }
    }

    /// Add a node, or fail with [`ParathreadError::GraphFrozen`]
    pub fn try_add(&mut self, key: &str, dependency_keys: &[&str], work: Work) -> ParathreadResult<()> {
        let dependency_keys = dependency_keys.iter().map(|k| k.to_string()).collect();
        self.try_add_node(Node::new(key, dependency_keys, work))
    }

    /// Add a pre-built node, replacing any node with the same key.
    ///
    /// # Panics
    ///
    /// Panics when the graph is frozen, like [`Graph::add`].
    #[allow(clippy::panic)]
    #[track_caller]
    pub fn add_node(&mut self, node: Node) {
        if let Err(e) = self.try_add_node(node) {
            panic!("{}", e);
        }
    }

    pub fn try_add_node(&mut self, node: Node) -> ParathreadResult<()> {
        if self.frozen {
            return Err(ParathreadError::GraphFrozen(node.key().to_string()));
        }
        if self.nodes.contains_key(node.key()) {
            debug!(key = node.key(), "Replacing existing node");
        }
        self.nodes.insert(node.key().to_string(), Arc::new(node));
        Ok(())
    }

    /// Resolve every node's declared dependency keys and forbid further
    /// additions. Calling it again on a frozen graph does nothing.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen = true;

        for node in self.nodes.values() {
            let keys: HashSet<&str> = node
                .raw_dependency_keys()
                .iter()
                .map(String::as_str)
                .collect();

            let mut dependencies = Vec::with_capacity(keys.len());
            for key in keys {
                match self.nodes.get(key) {
                    Some(dependency) => dependencies.push(Dependency::new(
                        key.to_string(),
                        dependency.completion_handle(),
                    )),
                    None => info!(
                        node = node.key(),
                        dependency = key,
                        "Dependency ignored: no node with this key"
                    ),
                }
            }

            if !node.resolve(dependencies) {
                debug!(key = node.key(), "Node was already resolved, keeping its dependencies");
            }
        }

        debug!(nodes = self.nodes.len(), "Graph frozen");
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Attach the status sink that receives per-node progress messages.
    /// Graphs derived from this one share the same sink.
    pub fn attach_logger(&mut self, sink: Arc<LogSink>) {
        self.logger = Some(sink);
    }

    pub fn logger(&self) -> Option<&Arc<LogSink>> {
        self.logger.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    /// Node keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    /// Run every node concurrently with the default executor settings.
    ///
    /// Freezes the graph first if needed. Completion signals are not reset
    /// afterwards, so a graph must only be run once, and the graph must be
    /// acyclic: a dependency cycle blocks the run forever.
    pub async fn run(&mut self) -> RunReport {
        Executor::default().run(self).await
    }

    /// Same orchestration as [`Graph::run`], replacing every node's work by
    /// a fixed delay
    pub async fn dry_run(&mut self) -> RunReport {
        Executor::default().dry_run(self).await
    }

    /// Render the resolved dependency relation as Graphviz DOT, with edges
    /// pointing from a node to the nodes it depends on
    pub fn to_dot(&self) -> String {
        // Both weights need `Display` so labels are written unquoted
        let mut graph = DiGraph::<&str, &str>::new();
        let mut indices = HashMap::new();

        for key in self.keys() {
            indices.insert(key, graph.add_node(key));
        }

        for key in self.keys() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            let mut dependency_keys: Vec<&str> =
                node.dependencies().iter().map(|d| d.key.as_str()).collect();
            dependency_keys.sort_unstable();

            for dependency in dependency_keys {
                // Dependencies left dangling by `exclude_keys` have no vertex
                if let Some(&to) = indices.get(dependency) {
                    graph.add_edge(indices[key], to, "");
                }
            }
        }

        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Length: {}", self.nodes.len())?;
        writeln!(f, "Frozen: {}", self.frozen)?;
        writeln!(f, "Keys:")?;
        for key in self.keys() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            let mut dependency_keys: Vec<&str> =
                node.dependencies().iter().map(|d| d.key.as_str()).collect();
            dependency_keys.sort_unstable();
            writeln!(
                f,
                "{} depends on {} nodes ({})",
                key,
                dependency_keys.len(),
                dependency_keys.join(", ")
            )?;
        }
        Ok(())
    }
}
