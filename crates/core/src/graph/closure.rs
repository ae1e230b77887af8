//! Closure extraction and filtering
//!
//! These operations cut a graph down to the part a caller wants to re-run.
//! The closures build a fresh graph: every selected node is re-added from its
//! declared key, declared dependency keys and work, and the new graph is
//! frozen on its own, so it gets new completion signals and can be run
//! independently of the source.
//!
//! - backward closure ([`Graph::rebuild_from_key`]): the matched nodes and
//!   everything they transitively depend on
//! - forward closure ([`Graph::rebuild_to_key`]): the matched nodes and
//!   everything that transitively depends on them
//!
//! [`Graph::exclude_keys`] is a plain filter instead: it shares the kept nodes
//! with the source graph, dependencies included, without resolving them again.
//!
//! Traversal keeps a visited set, so extracting a closure from a cyclic graph
//! terminates. Running a cyclic graph still blocks forever.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::graph::Graph;
use crate::node::Node;
use crate::types::{ParathreadError, ParathreadResult};

impl Graph {
    /// Backward closure of the node registered under `key`
    pub fn rebuild_from_key(&mut self, key: &str) -> ParathreadResult<Graph> {
        self.freeze();
        self.ensure_key(key)?;
        Ok(self.backward_closure(|k| k == key))
    }

    /// Backward closure of every node whose key matches `pattern`
    pub fn rebuild_from_regex(&mut self, pattern: &str) -> ParathreadResult<Graph> {
        let pattern = Regex::new(pattern)?;
        self.freeze();
        Ok(self.backward_closure(|k| pattern.is_match(k)))
    }

    /// Forward closure of the node registered under `key`
    pub fn rebuild_to_key(&mut self, key: &str) -> ParathreadResult<Graph> {
        self.freeze();
        self.ensure_key(key)?;
        Ok(self.forward_closure(|k| k == key))
    }

    /// Forward closure of every node whose key matches `pattern`
    pub fn rebuild_to_regex(&mut self, pattern: &str) -> ParathreadResult<Graph> {
        let pattern = Regex::new(pattern)?;
        self.freeze();
        Ok(self.forward_closure(|k| pattern.is_match(k)))
    }

    /// Copy every node whose key does not match `pattern`.
    ///
    /// The kept nodes are shared with this graph and keep the dependencies
    /// resolved here. A dependency on an excluded node is not dropped: it
    /// still points at that node's completion signal, which the returned
    /// graph never fires, so running it blocks the dependents of excluded
    /// nodes.
    pub fn exclude_keys(&mut self, pattern: &str) -> ParathreadResult<Graph> {
        let pattern = Regex::new(pattern)?;
        self.freeze();

        let mut filtered = self.derived();
        for node in self.nodes() {
            if !pattern.is_match(node.key()) {
                filtered.nodes.insert(node.key().to_string(), Arc::clone(node));
            }
        }
        // Already resolved against the source graph
        filtered.frozen = true;

        debug!(
            kept = filtered.len(),
            excluded = self.len() - filtered.len(),
            "Excluded keys"
        );
        Ok(filtered)
    }

    /// Matched nodes plus every node reachable through resolved dependencies
    pub fn backward_closure<P>(&self, predicate: P) -> Graph
    where
        P: Fn(&str) -> bool,
    {
        self.closure(predicate, |node| {
            node.dependencies()
                .iter()
                .filter_map(|dependency| self.get(&dependency.key))
                .collect()
        })
    }

    /// Matched nodes plus every node that transitively depends on them
    pub fn forward_closure<P>(&self, predicate: P) -> Graph
    where
        P: Fn(&str) -> bool,
    {
        self.closure(predicate, |node| {
            self.nodes()
                .filter(|candidate| candidate.has_dependency(node.key()))
                .collect()
        })
    }

    fn closure<'a, P, N>(&'a self, predicate: P, next: N) -> Graph
    where
        P: Fn(&str) -> bool,
        N: Fn(&'a Node) -> Vec<&'a Arc<Node>>,
    {
        let mut rebuilt = self.derived();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&Arc<Node>> = self.nodes().filter(|n| predicate(n.key())).collect();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.key()) {
                continue;
            }

            rebuilt.nodes.insert(
                node.key().to_string(),
                Arc::new(Node::new(
                    node.key(),
                    node.raw_dependency_keys().to_vec(),
                    Arc::clone(node.work()),
                )),
            );

            for neighbor in next(node.as_ref()) {
                if !visited.contains(neighbor.key()) {
                    stack.push(neighbor);
                }
            }
        }

        rebuilt.freeze();
        rebuilt
    }

    fn ensure_key(&self, key: &str) -> ParathreadResult<()> {
        if self.contains_key(key) {
            Ok(())
        } else {
            Err(ParathreadError::UnknownKey(key.to_string()))
        }
    }
}
