//! Graph nodes
//!
//! A [`Node`] couples a key, the dependency keys declared by the caller, the
//! work to run and the [`CompletionSignal`] fired once that work returned.
//! Declared keys are resolved into [`Dependency`] handles when the owning
//! graph freezes; until then the node has no resolved dependencies.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use anyhow::anyhow;

use crate::signal::CompletionSignal;

/// Outcome of a node's work
pub type WorkResult = anyhow::Result<()>;

/// Boxed future returned by a [`Work`] invocation
pub type WorkFuture = Pin<Box<dyn Future<Output = WorkResult> + Send>>;

/// Shareable unit of work. Derived graphs re-add nodes with the same work.
pub type Work = Arc<dyn Fn() -> WorkFuture + Send + Sync>;

/// Wrap an async closure into a [`Work`]
pub fn work_fn<F, Fut>(f: F) -> Work
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    Arc::new(move || -> WorkFuture { Box::pin(f()) })
}

/// Work that does nothing and succeeds
pub fn noop_work() -> Work {
    work_fn(|| async { Ok(()) })
}

/// A resolved dependency: the key it was declared with and the completion
/// signal of the node it resolved to
#[derive(Debug, Clone)]
pub struct Dependency {
    pub key: String,
    completion: Arc<CompletionSignal>,
}

impl Dependency {
    pub(crate) fn new(key: String, completion: Arc<CompletionSignal>) -> Self {
        Self { key, completion }
    }

    /// Whether the dependency has finished its work
    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }
}

pub struct Node {
    key: String,
    raw_dependency_keys: Vec<String>,
    dependencies: OnceLock<Vec<Dependency>>,
    work: Work,
    completion: Arc<CompletionSignal>,
}

impl Node {
    pub fn new(key: impl Into<String>, raw_dependency_keys: Vec<String>, work: Work) -> Self {
        Self {
            key: key.into(),
            raw_dependency_keys,
            dependencies: OnceLock::new(),
            work,
            completion: Arc::new(CompletionSignal::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Dependency keys exactly as declared, duplicates and unknown keys included
    pub fn raw_dependency_keys(&self) -> &[String] {
        &self.raw_dependency_keys
    }

    /// Dependencies resolved at freeze time; empty before the graph froze
    pub fn dependencies(&self) -> &[Dependency] {
        self.dependencies.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_resolved(&self) -> bool {
        self.dependencies.get().is_some()
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    pub fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    pub(crate) fn completion_handle(&self) -> Arc<CompletionSignal> {
        Arc::clone(&self.completion)
    }

    /// Whether `key` is among the resolved dependencies
    pub fn has_dependency(&self, key: &str) -> bool {
        self.dependencies().iter().any(|d| d.key == key)
    }

    /// Record the resolved dependencies. Only the first call has an effect;
    /// returns `false` when the node was already resolved.
    pub(crate) fn resolve(&self, dependencies: Vec<Dependency>) -> bool {
        self.dependencies.set(dependencies).is_ok()
    }

    /// Suspend until every resolved dependency has fired
    pub async fn wait_for_dependencies(&self) {
        for dependency in self.dependencies() {
            dependency.completion.wait().await;
        }
    }

    /// Wait for the dependencies, run the node's own work, then fire the
    /// completion signal whatever the outcome.
    pub async fn execute(&self) -> WorkResult {
        let work = Arc::clone(&self.work);
        self.execute_with(|| {}, move || work()).await
    }

    /// Same sequence as [`Node::execute`] with a caller-supplied work factory.
    /// `on_ready` runs once the dependency waits released, right before the
    /// work is invoked.
    pub async fn execute_with<R, W, Fut>(&self, on_ready: R, make_work: W) -> WorkResult
    where
        R: FnOnce(),
        W: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        self.wait_for_dependencies().await;
        on_ready();

        // A panicking work still has to fire the signal, or every dependent
        // would wait forever.
        let result = match tokio::spawn(async move { make_work().await }).await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("work panicked: {}", e)),
        };

        self.completion.fire();
        result
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("raw_dependency_keys", &self.raw_dependency_keys)
            .field("dependencies", &self.dependencies())
            .field("done", &self.completion.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_work(counter: Arc<AtomicUsize>) -> Work {
        work_fn(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_execute_without_dependencies_runs_work_and_fires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = Node::new("solo", Vec::new(), counting_work(Arc::clone(&counter)));

        node.execute().await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(node.completion().is_done());
    }

    #[tokio::test]
    async fn test_execute_waits_for_dependency() {
        let upstream = Node::new("up", Vec::new(), noop_work());
        let downstream = Arc::new(Node::new("down", vec!["up".to_string()], noop_work()));
        assert!(downstream.resolve(vec![Dependency::new(
            "up".to_string(),
            upstream.completion_handle(),
        )]));

        let handle = {
            let downstream = Arc::clone(&downstream);
            tokio::spawn(async move { downstream.execute().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished(), "Downstream must wait for upstream");

        upstream.execute().await.unwrap();
        handle.await.unwrap().unwrap();
        assert!(downstream.completion().is_done());
    }

    #[tokio::test]
    async fn test_failed_work_still_fires() {
        let node = Node::new("broken", Vec::new(), work_fn(|| async { Err(anyhow!("boom")) }));

        let err = node.execute().await.expect_err("work failure is returned");
        assert_eq!(err.to_string(), "boom");
        assert!(node.completion().is_done());
    }

    #[tokio::test]
    async fn test_panicking_work_is_captured() {
        let node = Node::new(
            "panics",
            Vec::new(),
            work_fn(|| async {
                if true {
                    panic!("work exploded");
                }
                Ok(())
            }),
        );

        let err = node.execute().await.expect_err("panic is reported as failure");
        assert!(err.to_string().contains("panicked"));
        assert!(node.completion().is_done());
    }

    #[test]
    fn test_has_dependency_only_after_resolution() {
        let other = Node::new("other", Vec::new(), noop_work());
        let node = Node::new("node", vec!["other".to_string()], noop_work());

        assert!(!node.has_dependency("other"), "Unresolved nodes have no dependencies");
        assert!(!node.is_resolved());

        node.resolve(vec![Dependency::new("other".to_string(), other.completion_handle())]);
        assert!(node.has_dependency("other"));
        assert!(!node.has_dependency("node"));

        assert!(
            !node.resolve(Vec::new()),
            "Second resolution must be rejected"
        );
        assert!(node.has_dependency("other"));
    }
}
