//! Concurrent graph runner
//!
//! One tokio task is spawned per node as soon as the run starts. Each task
//! waits on its dependencies' completion signals, invokes the work and fires
//! its own signal. The run returns once every task has reported its outcome
//! and the attached status sink, if any, has drained.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::graph::Graph;
use crate::node::{Node, WorkFuture};
use crate::results::{NodeOutcome, RunReport};
use crate::sink::LogSink;

/// Default synthetic work duration of a dry run
pub const DEFAULT_DRY_RUN_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How long each node "works" during a dry run
    pub dry_run_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run_delay: DEFAULT_DRY_RUN_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Live,
    Dry,
}

/// Where status lines go: the attached sink for live runs, `tracing` for
/// dry runs
#[derive(Clone)]
struct StatusReporter {
    sink: Option<Arc<LogSink>>,
    mode: RunMode,
}

impl StatusReporter {
    fn report(&self, key: &str, message: &str) {
        match self.mode {
            RunMode::Live => {
                debug!(key, "{}", message);
                if let Some(sink) = &self.sink {
                    sink.push(key, message);
                }
            }
            RunMode::Dry => info!("Dry run - {}: {}", key, message),
        }
    }
}

/// Runs every node of a graph concurrently
#[derive(Debug, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Freeze the graph if needed and run every node's work
    pub async fn run(&self, graph: &mut Graph) -> RunReport {
        self.execute(graph, RunMode::Live).await
    }

    /// Freeze the graph if needed and walk it with a fixed delay in place of
    /// each node's work. No caller-supplied work is invoked.
    pub async fn dry_run(&self, graph: &mut Graph) -> RunReport {
        self.execute(graph, RunMode::Dry).await
    }

    async fn execute(&self, graph: &mut Graph, mode: RunMode) -> RunReport {
        graph.freeze();

        let started = Instant::now();
        let reporter = StatusReporter {
            sink: graph.logger().cloned(),
            mode,
        };

        let mut tasks = JoinSet::new();
        let mut task_keys = HashMap::with_capacity(graph.len());
        for node in graph.nodes() {
            reporter.report(node.key(), "pending...");

            let key = node.key().to_string();
            let node = Arc::clone(node);
            let reporter = reporter.clone();
            let dry_run_delay = self.config.dry_run_delay;
            let handle = tasks.spawn(async move { run_node(node, reporter, dry_run_delay).await });
            task_keys.insert(handle.id(), key);
        }

        // Global barrier: one entry per node
        let mut outcomes = HashMap::with_capacity(graph.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    outcomes.insert(outcome.key.clone(), outcome);
                }
                Err(e) => {
                    let Some(key) = task_keys.remove(&e.id()) else {
                        error!("Unknown node task did not complete: {}", e);
                        continue;
                    };
                    error!(key = %key, "Node task did not complete: {}", e);
                    let message = format!("node task did not complete ({})", e);
                    reporter.report(&key, &format!("failed ({})", message));
                    let now = Instant::now();
                    outcomes.insert(
                        key.clone(),
                        NodeOutcome {
                            key,
                            waited: Duration::ZERO,
                            started_at: now,
                            finished_at: now,
                            error: Some(message),
                        },
                    );
                }
            }
        }

        if let Some(sink) = graph.logger() {
            sink.drain().await;
        }

        let duration = started.elapsed();
        debug!(nodes = outcomes.len(), ?duration, "Run finished");
        RunReport { outcomes, duration }
    }
}

async fn run_node(node: Arc<Node>, reporter: StatusReporter, dry_run_delay: Duration) -> NodeOutcome {
    let queued_at = Instant::now();
    let mut started_at = None;

    let make_work: Box<dyn FnOnce() -> WorkFuture + Send> = match reporter.mode {
        RunMode::Live => {
            let work = Arc::clone(node.work());
            Box::new(move || work())
        }
        RunMode::Dry => Box::new(move || -> WorkFuture {
            Box::pin(async move {
                tokio::time::sleep(dry_run_delay).await;
                Ok(())
            })
        }),
    };

    let result = node
        .execute_with(
            || {
                let now = Instant::now();
                started_at = Some(now);
                reporter.report(
                    node.key(),
                    &format!("executing... (waited {:?})", now.duration_since(queued_at)),
                );
            },
            make_work,
        )
        .await;

    let finished_at = Instant::now();
    let started_at = started_at.unwrap_or(finished_at);

    let error = match result {
        Ok(()) => {
            reporter.report(
                node.key(),
                &format!("done (duration: {:?})", finished_at.duration_since(started_at)),
            );
            None
        }
        Err(e) => {
            let message = format!("{:#}", e);
            reporter.report(node.key(), &format!("failed ({})", message));
            Some(message)
        }
    };

    NodeOutcome {
        key: node.key().to_string(),
        waited: started_at.duration_since(queued_at),
        started_at,
        finished_at,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::work_fn;
    use crate::sink::MemoryWriter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Timeline = Arc<Mutex<Vec<String>>>;

    /// Work recording "start:key" and "end:key" around a short sleep
    fn traced_work(key: &'static str, timeline: &Timeline) -> crate::node::Work {
        let timeline = Arc::clone(timeline);
        work_fn(move || {
            let timeline = Arc::clone(&timeline);
            async move {
                timeline.lock().unwrap().push(format!("start:{}", key));
                tokio::time::sleep(Duration::from_millis(10)).await;
                timeline.lock().unwrap().push(format!("end:{}", key));
                Ok(())
            }
        })
    }

    fn position(timeline: &[String], entry: &str) -> usize {
        timeline
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{} missing from timeline", entry))
    }

    #[tokio::test]
    async fn test_run_respects_dependency_order() {
        let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
        let mut graph = Graph::new();
        graph.add("test", &["foo", "bar"], traced_work("test", &timeline));
        graph.add("foo", &["bar"], traced_work("foo", &timeline));
        graph.add("bar", &[], traced_work("bar", &timeline));

        let report = graph.run().await;
        assert_eq!(report.len(), 3);
        assert!(report.failures().is_empty());

        let timeline = timeline.lock().unwrap().clone();
        assert!(position(&timeline, "end:bar") < position(&timeline, "start:foo"));
        assert!(position(&timeline, "end:bar") < position(&timeline, "start:test"));
        assert!(position(&timeline, "end:foo") < position(&timeline, "start:test"));

        let bar = report.outcome("bar").unwrap();
        let foo = report.outcome("foo").unwrap();
        let test = report.outcome("test").unwrap();
        assert!(bar.finished_at <= foo.started_at);
        assert!(foo.finished_at <= test.started_at);
    }

    #[tokio::test]
    async fn test_independent_nodes_run_concurrently() {
        let mut graph = Graph::new();
        for key in ["a", "b", "c", "d"] {
            graph.add(
                key,
                &[],
                work_fn(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(())
                }),
            );
        }

        let report = graph.run().await;
        assert_eq!(report.len(), 4);
        assert!(
            report.duration < Duration::from_millis(350),
            "Four independent 100ms nodes should overlap, took {:?}",
            report.duration
        );
    }

    #[tokio::test]
    async fn test_missing_dependency_does_not_block() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();
        let work_counter = Arc::clone(&counter);
        graph.add(
            "x",
            &["missing"],
            work_fn(move || {
                let counter = Arc::clone(&work_counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let report = tokio::time::timeout(Duration::from_secs(1), graph.run())
            .await
            .expect("a dangling dependency must not block the run");

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(report.outcome("x").unwrap().succeeded());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_dependents() {
        let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
        let mut graph = Graph::new();
        graph.add(
            "broken",
            &[],
            work_fn(|| async { Err(anyhow::anyhow!("disk full")) }),
        );
        graph.add("after", &["broken"], traced_work("after", &timeline));

        let report = graph.run().await;

        let broken = report.outcome("broken").unwrap();
        assert_eq!(broken.error.as_deref(), Some("disk full"));
        assert!(report.outcome("after").unwrap().succeeded());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(timeline.lock().unwrap().len(), 2, "Dependent still ran");
    }

    #[tokio::test]
    async fn test_run_pushes_status_lines_and_drains() {
        let writer = Arc::new(MemoryWriter::with_delay(Duration::from_millis(2)));
        let sink = LogSink::spawn(Arc::clone(&writer));

        let mut graph = Graph::new();
        graph.attach_logger(Arc::clone(&sink));
        graph.add("ok", &[], work_fn(|| async { Ok(()) }));
        graph.add(
            "ko",
            &["ok"],
            work_fn(|| async { Err(anyhow::anyhow!("bad input")) }),
        );

        graph.run().await;

        assert_eq!(sink.pending(), 0, "Run returns only after the sink drained");

        let ok = writer.messages_for("ok");
        assert_eq!(ok.len(), 3);
        assert_eq!(ok[0], "pending...");
        assert!(ok[1].starts_with("executing..."));
        assert!(ok[2].starts_with("done (duration:"));

        let ko = writer.messages_for("ko");
        assert_eq!(ko.len(), 3);
        assert_eq!(ko[2], "failed (bad input)");
    }

    #[tokio::test]
    async fn test_dry_run_skips_work_and_keeps_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let writer = Arc::new(MemoryWriter::new());
        let sink = LogSink::spawn(Arc::clone(&writer));

        let mut graph = Graph::new();
        graph.attach_logger(sink);
        for (key, deps) in [("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])] {
            let counter = Arc::clone(&counter);
            graph.add(
                key,
                &deps,
                work_fn(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            );
        }

        let executor = Executor::new(ExecutorConfig {
            dry_run_delay: Duration::from_millis(30),
        });
        let report = executor.dry_run(&mut graph).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0, "Dry run never invokes work");
        assert!(writer.messages().is_empty(), "Dry run reports through tracing only");

        let order: Vec<&str> = report
            .in_start_order()
            .iter()
            .map(|o| o.key.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(report.duration >= Duration::from_millis(90));
        assert!(report.outcome("c").unwrap().duration() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_run_freezes_open_graph() {
        let mut graph = Graph::new();
        graph.add("a", &[], work_fn(|| async { Ok(()) }));
        assert!(!graph.is_frozen());

        graph.run().await;
        assert!(graph.is_frozen());
        assert!(graph.get("a").unwrap().completion().is_done());
    }

    #[tokio::test]
    async fn test_rerun_reports_every_node_as_failed() {
        let mut graph = Graph::new();
        graph.add("a", &[], work_fn(|| async { Ok(()) }));
        graph.add("b", &["a"], work_fn(|| async { Ok(()) }));

        let first = graph.run().await;
        assert!(first.failures().is_empty());

        // Signals fire once, so a second run cannot complete any node
        let second = tokio::time::timeout(Duration::from_secs(2), graph.run())
            .await
            .expect("second run still terminates");
        assert_eq!(second.len(), 2, "Every node keeps an entry");
        let failed: Vec<&str> = second.failures().iter().map(|o| o.key.as_str()).collect();
        assert_eq!(failed, vec!["a", "b"]);
        assert!(second
            .outcome("a")
            .and_then(|o| o.error.as_deref())
            .is_some_and(|e| e.starts_with("node task did not complete")));
    }

    #[tokio::test]
    async fn test_panicking_status_writer_does_not_hang_run() {
        struct PanickingWriter;

        impl crate::sink::LogWriter for PanickingWriter {
            fn write<'a>(
                &'a self,
                _message: &'a crate::sink::LogMessage,
            ) -> crate::sink::WriteFuture<'a> {
                panic!("status endpoint exploded");
            }
        }

        let mut graph = Graph::new();
        graph.attach_logger(LogSink::spawn(PanickingWriter));
        graph.add("only", &[], work_fn(|| async { Ok(()) }));

        let report = tokio::time::timeout(Duration::from_secs(2), graph.run())
            .await
            .expect("run returns once the sink drained");
        assert!(report.outcome("only").unwrap().succeeded());
        assert_eq!(graph.logger().unwrap().pending(), 0);
    }

    #[tokio::test]
    async fn test_empty_graph_runs() {
        let mut graph = Graph::new();
        let report = graph.run().await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_wide_diamond_terminates() {
        let completed = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();

        let keys: Vec<String> = (0..50).map(|i| format!("mid-{}", i)).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let counting = |completed: &Arc<AtomicUsize>| {
            let completed = Arc::clone(completed);
            work_fn(move || {
                let completed = Arc::clone(&completed);
                async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        graph.add("root", &[], counting(&completed));
        for key in &key_refs {
            graph.add(key, &["root"], counting(&completed));
        }
        graph.add("sink", &key_refs, counting(&completed));

        let report = tokio::time::timeout(Duration::from_secs(5), graph.run())
            .await
            .expect("acyclic graph terminates");
        assert_eq!(report.len(), 52);
        assert_eq!(completed.load(Ordering::SeqCst), 52);

        let sink = report.outcome("sink").unwrap();
        for key in &key_refs {
            assert!(report.outcome(key).unwrap().finished_at <= sink.started_at);
        }
    }
}
