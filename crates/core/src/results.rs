//! Result types for graph runs
//!
//! A run never fails as a whole: every node reports its own outcome and
//! callers correlate them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What happened to a single node during a run
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub key: String,
    /// Time spent waiting for dependencies
    pub waited: Duration,
    /// When the work was invoked
    pub started_at: Instant,
    /// When the work returned
    pub finished_at: Instant,
    /// Failure message, `None` when the work succeeded
    pub error: Option<String>,
}

impl NodeOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }
}

/// Per-node outcomes of a run
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: HashMap<String, NodeOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn outcome(&self, key: &str) -> Option<&NodeOutcome> {
        self.outcomes.get(key)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes of the nodes whose work failed, sorted by key
    pub fn failures(&self) -> Vec<&NodeOutcome> {
        let mut failures: Vec<&NodeOutcome> =
            self.outcomes.values().filter(|o| !o.succeeded()).collect();
        failures.sort_by(|a, b| a.key.cmp(&b.key));
        failures
    }

    /// Outcomes sorted by the moment their work started
    pub fn in_start_order(&self) -> Vec<&NodeOutcome> {
        let mut outcomes: Vec<&NodeOutcome> = self.outcomes.values().collect();
        outcomes.sort_by_key(|o| o.started_at);
        outcomes
    }
}
