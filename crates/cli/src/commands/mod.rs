pub mod graph;
pub mod run;
pub mod schema;

use clap::Args;
use parathread_core::thread_manager::{KeySelector, Selection};

/// Flags selecting the part of the graph to work on
#[derive(Args, Debug, Default)]
pub struct SelectionArgs {
    /// Keep this node and everything it depends on
    #[arg(long, conflicts_with = "from_regex")]
    pub from: Option<String>,

    /// Keep the nodes matching this pattern and everything they depend on
    #[arg(long)]
    pub from_regex: Option<String>,

    /// Keep this node and everything that depends on it
    #[arg(long, conflicts_with = "to_regex")]
    pub to: Option<String>,

    /// Keep the nodes matching this pattern and everything that depends on them
    #[arg(long)]
    pub to_regex: Option<String>,

    /// Drop the nodes matching this pattern (their dependents will wait forever)
    #[arg(long)]
    pub exclude: Option<String>,
}

impl SelectionArgs {
    pub fn to_selection(&self) -> Selection {
        Selection {
            from: selector(&self.from, &self.from_regex),
            to: selector(&self.to, &self.to_regex),
            exclude: self.exclude.clone(),
        }
    }
}

fn selector(key: &Option<String>, pattern: &Option<String>) -> Option<KeySelector> {
    match (key, pattern) {
        (Some(key), _) => Some(KeySelector::Key(key.clone())),
        (None, Some(pattern)) => Some(KeySelector::Pattern(pattern.clone())),
        (None, None) => None,
    }
}
