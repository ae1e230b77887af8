//! Command-backed work
//!
//! Turns a node configuration (shell command, executable with arguments, or
//! script file) into a [`Work`] that runs the process with `tokio::process`
//! and fails when it cannot be spawned or exits unsuccessfully.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tokio::process::Command;
use tracing::debug;

use crate::configs::thread::{Command as NodeCommand, NodeConfig};
use crate::node::{work_fn, Work};
use crate::types::{ParathreadError, ParathreadResult};

/// Environment variable holding the key of the node being executed
pub const NODE_KEY_ENV: &str = "PARATHREAD_NODE";

/// What a node runs
#[derive(Debug, Clone)]
enum Invocation {
    Shell(String),
    Program { program: String, args: Vec<String> },
    Script(PathBuf),
}

/// Builds command-backed work for nodes of a thread file
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    working_dir: PathBuf,
}

impl CommandExecutor {
    /// Commands run in `working_dir`; relative script paths resolve against it
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Work running the node's script or command
    pub fn work_for(&self, node: &NodeConfig) -> ParathreadResult<Work> {
        let invocation = self.invocation_for(node)?;
        let working_dir = Arc::new(self.working_dir.clone());
        let key = Arc::new(node.key.clone());

        Ok(work_fn(move || {
            let invocation = invocation.clone();
            let working_dir = Arc::clone(&working_dir);
            let key = Arc::clone(&key);
            async move { run_invocation(&invocation, &working_dir, &key).await }
        }))
    }

    fn invocation_for(&self, node: &NodeConfig) -> ParathreadResult<Invocation> {
        if let Some(script) = &node.script {
            let script_path = PathBuf::from(script);
            let full_path = if script_path.is_relative() {
                self.working_dir.join(script_path)
            } else {
                script_path
            };
            return Ok(Invocation::Script(full_path));
        }

        match &node.command {
            Some(NodeCommand::Single(cmd)) => Ok(Invocation::Shell(cmd.clone())),
            Some(NodeCommand::Multiple(cmds)) => match cmds.split_first() {
                Some((program, args)) => Ok(Invocation::Program {
                    program: program.clone(),
                    args: args.to_vec(),
                }),
                None => Err(ParathreadError::Config(format!(
                    "Node '{}' has an empty command",
                    node.key
                ))),
            },
            None => Err(ParathreadError::Config(format!(
                "Node '{}' has no script or command to execute",
                node.key
            ))),
        }
    }
}

async fn run_invocation(invocation: &Invocation, working_dir: &Path, key: &str) -> anyhow::Result<()> {
    let (mut command, description) = match invocation {
        Invocation::Shell(cmd) => {
            let mut command = Command::new("sh");
            command.arg("-c").arg(cmd);
            (command, format!("command '{}'", cmd))
        }
        Invocation::Program { program, args } => {
            let mut command = Command::new(program);
            command.args(args);
            (command, format!("command '{}'", program))
        }
        Invocation::Script(path) => {
            if !path.exists() {
                bail!("Script file '{}' not found", path.display());
            }
            (Command::new(path), format!("script '{}'", path.display()))
        }
    };

    command.current_dir(working_dir).env(NODE_KEY_ENV, key);
    debug!(key, "Spawning {}", description);

    let status = command
        .status()
        .await
        .with_context(|| format!("Failed to execute {}", description))?;

    if !status.success() {
        return Err(anyhow!(
            "{} failed with exit code {}",
            description,
            status.code().unwrap_or(-1)
        ));
    }
    Ok(())
}
