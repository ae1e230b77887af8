//! Firebase status log writer
//!
//! Delivers parathread status messages to a Firebase realtime database over
//! its REST API. Each message overwrites the value stored at
//! `{endpoint}/{reference}/{key}`, so the database always shows the latest
//! status of every node of a run.
//!
//! ```rust,no_run
//! use parathread_core::{Graph, LogSink};
//! use parathread_firelog::FirebaseWriter;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let writer = FirebaseWriter::from_env("2024-01-01T00:00:00")?;
//! let mut graph = Graph::new();
//! graph.attach_logger(LogSink::spawn(writer));
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use parathread_core::{LogMessage, LogWriter, WriteFuture};
use tracing::trace;

/// Environment variable holding the database URL
pub const ENDPOINT_ENV: &str = "FIRELOG_ENDPOINT";
/// Environment variable holding the database secret or ID token
pub const AUTH_TOKEN_ENV: &str = "FIRELOG_AUTHTOKEN";

/// [`LogWriter`] storing each message under its node key in Firebase
#[derive(Debug, Clone)]
pub struct FirebaseWriter {
    client: reqwest::Client,
    endpoint: String,
    auth_token: String,
    reference: String,
}

impl FirebaseWriter {
    pub fn new(
        endpoint: impl Into<String>,
        auth_token: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            auth_token: auth_token.into(),
            reference: reference.into(),
        }
    }

    /// Build a writer from `FIRELOG_ENDPOINT` and `FIRELOG_AUTHTOKEN`
    pub fn from_env(reference: impl Into<String>) -> Result<Self> {
        let endpoint = std::env::var(ENDPOINT_ENV)
            .with_context(|| format!("{} is not set", ENDPOINT_ENV))?;
        let auth_token = std::env::var(AUTH_TOKEN_ENV)
            .with_context(|| format!("{} is not set", AUTH_TOKEN_ENV))?;
        Ok(Self::new(endpoint, auth_token, reference))
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// REST location of a node's status value
    pub fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}/{}.json",
            self.endpoint.trim_end_matches('/'),
            self.reference.trim_matches('/'),
            key
        )
    }

    async fn put(&self, message: &LogMessage) -> Result<()> {
        let url = self.url_for(&message.key);
        trace!(%url, "Writing status message");

        self.client
            .put(&url)
            .query(&[("auth", self.auth_token.as_str())])
            .json(&message.message)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("Firebase rejected write to {}", url))?;
        Ok(())
    }
}

impl LogWriter for FirebaseWriter {
    fn write<'a>(&'a self, message: &'a LogMessage) -> WriteFuture<'a> {
        Box::pin(self.put(message))
    }
}
