//! Asynchronous node status sink
//!
//! The executor reports every node transition as a `(key, message)` pair.
//! [`LogSink::push`] never blocks the node that issued it: messages go
//! through an unbounded channel to a single background worker that hands them
//! to a [`LogWriter`] one at a time. [`LogSink::drain`] waits until every
//! pushed message has been written (or its write failed), which is how a run
//! guarantees its status lines are delivered before it returns.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};

/// A single status line for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub key: String,
    pub message: String,
}

impl LogMessage {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Future returned by [`LogWriter::write`]
pub type WriteFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Delivery backend for a [`LogSink`]
pub trait LogWriter: Send + Sync + 'static {
    /// Deliver one message. Errors and panics are logged by the sink worker
    /// and the message is counted as delivered.
    fn write<'a>(&'a self, message: &'a LogMessage) -> WriteFuture<'a>;
}

impl<W: LogWriter + ?Sized> LogWriter for Arc<W> {
    fn write<'a>(&'a self, message: &'a LogMessage) -> WriteFuture<'a> {
        (**self).write(message)
    }
}

#[derive(Debug, Default)]
struct PendingCounter {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingCounter {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// Fire-and-forget status sink backed by a background worker
#[derive(Debug)]
pub struct LogSink {
    sender: mpsc::UnboundedSender<LogMessage>,
    pending: Arc<PendingCounter>,
}

impl LogSink {
    /// Start the background worker on the current tokio runtime.
    ///
    /// The worker stops once the sink is dropped and the channel is empty.
    pub fn spawn<W: LogWriter>(writer: W) -> Arc<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<LogMessage>();
        let pending = Arc::new(PendingCounter::default());

        let writer = Arc::new(writer);
        let worker_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let key = message.key.clone();
                let writer = Arc::clone(&writer);
                // A panicking writer loses this message, not the worker
                let delivery = tokio::spawn(async move { writer.write(&message).await });
                match delivery.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(key = %key, "Failed to deliver status message: {:#}", e)
                    }
                    Err(e) => error!(key = %key, "Status writer panicked: {}", e),
                }
                worker_pending.done();
            }
        });

        Arc::new(Self { sender, pending })
    }

    /// Queue a message for delivery without waiting for it
    pub fn push(&self, key: impl Into<String>, message: impl Into<String>) {
        self.pending.add();
        if let Err(e) = self.sender.send(LogMessage::new(key, message)) {
            warn!(key = %e.0.key, "Log sink worker is gone, dropping message");
            self.pending.done();
        }
    }

    /// Number of pushed messages not yet written
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Wait until every pushed message has been handled by the writer
    pub async fn drain(&self) {
        loop {
            let idle = self.pending.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.pending.get() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Writer forwarding every message to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWriter;

impl LogWriter for TracingWriter {
    fn write<'a>(&'a self, message: &'a LogMessage) -> WriteFuture<'a> {
        Box::pin(async move {
            info!(target: "parathread::status", key = %message.key, "{}", message.message);
            Ok(())
        })
    }
}

/// Writer keeping every message in memory, optionally slowed down by a fixed
/// delay per message
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryWriter {
    messages: std::sync::Mutex<Vec<LogMessage>>,
    delay: Option<std::time::Duration>,
}

#[cfg(test)]
impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            messages: std::sync::Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    /// Snapshot of the messages written so far, in delivery order
    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Messages written for one key, in delivery order
    pub fn messages_for(&self, key: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.key == key)
            .map(|m| m.message)
            .collect()
    }
}

#[cfg(test)]
impl LogWriter for MemoryWriter {
    fn write<'a>(&'a self, message: &'a LogMessage) -> WriteFuture<'a> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.messages
                .lock()
                .map_err(|_| anyhow::anyhow!("message buffer poisoned"))?
                .push(message.clone());
            Ok(())
        })
    }
}
