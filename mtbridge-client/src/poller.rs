//! Generic snapshot poller.
//!
//! A poller waits for the start gate, then repeatedly ticks its [`Feed`] and
//! sleeps. Shutdown is cooperative: the token is checked at the top of every
//! iteration and raced against every sleep, but a tick in progress always
//! runs to completion.

use crate::bridge::Bridge;
use async_trait::async_trait;
use mtbridge_core::FileStore;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// One inbound mailbox file together with the last text that was accepted
/// from it.
#[derive(Debug)]
pub struct WatchedFile {
    path: PathBuf,
    last_text: String,
}

impl WatchedFile {
    /// Creates a watcher that has not accepted anything yet.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_text: String::new(),
        }
    }

    /// Creates a watcher that treats `text` as already processed.
    #[must_use]
    pub fn with_last_text(path: PathBuf, text: String) -> Self {
        Self {
            path,
            last_text: text,
        }
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads the file and returns its text if it is non-empty and differs
    /// from the last accepted text.
    pub async fn read_changed(&self, store: &FileStore) -> Option<String> {
        let text = store.read(&self.path).await;
        if text.trim().is_empty() || text == self.last_text {
            return None;
        }
        Some(text)
    }

    /// Records `text` as processed. Call only after it parsed.
    pub fn accept(&mut self, text: String) {
        self.last_text = text;
    }

    /// Forgets the accepted text, so identical content counts as new again.
    pub fn clear(&mut self) {
        self.last_text.clear();
    }
}

/// The per-file part of a poller: read, parse, diff, publish, notify.
#[async_trait]
pub trait Feed: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs one poll cycle.
    async fn tick(&mut self, bridge: &Bridge);
}

/// Control signals shared by all pollers of a bridge.
#[derive(Clone)]
pub(crate) struct PollerControl {
    pub(crate) started: watch::Receiver<bool>,
    pub(crate) cancel: CancellationToken,
    pub(crate) interval: Duration,
}

/// Drives a feed until the bridge shuts down.
pub(crate) async fn run_poller(mut feed: Box<dyn Feed>, bridge: Bridge, control: PollerControl) {
    let PollerControl {
        mut started,
        cancel,
        interval,
    } = control;

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::debug!(feed = feed.name(), "poller cancelled before start");
            return;
        }
        opened = async { started.wait_for(|started| *started).await.is_ok() } => {
            if !opened {
                tracing::debug!(feed = feed.name(), "start gate dropped");
                return;
            }
        }
    }

    tracing::debug!(feed = feed.name(), "poller running");

    while !cancel.is_cancelled() {
        feed.tick(&bridge).await;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!(feed = feed.name(), "poller stopped");
}
