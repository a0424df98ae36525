//! Restart recovery for the orders and messages snapshots.
//!
//! The pollers copy each processed orders and messages file into a stored
//! file. On the next start the stored orders become the initial "last seen"
//! state and the stored messages provide the initial high-water mark, so a
//! restart neither floods "new order" events nor replays old messages.

use crate::sequencer::MessageSequencer;
use mtbridge_core::{
    FileStore, MailboxFile, MailboxLayout, OrdersFile, Result, parse_message_queue, parse_record,
};
use std::path::PathBuf;

/// Orders restored from the stored snapshot.
#[derive(Debug, Clone)]
pub struct RestoredOrders {
    /// Raw stored text.
    pub text: String,
    /// Parsed snapshot.
    pub file: OrdersFile,
}

/// Message state restored from the stored snapshot.
#[derive(Debug, Clone)]
pub struct RestoredMessages {
    /// Raw stored text.
    pub text: String,
    /// Newest timestamp found in the stored queue.
    pub watermark: u64,
}

/// Reads and writes the stored snapshots.
#[derive(Debug, Clone)]
pub struct RestartStateStore {
    store: FileStore,
    orders_path: PathBuf,
    messages_path: PathBuf,
}

impl RestartStateStore {
    /// Creates a restart store for the given mailbox.
    #[must_use]
    pub fn new(layout: &MailboxLayout, store: FileStore) -> Self {
        Self {
            store,
            orders_path: layout.path(MailboxFile::OrdersStored),
            messages_path: layout.path(MailboxFile::MessagesStored),
        }
    }

    /// Loads the stored orders snapshot.
    ///
    /// # Returns
    /// `None` if nothing usable is stored.
    pub async fn load_orders(&self) -> Option<RestoredOrders> {
        let text = self.store.read(&self.orders_path).await;
        if text.trim().is_empty() {
            return None;
        }

        match parse_record::<OrdersFile>(&text) {
            Ok(file) => {
                tracing::info!(orders = file.orders.len(), "restored stored orders");
                Some(RestoredOrders { text, file })
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable stored orders");
                None
            }
        }
    }

    /// Loads the stored message queue and derives its high-water mark.
    ///
    /// # Returns
    /// `None` if nothing usable is stored.
    pub async fn load_messages(&self) -> Option<RestoredMessages> {
        let text = self.store.read(&self.messages_path).await;
        if text.trim().is_empty() {
            return None;
        }

        match parse_message_queue(&text) {
            Ok(queue) => {
                let mut sequencer = MessageSequencer::new();
                sequencer.restore(&queue);
                tracing::info!(watermark = sequencer.watermark(), "restored message watermark");
                Some(RestoredMessages {
                    text,
                    watermark: sequencer.watermark(),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable stored messages");
                None
            }
        }
    }

    /// Stores the raw text of a processed orders file.
    ///
    /// # Errors
    /// Returns IO error if the write fails.
    pub async fn save_orders(&self, text: &str) -> Result<()> {
        self.store.write(&self.orders_path, text).await
    }

    /// Stores the raw text of a processed messages file.
    ///
    /// # Errors
    /// Returns IO error if the write fails.
    pub async fn save_messages(&self, text: &str) -> Result<()> {
        self.store.write(&self.messages_path, text).await
    }
}
