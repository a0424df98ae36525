//! Command hand-off through a pool of mailbox files.
//!
//! A hand-off file that exists holds a command the terminal has not consumed
//! yet. Commands are therefore only ever written to absent files, scanning the
//! pool in index order so the terminal can execute them in submission order.

use crate::config::CommandChannelConfig;
use crate::error::BridgeError;
use mtbridge_core::{CommandName, CommandRecord, FileStore, MailboxLayout, next_sequence};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Outbound command channel.
pub struct CommandChannel {
    layout: MailboxLayout,
    store: FileStore,
    config: CommandChannelConfig,
    /// Last assigned sequence id. Held across the first delivery attempt so
    /// ids and pool slots are handed out in the same order.
    seq: Mutex<u32>,
}

impl CommandChannel {
    /// Creates a command channel writing into the given mailbox.
    #[must_use]
    pub fn new(layout: MailboxLayout, store: FileStore, config: CommandChannelConfig) -> Self {
        Self {
            layout,
            store,
            config,
            seq: Mutex::new(0),
        }
    }

    /// Submits a command.
    ///
    /// # Returns
    /// The sequence id the command was written with.
    ///
    /// # Errors
    /// Returns [`BridgeError::CommandTimeout`] if no hand-off file became free
    /// within the configured timeout, or a core error if `content` cannot be
    /// encoded.
    pub async fn submit(&self, name: CommandName, content: &str) -> Result<u32, BridgeError> {
        self.submit_inner(name, content, false).await
    }

    /// Restarts the sequence at zero and submits `RESET_COMMAND_IDS`, then
    /// pauses so the terminal picks it up ahead of later commands.
    ///
    /// # Errors
    /// Returns [`BridgeError::CommandTimeout`] if the reset could not be
    /// delivered.
    pub async fn reset(&self) -> Result<u32, BridgeError> {
        let seq = self
            .submit_inner(CommandName::ResetCommandIds, "", true)
            .await?;
        tokio::time::sleep(self.config.reset_pause).await;
        Ok(seq)
    }

    /// Returns the last assigned sequence id.
    pub async fn last_sequence(&self) -> u32 {
        *self.seq.lock().await
    }

    async fn submit_inner(
        &self,
        name: CommandName,
        content: &str,
        restart_sequence: bool,
    ) -> Result<u32, BridgeError> {
        let deadline = Instant::now() + self.config.timeout;

        let (seq, text) = {
            let mut last = self.seq.lock().await;
            let current = if restart_sequence { 0 } else { *last };
            let record = CommandRecord::new(next_sequence(current), name, content)?;
            *last = record.seq();

            let text = record.encode();
            if self.try_deliver(&text).await {
                tracing::trace!(seq = record.seq(), command = %name, "command delivered");
                return Ok(record.seq());
            }
            (record.seq(), text)
        };

        loop {
            if Instant::now() >= deadline {
                tracing::warn!(seq, command = %name, "no free command file, giving up");
                return Err(BridgeError::CommandTimeout {
                    command: name,
                    seq,
                    timeout: self.config.timeout,
                });
            }

            tokio::time::sleep(self.config.retry_interval).await;

            let _guard = self.seq.lock().await;
            if self.try_deliver(&text).await {
                tracing::trace!(seq, command = %name, "command delivered after retry");
                return Ok(seq);
            }
        }
    }

    /// Writes `text` into the first absent hand-off file.
    async fn try_deliver(&self, text: &str) -> bool {
        for index in 0..self.config.pool_size {
            let path = self.layout.command_file(index);
            match self.store.write_new(&path, text).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "command file not writable");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn channel(dir: &std::path::Path, pool_size: usize, timeout: Duration) -> CommandChannel {
        CommandChannel::new(
            MailboxLayout::from_mailbox_dir(dir),
            FileStore::default(),
            CommandChannelConfig {
                pool_size,
                retry_interval: Duration::from_millis(5),
                timeout,
                reset_pause: Duration::from_millis(1),
            },
        )
    }

    fn read_record(dir: &std::path::Path, index: usize) -> CommandRecord {
        let text = fs::read_to_string(dir.join(format!("DWX_Commands_{index}.txt"))).unwrap();
        CommandRecord::decode(&text).unwrap()
    }

    #[tokio::test]
    async fn test_submit_writes_first_free_file() {
        let dir = tempdir().unwrap();
        let channel = channel(dir.path(), 3, Duration::from_secs(1));

        fs::write(dir.path().join("DWX_Commands_0.txt"), "<:9|CLOSE_ALL_ORDERS|:>").unwrap();

        let seq = channel
            .submit(CommandName::CloseOrdersBySymbol, "EURUSD")
            .await
            .unwrap();
        assert_eq!(seq, 1);

        // The pending command is left alone.
        assert_eq!(read_record(dir.path(), 0).seq(), 9);

        let record = read_record(dir.path(), 1);
        assert_eq!(record.seq(), 1);
        assert_eq!(record.name(), CommandName::CloseOrdersBySymbol);
        assert_eq!(record.content(), "EURUSD");
        assert!(!dir.path().join("DWX_Commands_2.txt").exists());
    }

    #[tokio::test]
    async fn test_sequence_increments_per_submission() {
        let dir = tempdir().unwrap();
        let channel = channel(dir.path(), 5, Duration::from_secs(1));

        for expected in 1..=3 {
            let seq = channel.submit(CommandName::CloseAllOrders, "").await.unwrap();
            assert_eq!(seq, expected);
        }
        assert_eq!(channel.last_sequence().await, 3);
    }

    #[tokio::test]
    async fn test_saturated_pool_times_out() {
        let dir = tempdir().unwrap();
        let timeout = Duration::from_millis(100);
        let channel = channel(dir.path(), 2, timeout);

        fs::write(dir.path().join("DWX_Commands_0.txt"), "pending").unwrap();
        fs::write(dir.path().join("DWX_Commands_1.txt"), "pending").unwrap();

        let started = std::time::Instant::now();
        let result = channel.submit(CommandName::CloseAllOrders, "").await;
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(BridgeError::CommandTimeout { seq: 1, .. })
        ));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500));

        // The abandoned id is not reused.
        fs::remove_file(dir.path().join("DWX_Commands_0.txt")).unwrap();
        let seq = channel.submit(CommandName::CloseAllOrders, "").await.unwrap();
        assert_eq!(seq, 2);
    }

    #[tokio::test]
    async fn test_retry_succeeds_once_file_is_consumed() {
        let dir = tempdir().unwrap();
        let channel = channel(dir.path(), 1, Duration::from_secs(2));
        let occupied = dir.path().join("DWX_Commands_0.txt");
        fs::write(&occupied, "pending").unwrap();

        let consumer = tokio::spawn({
            let occupied = occupied.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                fs::remove_file(occupied).unwrap();
            }
        });

        let seq = channel
            .submit(CommandName::GetHistoricTrades, "30")
            .await
            .unwrap();
        consumer.await.unwrap();

        assert_eq!(seq, 1);
        assert_eq!(read_record(dir.path(), 0).content(), "30");
    }

    #[tokio::test]
    async fn test_invalid_content_does_not_consume_sequence() {
        let dir = tempdir().unwrap();
        let channel = channel(dir.path(), 2, Duration::from_secs(1));

        let result = channel.submit(CommandName::CloseOrdersBySymbol, "a|b").await;
        assert!(matches!(result, Err(BridgeError::Core(_))));
        assert_eq!(channel.last_sequence().await, 0);
        assert!(!dir.path().join("DWX_Commands_0.txt").exists());
    }

    #[tokio::test]
    async fn test_reset_restarts_sequence() {
        let dir = tempdir().unwrap();
        let channel = channel(dir.path(), 5, Duration::from_secs(1));

        channel.submit(CommandName::CloseAllOrders, "").await.unwrap();
        channel.submit(CommandName::CloseAllOrders, "").await.unwrap();

        let seq = channel.reset().await.unwrap();
        assert_eq!(seq, 1);
        assert_eq!(read_record(dir.path(), 2).name(), CommandName::ResetCommandIds);

        let seq = channel.submit(CommandName::CloseAllOrders, "").await.unwrap();
        assert_eq!(seq, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submitters_get_unique_sequences() {
        let dir = tempdir().unwrap();
        let channel = Arc::new(channel(dir.path(), 64, Duration::from_secs(5)));

        let mut tasks = Vec::new();
        for task in 0..8 {
            let channel = Arc::clone(&channel);
            tasks.push(tokio::spawn(async move {
                let mut seqs = Vec::new();
                for i in 0..5 {
                    let content = format!("T{task}C{i}");
                    seqs.push(
                        channel
                            .submit(CommandName::CloseOrdersBySymbol, &content)
                            .await
                            .unwrap(),
                    );
                }
                seqs
            }));
        }

        let mut all = Vec::new();
        for task in tasks {
            let seqs = task.await.unwrap();
            // Each submitter observes strictly increasing ids.
            assert!(seqs.windows(2).all(|w| w[0] < w[1]));
            all.extend(seqs);
        }

        let unique: HashSet<u32> = all.iter().copied().collect();
        assert_eq!(unique.len(), 40);
        assert_eq!(unique, (1..=40).collect::<HashSet<u32>>());

        // Pool slots were filled in acquisition order.
        for index in 0..40 {
            assert_eq!(read_record(dir.path(), index).seq(), index as u32 + 1);
        }
    }
}
