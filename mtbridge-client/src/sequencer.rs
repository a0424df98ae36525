//! Exactly-once, timestamp-ordered message delivery.

use mtbridge_core::{Message, MessageQueueSnapshot};

/// Orders timestamp-keyed messages and filters out everything at or below the
/// high-water mark.
///
/// Re-reading the same queue never yields a message twice, and a message that
/// arrives after a newer one has been delivered is dropped.
#[derive(Debug, Default)]
pub struct MessageSequencer {
    /// Highest timestamp delivered (or restored) so far.
    watermark: u64,
}

impl MessageSequencer {
    /// Creates a sequencer with a zero watermark.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sequencer resuming from a known watermark.
    #[must_use]
    pub fn with_watermark(watermark: u64) -> Self {
        Self { watermark }
    }

    /// Returns the current high-water mark in milliseconds.
    #[must_use]
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Selects the messages of `queue` that have not been delivered yet.
    ///
    /// # Returns
    /// `(timestamp, message)` pairs in increasing timestamp order. The
    /// watermark is advanced past every returned message.
    pub fn admit(&mut self, queue: &MessageQueueSnapshot) -> Vec<(u64, Message)> {
        let mut pending: Vec<(u64, &Message)> = queue
            .iter()
            .filter_map(|(key, message)| Some((parse_millis(key)?, message.as_ref()?)))
            .collect();

        // Keys are not guaranteed to share a width, so order numerically.
        pending.sort_by_key(|(millis, _)| *millis);

        let mut fresh = Vec::new();
        for (millis, message) in pending {
            if millis > self.watermark {
                self.watermark = millis;
                fresh.push((millis, message.clone()));
            }
        }
        fresh
    }

    /// Raises the watermark to the newest timestamp in `queue` without
    /// delivering anything.
    pub fn restore(&mut self, queue: &MessageQueueSnapshot) {
        if let Some(newest) = queue.keys().filter_map(|key| parse_millis(key)).max() {
            self.watermark = self.watermark.max(newest);
        }
    }
}

fn parse_millis(key: &str) -> Option<u64> {
    match key.trim().parse::<u64>() {
        Ok(millis) => Some(millis),
        Err(_) => {
            tracing::debug!(key, "ignoring message with non-numeric timestamp");
            None
        }
    }
}
