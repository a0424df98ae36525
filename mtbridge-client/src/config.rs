//! Bridge configuration.

use std::time::Duration;

/// Configuration for the bridge engine.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interval between two polls of an inbound file, also used between
    /// command delivery attempts.
    pub sleep_delay: Duration,
    /// How long a command may wait for a free hand-off file.
    pub max_retry_command: Duration,
    /// Restore orders from the stored snapshot and keep it up to date.
    pub load_orders_from_file: bool,
    /// Number of hand-off files in the command pool.
    pub command_files: usize,
    /// Delay between spawning the pollers and starting them when an event
    /// handler is installed.
    pub start_delay: Duration,
    /// Pause after `RESET_COMMAND_IDS` so the terminal reads it first.
    pub reset_pause: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sleep_delay: Duration::from_millis(5),
            max_retry_command: Duration::from_secs(10),
            load_orders_from_file: true,
            command_files: 20,
            start_delay: Duration::from_secs(1),
            reset_pause: Duration::from_millis(500),
        }
    }
}

/// Settings the command channel needs out of [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct CommandChannelConfig {
    /// Number of hand-off files.
    pub pool_size: usize,
    /// Sleep between two scans of a saturated pool.
    pub retry_interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
    /// Pause after a sequence reset.
    pub reset_pause: Duration,
}

impl From<&BridgeConfig> for CommandChannelConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            pool_size: config.command_files,
            retry_interval: config.sleep_delay,
            timeout: config.max_retry_command,
            reset_pause: config.reset_pause,
        }
    }
}

impl Default for CommandChannelConfig {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.sleep_delay, Duration::from_millis(5));
        assert_eq!(config.max_retry_command, Duration::from_secs(10));
        assert!(config.load_orders_from_file);
        assert_eq!(config.command_files, 20);
    }

    #[test]
    fn test_command_channel_config_from_bridge_config() {
        let bridge = BridgeConfig {
            command_files: 3,
            max_retry_command: Duration::from_millis(250),
            ..Default::default()
        };
        let config = CommandChannelConfig::from(&bridge);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.retry_interval, bridge.sleep_delay);
    }
}
