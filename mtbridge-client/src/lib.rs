//! # mtbridge Client
//!
//! Bridge engine for the file mailbox shared with a trading terminal.
//!
//! This crate provides:
//! - Command hand-off through a pool of mailbox files
//! - Five snapshot pollers turning file changes into events
//! - Exactly-once, timestamp-ordered message delivery
//! - Restart recovery of orders and messages
//! - Order-management command helpers

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod feeds;
pub mod handler;
pub mod orders;
pub mod poller;
pub mod restart;
pub mod sequencer;
pub mod state;

pub use bridge::{Bridge, BridgeBuilder};
pub use channel::CommandChannel;
pub use config::{BridgeConfig, CommandChannelConfig};
pub use error::BridgeError;
pub use feeds::{OrdersDiff, changed_keys, diff_orders};
pub use handler::{BridgeEvent, EventForwarder, EventHandler};
pub use orders::{OrderModification, OrderRequest, OrderType};
pub use poller::{Feed, WatchedFile};
pub use restart::{RestartStateStore, RestoredMessages, RestoredOrders};
pub use sequencer::MessageSequencer;
pub use state::BridgeState;
