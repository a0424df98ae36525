//! # mtbridge
//!
//! Bridge between Rust applications and a MetaTrader terminal that talks
//! through a directory of text files.
//!
//! The terminal side writes orders, messages, quotes, bars and historic data
//! into JSON files and reads commands from a pool of hand-off files. This
//! crate polls the inbound files, turns changes into [`EventHandler`]
//! callbacks and writes commands without ever overwriting one the terminal
//! has not consumed yet.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mtbridge::prelude::*;
//!
//! let (forwarder, mut events) = EventForwarder::channel();
//! let bridge = BridgeBuilder::new("/path/to/MQL4/Files")
//!     .handler(forwarder)
//!     .start()
//!     .await?;
//!
//! bridge.subscribe_symbols(&["EURUSD"]).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Mailbox layout, file store, typed records, command encoding
//! - [`client`] - Command channel, pollers, sequencing, restart recovery
//!
//! [`EventHandler`]: mtbridge_client::EventHandler

pub mod prelude;

/// Mailbox layout, file access, records and command encoding.
pub mod core {
    pub use mtbridge_core::*;
}

/// The bridge engine.
pub mod client {
    pub use mtbridge_client::*;
}

pub use mtbridge_client::{Bridge, BridgeBuilder, BridgeConfig, BridgeError, EventHandler};
pub use mtbridge_core::{CommandName, MailboxLayout};
