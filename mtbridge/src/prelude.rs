//! Prelude module for convenient imports.
//!
//! ```ignore
//! use mtbridge::prelude::*;
//! ```

// Core types
pub use mtbridge_core::error::{Error as CoreError, Result as CoreResult};
pub use mtbridge_core::{
    AccountInfo, Bar, Candle, CandleSeries, CommandName, MailboxLayout, Message, Order, Quote,
};

// Bridge types
pub use mtbridge_client::{
    Bridge, BridgeBuilder, BridgeConfig, BridgeError, BridgeEvent, EventForwarder, EventHandler,
    OrderModification, OrderRequest, OrderType,
};
