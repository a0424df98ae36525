//! # mtbridge Core
//!
//! Core types for the file-mailbox bridge to a trading terminal.
//!
//! This crate provides:
//! - Mailbox file layout shared with the terminal side
//! - Best-effort file store tolerant of concurrent terminal access
//! - Typed records for every inbound file
//! - Command record encoding and locale-independent number formatting
//! - Error types for mailbox operations

pub mod command;
pub mod error;
pub mod layout;
pub mod records;
pub mod store;

pub use command::{
    CommandName, CommandRecord, SEQUENCE_MODULUS, check_text, format_number, next_sequence,
};
pub use error::{Error, Result};
pub use layout::{MailboxFile, MailboxLayout};
pub use records::{
    AccountInfo, Bar, BarDataSnapshot, Candle, CandleSeries, HistoricDataSnapshot,
    HistoricTrades, MarketDataSnapshot, Message, MessageQueueSnapshot, Order, OrderSnapshot,
    OrdersFile, Quote, parse_message_queue, parse_record, split_symbol_timeframe,
};
pub use store::{FileStore, FileStoreConfig};
