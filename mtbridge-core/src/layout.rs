//! Mailbox directory layout shared with the terminal side.

use std::path::{Path, PathBuf};

/// Name of the mailbox directory inside the terminal's files directory.
pub const MAILBOX_DIR: &str = "DWX";

/// Files the bridge reads from or persists into the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxFile {
    /// Open orders and account info, written by the terminal.
    Orders,
    /// Timestamp-keyed message queue, written by the terminal.
    Messages,
    /// Per-symbol quotes, written by the terminal.
    MarketData,
    /// Latest bar per `symbol_timeframe`, written by the terminal.
    BarData,
    /// One-shot historic bars response.
    HistoricData,
    /// One-shot historic trades response.
    HistoricTrades,
    /// Last processed orders file, kept for restarts.
    OrdersStored,
    /// Last processed messages file, kept for restarts.
    MessagesStored,
}

impl MailboxFile {
    /// Returns the on-disk file name.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Orders => "DWX_Orders.txt",
            Self::Messages => "DWX_Messages.txt",
            Self::MarketData => "DWX_Market_Data.txt",
            Self::BarData => "DWX_Bar_Data.txt",
            Self::HistoricData => "DWX_Historic_Data.txt",
            Self::HistoricTrades => "DWX_Historic_Trades.txt",
            Self::OrdersStored => "DWX_Orders_Stored.txt",
            Self::MessagesStored => "DWX_Messages_Stored.txt",
        }
    }
}

/// Resolves mailbox file paths below a terminal files directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxLayout {
    dir: PathBuf,
}

impl MailboxLayout {
    /// Creates the layout for a terminal files directory (the parent of `DWX`).
    #[must_use]
    pub fn new(metatrader_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: metatrader_dir.as_ref().join(MAILBOX_DIR),
        }
    }

    /// Creates the layout for an explicit mailbox directory.
    #[must_use]
    pub fn from_mailbox_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the mailbox directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of a mailbox file.
    #[must_use]
    pub fn path(&self, file: MailboxFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    /// Returns the path of hand-off file `index` of the command pool.
    #[must_use]
    pub fn command_file(&self, index: usize) -> PathBuf {
        self.dir.join(format!("DWX_Commands_{index}.txt"))
    }
}
