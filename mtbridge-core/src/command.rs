//! Outbound command records.
//!
//! A command is a single line of text `<:{seq}|{name}|{content}:>` where
//! `content` is a comma-joined list of fields. Numbers are rendered with `.`
//! as decimal point and no grouping, whatever the host locale.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Sequence ids wrap at this value.
pub const SEQUENCE_MODULUS: u32 = 100_000;

const RECORD_START: &str = "<:";
const RECORD_END: &str = ":>";

/// Returns the sequence id following `seq`.
#[inline]
#[must_use]
pub const fn next_sequence(seq: u32) -> u32 {
    (seq + 1) % SEQUENCE_MODULUS
}

/// Command vocabulary understood by the terminal side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    /// Subscribe to ticks for a symbol list.
    SubscribeSymbols,
    /// Subscribe to bars for symbol/timeframe pairs.
    SubscribeSymbolsBarData,
    /// Request historic bars.
    GetHistoricData,
    /// Request historic trades.
    GetHistoricTrades,
    /// Open an order.
    OpenOrder,
    /// Modify an order.
    ModifyOrder,
    /// Close (part of) an order.
    CloseOrder,
    /// Close every order.
    CloseAllOrders,
    /// Close every order of a symbol.
    CloseOrdersBySymbol,
    /// Close every order with a magic number.
    CloseOrdersByMagic,
    /// Make the terminal forget previously seen sequence ids.
    ResetCommandIds,
}

impl CommandName {
    /// Every command name.
    pub const ALL: [Self; 11] = [
        Self::SubscribeSymbols,
        Self::SubscribeSymbolsBarData,
        Self::GetHistoricData,
        Self::GetHistoricTrades,
        Self::OpenOrder,
        Self::ModifyOrder,
        Self::CloseOrder,
        Self::CloseAllOrders,
        Self::CloseOrdersBySymbol,
        Self::CloseOrdersByMagic,
        Self::ResetCommandIds,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubscribeSymbols => "SUBSCRIBE_SYMBOLS",
            Self::SubscribeSymbolsBarData => "SUBSCRIBE_SYMBOLS_BAR_DATA",
            Self::GetHistoricData => "GET_HISTORIC_DATA",
            Self::GetHistoricTrades => "GET_HISTORIC_TRADES",
            Self::OpenOrder => "OPEN_ORDER",
            Self::ModifyOrder => "MODIFY_ORDER",
            Self::CloseOrder => "CLOSE_ORDER",
            Self::CloseAllOrders => "CLOSE_ALL_ORDERS",
            Self::CloseOrdersBySymbol => "CLOSE_ORDERS_BY_SYMBOL",
            Self::CloseOrdersByMagic => "CLOSE_ORDERS_BY_MAGIC",
            Self::ResetCommandIds => "RESET_COMMAND_IDS",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

/// A serialized-once outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    seq: u32,
    name: CommandName,
    content: String,
}

impl CommandRecord {
    /// Creates a command record.
    ///
    /// # Errors
    /// Returns error if `seq` is out of range or `content` contains record
    /// delimiters.
    pub fn new(seq: u32, name: CommandName, content: impl Into<String>) -> Result<Self> {
        if seq >= SEQUENCE_MODULUS {
            return Err(Error::invalid_field(
                "seq",
                format!("{seq} exceeds {}", SEQUENCE_MODULUS - 1),
            ));
        }

        let content = content.into();
        if content.contains('|') || content.contains(RECORD_START) || content.contains(RECORD_END)
        {
            return Err(Error::invalid_field(
                "content",
                "must not contain '|', '<:' or ':>'",
            ));
        }

        Ok(Self { seq, name, content })
    }

    /// Returns the sequence id.
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Returns the command name.
    #[must_use]
    pub fn name(&self) -> CommandName {
        self.name
    }

    /// Returns the comma-joined content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Encodes the record as written into a hand-off file.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{RECORD_START}{}|{}|{}{RECORD_END}",
            self.seq, self.name, self.content
        )
    }

    /// Decodes a record as found in a hand-off file.
    ///
    /// # Errors
    /// Returns error if the text is not a complete record.
    pub fn decode(text: &str) -> Result<Self> {
        let body = text
            .trim()
            .strip_prefix(RECORD_START)
            .and_then(|rest| rest.strip_suffix(RECORD_END))
            .ok_or_else(|| Error::invalid_record("missing record delimiters"))?;

        let mut parts = body.splitn(3, '|');
        let (Some(seq), Some(name), Some(content)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::invalid_record("expected seq|name|content"));
        };

        let seq = seq
            .parse::<u32>()
            .map_err(|e| Error::invalid_record(format!("bad sequence id {seq:?}: {e}")))?;

        Self::new(seq, name.parse()?, content)
    }
}

/// Formats a number for a command field.
///
/// # Errors
/// Returns error for NaN and infinities, which the terminal cannot parse.
pub fn format_number(field: &'static str, value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(Error::invalid_field(field, format!("{value} is not finite")));
    }
    // `-0` would otherwise be rendered with its sign.
    if value == 0.0 {
        return Ok("0".to_string());
    }
    Ok(value.to_string())
}

/// Checks a free-text command field.
///
/// # Errors
/// Returns error if the text contains the field separator or record delimiters.
pub fn check_text<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    if value.contains(',') || value.contains('|') || value.contains(RECORD_END) {
        return Err(Error::invalid_field(
            field,
            format!("{value:?} contains a reserved character"),
        ));
    }
    Ok(value)
}
