//! Command helpers for subscriptions, history requests and order management.
//!
//! Each helper formats its comma-joined content and hands it to
//! [`Bridge::submit`]. Results arrive later through the pollers.

use crate::bridge::Bridge;
use crate::error::BridgeError;
use chrono::{DateTime, Utc};
use mtbridge_core::{CommandName, check_text, format_number};
use std::fmt;

/// Order type understood by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    /// Market buy.
    Buy,
    /// Market sell.
    Sell,
    /// Pending buy below the market.
    BuyLimit,
    /// Pending sell above the market.
    SellLimit,
    /// Pending buy above the market.
    BuyStop,
    /// Pending sell below the market.
    SellStop,
}

impl OrderType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::BuyLimit => "buylimit",
            Self::SellLimit => "selllimit",
            Self::BuyStop => "buystop",
            Self::SellStop => "sellstop",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn expiration_secs(expiration: Option<DateTime<Utc>>) -> i64 {
    expiration.map_or(0, |at| at.timestamp())
}

/// Parameters of an `OPEN_ORDER` command.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    symbol: String,
    order_type: OrderType,
    lots: f64,
    price: f64,
    stop_loss: f64,
    take_profit: f64,
    magic: i64,
    comment: String,
    expiration: Option<DateTime<Utc>>,
}

impl OrderRequest {
    /// Creates a request for 0.01 lots at market with no SL, TP or
    /// expiration.
    #[must_use]
    pub fn new(symbol: impl Into<String>, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.into(),
            order_type,
            lots: 0.01,
            price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            magic: 0,
            comment: String::new(),
            expiration: None,
        }
    }

    /// Sets the volume in lots.
    #[must_use]
    pub fn lots(mut self, lots: f64) -> Self {
        self.lots = lots;
        self
    }

    /// Sets the price of a pending order.
    #[must_use]
    pub fn price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Sets the stop loss as an absolute price.
    #[must_use]
    pub fn stop_loss(mut self, price: f64) -> Self {
        self.stop_loss = price;
        self
    }

    /// Sets the take profit as an absolute price.
    #[must_use]
    pub fn take_profit(mut self, price: f64) -> Self {
        self.take_profit = price;
        self
    }

    /// Sets the magic number.
    #[must_use]
    pub fn magic(mut self, magic: i64) -> Self {
        self.magic = magic;
        self
    }

    /// Sets the order comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the expiration of a pending order.
    #[must_use]
    pub fn expiration(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Some(at);
        self
    }

    /// Formats the command content.
    ///
    /// # Errors
    /// Returns error for non-finite numbers or text containing separators.
    pub fn to_content(&self) -> mtbridge_core::Result<String> {
        Ok([
            check_text("symbol", &self.symbol)?.to_string(),
            self.order_type.to_string(),
            format_number("lots", self.lots)?,
            format_number("price", self.price)?,
            format_number("stop_loss", self.stop_loss)?,
            format_number("take_profit", self.take_profit)?,
            self.magic.to_string(),
            check_text("comment", &self.comment)?.to_string(),
            expiration_secs(self.expiration).to_string(),
        ]
        .join(","))
    }
}

/// Parameters of a `MODIFY_ORDER` command.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderModification {
    ticket: u64,
    lots: f64,
    price: f64,
    stop_loss: f64,
    take_profit: f64,
    expiration: Option<DateTime<Utc>>,
}

impl OrderModification {
    /// Creates a modification with 0.01 lots and zero price, SL and TP.
    #[must_use]
    pub fn new(ticket: u64) -> Self {
        Self {
            ticket,
            lots: 0.01,
            price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            expiration: None,
        }
    }

    /// Sets the volume in lots.
    #[must_use]
    pub fn lots(mut self, lots: f64) -> Self {
        self.lots = lots;
        self
    }

    /// Sets the price; only pending orders accept a non-zero price.
    #[must_use]
    pub fn price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Sets the new stop loss.
    #[must_use]
    pub fn stop_loss(mut self, price: f64) -> Self {
        self.stop_loss = price;
        self
    }

    /// Sets the new take profit.
    #[must_use]
    pub fn take_profit(mut self, price: f64) -> Self {
        self.take_profit = price;
        self
    }

    /// Sets the new expiration.
    #[must_use]
    pub fn expiration(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Some(at);
        self
    }

    /// Formats the command content.
    ///
    /// # Errors
    /// Returns error for non-finite numbers.
    pub fn to_content(&self) -> mtbridge_core::Result<String> {
        Ok([
            self.ticket.to_string(),
            format_number("lots", self.lots)?,
            format_number("price", self.price)?,
            format_number("stop_loss", self.stop_loss)?,
            format_number("take_profit", self.take_profit)?,
            expiration_secs(self.expiration).to_string(),
        ]
        .join(","))
    }
}

fn symbol_list(symbols: &[&str]) -> mtbridge_core::Result<String> {
    let checked = symbols
        .iter()
        .map(|symbol| check_text("symbol", symbol))
        .collect::<mtbridge_core::Result<Vec<_>>>()?;
    Ok(checked.join(","))
}

impl Bridge {
    /// Subscribes to tick data. Replaces any previous tick subscription.
    ///
    /// # Errors
    /// Returns error if a symbol is invalid or the command is not delivered.
    pub async fn subscribe_symbols(&self, symbols: &[&str]) -> Result<u32, BridgeError> {
        let content = symbol_list(symbols)?;
        self.submit(CommandName::SubscribeSymbols, &content).await
    }

    /// Subscribes to bar data for `(symbol, timeframe)` pairs.
    ///
    /// # Errors
    /// Returns error if a field is invalid or the command is not delivered.
    pub async fn subscribe_symbols_bar_data(
        &self,
        pairs: &[(&str, &str)],
    ) -> Result<u32, BridgeError> {
        let mut fields = Vec::with_capacity(pairs.len() * 2);
        for (symbol, timeframe) in pairs {
            fields.push(check_text("symbol", symbol)?);
            fields.push(check_text("timeframe", timeframe)?);
        }
        self.submit(CommandName::SubscribeSymbolsBarData, &fields.join(","))
            .await
    }

    /// Requests historic bars between `start` and `end`.
    ///
    /// # Errors
    /// Returns error if a field is invalid or the command is not delivered.
    pub async fn get_historic_data(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u32, BridgeError> {
        let content = format!(
            "{},{},{},{}",
            check_text("symbol", symbol)?,
            check_text("timeframe", timeframe)?,
            start.timestamp(),
            end.timestamp()
        );
        self.submit(CommandName::GetHistoricData, &content).await
    }

    /// Requests the trade history of the last `lookback_days` days.
    ///
    /// # Errors
    /// Returns error if the command is not delivered.
    pub async fn get_historic_trades(&self, lookback_days: u32) -> Result<u32, BridgeError> {
        self.submit(CommandName::GetHistoricTrades, &lookback_days.to_string())
            .await
    }

    /// Opens a market or pending order.
    ///
    /// # Errors
    /// Returns error if the request is invalid or the command is not delivered.
    pub async fn open_order(&self, request: &OrderRequest) -> Result<u32, BridgeError> {
        let content = request.to_content()?;
        self.submit(CommandName::OpenOrder, &content).await
    }

    /// Modifies an open or pending order.
    ///
    /// # Errors
    /// Returns error if the request is invalid or the command is not delivered.
    pub async fn modify_order(&self, modification: &OrderModification) -> Result<u32, BridgeError> {
        let content = modification.to_content()?;
        self.submit(CommandName::ModifyOrder, &content).await
    }

    /// Closes an order; `lots` of zero closes it completely.
    ///
    /// # Errors
    /// Returns error if `lots` is not finite or the command is not delivered.
    pub async fn close_order(&self, ticket: u64, lots: f64) -> Result<u32, BridgeError> {
        let content = format!("{ticket},{}", format_number("lots", lots)?);
        self.submit(CommandName::CloseOrder, &content).await
    }

    /// Closes every order.
    ///
    /// # Errors
    /// Returns error if the command is not delivered.
    pub async fn close_all_orders(&self) -> Result<u32, BridgeError> {
        self.submit(CommandName::CloseAllOrders, "").await
    }

    /// Closes every order of a symbol.
    ///
    /// # Errors
    /// Returns error if the symbol is invalid or the command is not delivered.
    pub async fn close_orders_by_symbol(&self, symbol: &str) -> Result<u32, BridgeError> {
        let symbol = check_text("symbol", symbol)?;
        self.submit(CommandName::CloseOrdersBySymbol, symbol).await
    }

    /// Closes every order with a magic number.
    ///
    /// # Errors
    /// Returns error if the command is not delivered.
    pub async fn close_orders_by_magic(&self, magic: i64) -> Result<u32, BridgeError> {
        self.submit(CommandName::CloseOrdersByMagic, &magic.to_string())
            .await
    }

    /// Restarts command ids at 1 and tells the terminal to forget the ids it
    /// has seen.
    ///
    /// # Errors
    /// Returns error if the bridge is shut down or the command is not
    /// delivered.
    pub async fn reset_command_ids(&self) -> Result<u32, BridgeError> {
        if !self.is_active() {
            return Err(BridgeError::Shutdown);
        }
        self.commands().reset().await
    }
}
