//! Example bridge client that subscribes to ticks and bars and requests
//! historic data.
//!
//! Run with: `cargo run --example client -- <path to MQL4/Files or MQL5/Files>`
//!
//! Set `OPEN_TEST_TRADES=1` to open and close small orders every few seconds.
//! Only do that on a demo account.

use chrono::Utc;
use mtbridge::prelude::*;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let files_dir = std::env::args()
        .nth(1)
        .ok_or("usage: client <terminal files directory>")?;
    let open_test_trades = std::env::var("OPEN_TEST_TRADES").is_ok_and(|v| v == "1");

    let (forwarder, mut events) = EventForwarder::channel();
    let bridge = BridgeBuilder::new(&files_dir)
        .handler(forwarder)
        .start()
        .await?;

    println!("Account info: {:?}", bridge.account_info());

    bridge.subscribe_symbols(&["EURUSD", "GBPUSD"]).await?;
    bridge
        .subscribe_symbols_bar_data(&[("EURUSD", "M15"), ("GBPJPY", "M5"), ("AUDCAD", "M1")])
        .await?;

    let end = Utc::now();
    let start = end - chrono::Duration::days(30);
    bridge.get_historic_data("EURUSD", "D1", start, end).await?;

    let mut last_open = Instant::now();
    let mut last_close = Instant::now();
    let mut buy_next = true;

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            BridgeEvent::Started => println!("bridge started"),
            BridgeEvent::Tick { symbol, bid, ask } => {
                println!("on_tick: {} {symbol} {bid} {ask}", Utc::now());

                if !open_test_trades {
                    continue;
                }

                if last_open.elapsed() > Duration::from_secs(3) {
                    last_open = Instant::now();
                    let (order_type, price) = if buy_next {
                        (OrderType::Buy, ask)
                    } else {
                        (OrderType::Sell, bid)
                    };
                    buy_next = !buy_next;
                    let request = OrderRequest::new(symbol.as_str(), order_type)
                        .price(price)
                        .lots(0.5);
                    if let Err(e) = bridge.open_order(&request).await {
                        eprintln!("open_order failed: {e}");
                    }
                }

                if last_close.elapsed() > Duration::from_secs(10) {
                    last_close = Instant::now();
                    for ticket in bridge.open_orders().keys() {
                        let Ok(ticket) = ticket.parse::<u64>() else {
                            continue;
                        };
                        if let Err(e) = bridge.close_order(ticket, 0.1).await {
                            eprintln!("close_order failed: {e}");
                        }
                    }
                }

                if bridge.open_orders().len() >= 10 {
                    if let Err(e) = bridge.close_all_orders().await {
                        eprintln!("close_all_orders failed: {e}");
                    }
                }
            }
            BridgeEvent::Bar {
                symbol,
                timeframe,
                bar,
            } => {
                println!(
                    "on_bar_data: {symbol} {timeframe} {} {} {} {} {} {}",
                    Utc::now(),
                    bar.time,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close
                );
            }
            BridgeEvent::HistoricData {
                symbol,
                timeframe,
                data,
            } => {
                println!("historic_data: {symbol} {timeframe} {} bars", data.len());
            }
            BridgeEvent::HistoricTrades => {
                println!("historic_trades: {}", bridge.historic_trades().len());
            }
            BridgeEvent::Message(message) => {
                if message.is_error() {
                    println!(
                        "ERROR | {} | {}",
                        message.field("error_type").unwrap_or_default(),
                        message.field("description").unwrap_or_default()
                    );
                } else {
                    println!(
                        "{} | {}",
                        message.kind,
                        message.field("message").unwrap_or_default()
                    );
                }
            }
            BridgeEvent::OrderEvent => {
                println!(
                    "on_order_event. open_orders: {} open orders",
                    bridge.open_orders().len()
                );
            }
        }
    }

    bridge.shutdown().await;
    Ok(())
}
