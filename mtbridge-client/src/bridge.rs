//! Bridge builder and the running bridge handle.

use crate::channel::CommandChannel;
use crate::config::{BridgeConfig, CommandChannelConfig};
use crate::error::BridgeError;
use crate::feeds::{BarDataFeed, HistoricFeed, MarketDataFeed, MessagesFeed, OrdersFeed};
use crate::handler::EventHandler;
use crate::poller::{Feed, PollerControl, WatchedFile, run_poller};
use crate::restart::RestartStateStore;
use crate::sequencer::MessageSequencer;
use crate::state::BridgeState;
use mtbridge_core::{
    AccountInfo, BarDataSnapshot, CommandName, FileStore, HistoricDataSnapshot, HistoricTrades,
    MailboxFile, MailboxLayout, MarketDataSnapshot, OrderSnapshot, OrdersFile,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Builder for configuring and starting a bridge.
pub struct BridgeBuilder {
    metatrader_dir: PathBuf,
    config: BridgeConfig,
    handler: Option<Arc<dyn EventHandler>>,
}

impl BridgeBuilder {
    /// Creates a builder for the terminal files directory that contains the
    /// `DWX` mailbox.
    #[must_use]
    pub fn new(metatrader_dir: impl Into<PathBuf>) -> Self {
        Self {
            metatrader_dir: metatrader_dir.into(),
            config: BridgeConfig::default(),
            handler: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn sleep_delay(mut self, delay: Duration) -> Self {
        self.config.sleep_delay = delay;
        self
    }

    /// Sets the command delivery timeout.
    #[must_use]
    pub fn max_retry_command(mut self, timeout: Duration) -> Self {
        self.config.max_retry_command = timeout;
        self
    }

    /// Enables or disables restoring and storing the orders snapshot.
    #[must_use]
    pub fn load_orders_from_file(mut self, enabled: bool) -> Self {
        self.config.load_orders_from_file = enabled;
        self
    }

    /// Sets the number of command hand-off files.
    #[must_use]
    pub fn command_files(mut self, count: usize) -> Self {
        self.config.command_files = count;
        self
    }

    /// Sets the delay before polling starts when a handler is installed.
    #[must_use]
    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.config.start_delay = delay;
        self
    }

    /// Sets the pause after a command id reset.
    #[must_use]
    pub fn reset_pause(mut self, pause: Duration) -> Self {
        self.config.reset_pause = pause;
        self
    }

    /// Installs the event handler.
    #[must_use]
    pub fn handler<H: EventHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validates the mailbox, restores stored state, spawns the pollers and
    /// starts them.
    ///
    /// # Errors
    /// Returns [`BridgeError::MissingDirectory`] if the `DWX` directory does
    /// not exist. Nothing is spawned in that case.
    pub async fn start(self) -> Result<Bridge, BridgeError> {
        let layout = MailboxLayout::new(&self.metatrader_dir);
        let is_dir = tokio::fs::metadata(layout.dir())
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(BridgeError::MissingDirectory(layout.dir().to_path_buf()));
        }

        let has_handler = self.handler.is_some();
        let start_delay = self.config.start_delay;
        let bridge = Bridge::new(layout, self.config, self.handler);

        bridge.spawn_pollers().await;

        if let Err(e) = bridge.inner.commands.reset().await {
            tracing::warn!(error = %e, "command id reset not delivered");
        }

        if has_handler && !start_delay.is_zero() {
            tokio::time::sleep(start_delay).await;
        }

        // The handler sees `on_start` before any poller event.
        if let Some(handler) = bridge.handler() {
            handler.on_start(&bridge);
        }

        bridge.inner.start_tx.send_replace(true);
        tracing::info!(dir = %bridge.layout().dir().display(), "bridge started");

        Ok(bridge)
    }
}

struct BridgeInner {
    config: BridgeConfig,
    layout: MailboxLayout,
    store: FileStore,
    state: BridgeState,
    restart: RestartStateStore,
    commands: CommandChannel,
    handler: Option<Arc<dyn EventHandler>>,
    cancel: CancellationToken,
    start_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a running bridge.
///
/// Cloning is cheap; all clones share the same pollers and snapshots. The
/// pollers keep running until [`Bridge::shutdown`] is called or the last
/// handle returned by [`BridgeBuilder::start`] (and its clones) is dropped.
/// Handles passed to [`EventHandler`] callbacks do not keep the pollers alive.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
    _guard: Option<Arc<DropGuard>>,
}

impl Bridge {
    pub(crate) fn new(
        layout: MailboxLayout,
        config: BridgeConfig,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        let store = FileStore::default();
        let commands = CommandChannel::new(
            layout.clone(),
            store.clone(),
            CommandChannelConfig::from(&config),
        );
        let (start_tx, _) = watch::channel(false);
        let cancel = CancellationToken::new();

        Self {
            _guard: Some(Arc::new(cancel.clone().drop_guard())),
            inner: Arc::new(BridgeInner {
                restart: RestartStateStore::new(&layout, store.clone()),
                config,
                layout,
                store,
                state: BridgeState::new(),
                commands,
                handler,
                cancel,
                start_tx,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    async fn spawn_pollers(&self) {
        let layout = self.layout();

        let messages_path = layout.path(MailboxFile::Messages);
        let (messages_file, sequencer) = match self.restart().load_messages().await {
            Some(restored) => {
                self.state().set_last_message_millis(restored.watermark);
                (
                    WatchedFile::with_last_text(messages_path, restored.text),
                    MessageSequencer::with_watermark(restored.watermark),
                )
            }
            None => (WatchedFile::new(messages_path), MessageSequencer::new()),
        };

        let persist_orders = self.config().load_orders_from_file;
        let orders_path = layout.path(MailboxFile::Orders);
        let restored_orders = if persist_orders {
            self.restart().load_orders().await
        } else {
            None
        };
        let orders_file = match restored_orders {
            Some(restored) => {
                self.state().publish_orders(Arc::new(restored.file));
                WatchedFile::with_last_text(orders_path, restored.text)
            }
            None => WatchedFile::new(orders_path),
        };

        let feeds: Vec<Box<dyn Feed>> = vec![
            Box::new(OrdersFeed::new(orders_file, persist_orders)),
            Box::new(MessagesFeed::new(messages_file, sequencer)),
            Box::new(MarketDataFeed::new(WatchedFile::new(
                layout.path(MailboxFile::MarketData),
            ))),
            Box::new(BarDataFeed::new(WatchedFile::new(
                layout.path(MailboxFile::BarData),
            ))),
            Box::new(HistoricFeed::new(
                WatchedFile::new(layout.path(MailboxFile::HistoricData)),
                WatchedFile::new(layout.path(MailboxFile::HistoricTrades)),
            )),
        ];

        let control = PollerControl {
            started: self.inner.start_tx.subscribe(),
            cancel: self.inner.cancel.clone(),
            interval: self.config().sleep_delay,
        };

        let handles: Vec<JoinHandle<()>> = feeds
            .into_iter()
            .map(|feed| tokio::spawn(run_poller(feed, self.detached(), control.clone())))
            .collect();

        tracing::info!(pollers = handles.len(), "pollers spawned");
        self.inner.tasks.lock().extend(handles);
    }

    /// Returns a handle that shares the bridge but does not cancel it on drop.
    fn detached(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _guard: None,
        }
    }

    /// Submits a raw command.
    ///
    /// # Returns
    /// The sequence id the command was written with.
    ///
    /// # Errors
    /// Returns [`BridgeError::Shutdown`] after [`Bridge::shutdown`],
    /// [`BridgeError::CommandTimeout`] if the hand-off pool stayed full.
    pub async fn submit(&self, name: CommandName, content: &str) -> Result<u32, BridgeError> {
        if !self.is_active() {
            return Err(BridgeError::Shutdown);
        }
        self.inner.commands.submit(name, content).await
    }

    /// Stops all pollers and waits for them to finish their current tick.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.tasks.lock());
        if handles.is_empty() {
            return;
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "poller task failed");
            }
        }
        tracing::info!("bridge shut down");
    }

    /// Returns true until [`Bridge::shutdown`] is called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Returns true once the pollers are polling.
    #[must_use]
    pub fn is_started(&self) -> bool {
        *self.inner.start_tx.borrow()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Returns the mailbox layout.
    #[must_use]
    pub fn layout(&self) -> &MailboxLayout {
        &self.inner.layout
    }

    /// Returns the orders snapshot together with its account info.
    #[must_use]
    pub fn orders(&self) -> Arc<OrdersFile> {
        self.inner.state.orders()
    }

    /// Returns the open orders keyed by ticket.
    #[must_use]
    pub fn open_orders(&self) -> OrderSnapshot {
        self.orders().orders.clone()
    }

    /// Returns the account info from the latest orders update.
    #[must_use]
    pub fn account_info(&self) -> AccountInfo {
        self.orders().account_info.clone()
    }

    /// Returns the latest quotes.
    #[must_use]
    pub fn market_data(&self) -> Arc<MarketDataSnapshot> {
        self.inner.state.market_data()
    }

    /// Returns the latest bars.
    #[must_use]
    pub fn bar_data(&self) -> Arc<BarDataSnapshot> {
        self.inner.state.bar_data()
    }

    /// Returns all historic data received so far.
    #[must_use]
    pub fn historic_data(&self) -> Arc<HistoricDataSnapshot> {
        self.inner.state.historic_data()
    }

    /// Returns the latest historic trades.
    #[must_use]
    pub fn historic_trades(&self) -> Arc<HistoricTrades> {
        self.inner.state.historic_trades()
    }

    /// Returns the timestamp of the newest delivered message.
    #[must_use]
    pub fn last_message_millis(&self) -> u64 {
        self.inner.state.last_message_millis()
    }

    pub(crate) fn state(&self) -> &BridgeState {
        &self.inner.state
    }

    pub(crate) fn store(&self) -> &FileStore {
        &self.inner.store
    }

    pub(crate) fn restart(&self) -> &RestartStateStore {
        &self.inner.restart
    }

    pub(crate) fn handler(&self) -> Option<&dyn EventHandler> {
        self.inner.handler.as_deref()
    }

    pub(crate) fn commands(&self) -> &CommandChannel {
        &self.inner.commands
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("dir", &self.inner.layout.dir())
            .field("started", &self.is_started())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BridgeEvent, EventForwarder};
    use crate::orders::{OrderModification, OrderRequest, OrderType};
    use mtbridge_core::CommandRecord;
    use serde_json::{Map, Value, json};
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn mailbox() -> (TempDir, PathBuf) {
        let root = tempdir().unwrap();
        let dwx = root.path().join("DWX");
        fs::create_dir(&dwx).unwrap();
        (root, dwx)
    }

    fn fast_builder(root: &Path) -> BridgeBuilder {
        BridgeBuilder::new(root)
            .sleep_delay(Duration::from_millis(1))
            .max_retry_command(Duration::from_secs(2))
            .start_delay(Duration::ZERO)
            .reset_pause(Duration::from_millis(1))
    }

    async fn next_event(rx: &mut UnboundedReceiver<BridgeEvent>) -> BridgeEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    async fn expect_quiet(rx: &mut UnboundedReceiver<BridgeEvent>) {
        let result = timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(result.is_err(), "unexpected event {result:?}");
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let root = tempdir().unwrap();
        let result = BridgeBuilder::new(root.path()).start().await;
        assert!(matches!(result, Err(BridgeError::MissingDirectory(dir)) if dir.ends_with("DWX")));
    }

    #[tokio::test]
    async fn test_start_sends_reset_and_shutdown_stops() {
        let (root, dwx) = mailbox();
        let (forwarder, mut rx) = EventForwarder::channel();
        let bridge = fast_builder(root.path()).handler(forwarder).start().await.unwrap();

        assert_eq!(next_event(&mut rx).await, BridgeEvent::Started);
        assert!(bridge.is_started());

        let text = fs::read_to_string(dwx.join("DWX_Commands_0.txt")).unwrap();
        let record = CommandRecord::decode(&text).unwrap();
        assert_eq!(record.seq(), 1);
        assert_eq!(record.name(), CommandName::ResetCommandIds);

        bridge.shutdown().await;
        assert!(!bridge.is_active());
        assert!(matches!(
            bridge.submit(CommandName::CloseAllOrders, "").await,
            Err(BridgeError::Shutdown)
        ));

        // Pollers are gone: new files are no longer picked up.
        fs::write(dwx.join("DWX_Orders.txt"), r#"{"orders": {"1": {}}}"#).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(bridge.open_orders().is_empty());
    }

    #[tokio::test]
    async fn test_no_handler_skips_start_delay() {
        let (root, _dwx) = mailbox();
        let started = std::time::Instant::now();
        let bridge = fast_builder(root.path())
            .start_delay(Duration::from_secs(30))
            .start()
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(bridge.is_started());
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropping_last_handle_stops_pollers() {
        let (root, _dwx) = mailbox();
        let bridge = fast_builder(root.path()).start().await.unwrap();
        let cancel = bridge.inner.cancel.clone();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *bridge.inner.tasks.lock());
        assert_eq!(handles.len(), 5);

        let other = bridge.clone();
        drop(bridge);
        assert!(!cancel.is_cancelled());
        assert!(other.is_active());

        drop(other);
        assert!(cancel.is_cancelled());
        timeout(WAIT, futures::future::join_all(handles))
            .await
            .expect("pollers still running");
    }

    #[tokio::test]
    async fn test_restart_does_not_replay_stored_state() {
        let (root, dwx) = mailbox();
        fs::write(
            dwx.join("DWX_Orders_Stored.txt"),
            r#"{"account_info": {"balance": 50}, "orders": {"123": {"symbol": "EURUSD"}}}"#,
        )
        .unwrap();
        fs::write(
            dwx.join("DWX_Messages_Stored.txt"),
            r#"{"1000": {"type": "INFO", "message": "old"}}"#,
        )
        .unwrap();

        // Live files already differ textually from the stored copies.
        fs::write(
            dwx.join("DWX_Orders.txt"),
            r#"{"account_info": {"balance": 51}, "orders": {"123": {"symbol": "EURUSD", "pnl": 2}}}"#,
        )
        .unwrap();
        fs::write(
            dwx.join("DWX_Messages.txt"),
            r#"{"1000": {"type": "INFO", "message": "old"}, "2000": {"type": "INFO", "message": "new"}}"#,
        )
        .unwrap();

        let (forwarder, mut rx) = EventForwarder::channel();
        let bridge = fast_builder(root.path()).handler(forwarder).start().await.unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Started);

        match next_event(&mut rx).await {
            BridgeEvent::Message(message) => assert_eq!(message.field("message"), Some("new")),
            other => panic!("unexpected event {other:?}"),
        }
        expect_quiet(&mut rx).await;

        assert_eq!(bridge.account_info().balance, 51.0);
        assert_eq!(bridge.last_message_millis(), 2000);

        fs::write(
            dwx.join("DWX_Orders.txt"),
            r#"{"orders": {"123": {"symbol": "EURUSD"}, "456": {"symbol": "GBPUSD"}}}"#,
        )
        .unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::OrderEvent);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_orders_not_restored_when_disabled() {
        let (root, dwx) = mailbox();
        fs::write(dwx.join("DWX_Orders_Stored.txt"), r#"{"orders": {"123": {}}}"#).unwrap();

        let (forwarder, mut rx) = EventForwarder::channel();
        let bridge = fast_builder(root.path())
            .load_orders_from_file(false)
            .handler(forwarder)
            .start()
            .await
            .unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Started);
        assert!(bridge.open_orders().is_empty());

        fs::write(dwx.join("DWX_Orders.txt"), r#"{"orders": {"123": {}}}"#).unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::OrderEvent);

        bridge.shutdown().await;
    }

    /// Minimal terminal: consumes command files in pool order and maintains
    /// the orders and messages files.
    struct FakeTerminal {
        dir: PathBuf,
        pool_size: usize,
        next_ticket: u64,
        next_millis: u64,
        orders: Map<String, Value>,
        messages: Map<String, Value>,
    }

    impl FakeTerminal {
        fn new(dir: PathBuf, pool_size: usize) -> Self {
            Self {
                dir,
                pool_size,
                next_ticket: 1000,
                next_millis: 1_600_000_000_000,
                orders: Map::new(),
                messages: Map::new(),
            }
        }

        fn step(&mut self) {
            for index in 0..self.pool_size {
                let path = self.dir.join(format!("DWX_Commands_{index}.txt"));
                let Ok(text) = fs::read_to_string(&path) else {
                    continue;
                };
                // Created but not written yet.
                let Ok(record) = CommandRecord::decode(&text) else {
                    continue;
                };
                fs::remove_file(&path).unwrap();
                self.execute(&record);
            }
        }

        fn execute(&mut self, record: &CommandRecord) {
            let fields: Vec<&str> = record.content().split(',').collect();
            match record.name() {
                CommandName::OpenOrder => {
                    self.next_ticket += 1;
                    self.orders.insert(
                        self.next_ticket.to_string(),
                        json!({
                            "symbol": fields[0],
                            "type": fields[1],
                            "lots": fields[2].parse::<f64>().unwrap(),
                            "SL": fields[4].parse::<f64>().unwrap(),
                            "TP": fields[5].parse::<f64>().unwrap(),
                            "magic": fields[6].parse::<i64>().unwrap(),
                            "comment": fields[7],
                        }),
                    );
                    self.write_orders();
                }
                CommandName::ModifyOrder => {
                    let order = self.orders.get_mut(fields[0]).unwrap();
                    order["SL"] = json!(fields[3].parse::<f64>().unwrap());
                    order["TP"] = json!(fields[4].parse::<f64>().unwrap());
                    self.write_orders();
                    self.write_message(json!({"type": "INFO", "message": "modified", "ticket": fields[0]}));
                }
                CommandName::CloseOrder => {
                    self.orders.remove(fields[0]);
                    self.write_orders();
                }
                _ => {}
            }
        }

        fn write_orders(&self) {
            let text = json!({"account_info": {"balance": 1000}, "orders": self.orders});
            fs::write(self.dir.join("DWX_Orders.txt"), text.to_string()).unwrap();
        }

        fn write_message(&mut self, message: Value) {
            self.next_millis += 1;
            self.messages.insert(self.next_millis.to_string(), message);
            let text = Value::Object(self.messages.clone()).to_string();
            fs::write(self.dir.join("DWX_Messages.txt"), text).unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_order_round_trip() {
        let (root, dwx) = mailbox();
        let pool_size = 4;

        let cancel = CancellationToken::new();
        let terminal = tokio::spawn({
            let cancel = cancel.clone();
            let mut fake = FakeTerminal::new(dwx.clone(), pool_size);
            async move {
                while !cancel.is_cancelled() {
                    fake.step();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }
        });

        let (forwarder, mut rx) = EventForwarder::channel();
        let bridge = fast_builder(root.path())
            .command_files(pool_size)
            .handler(forwarder)
            .start()
            .await
            .unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::Started);

        bridge
            .open_order(
                &OrderRequest::new("EURUSD", OrderType::Buy)
                    .lots(0.02)
                    .take_profit(1.3)
                    .magic(7)
                    .comment("round-trip"),
            )
            .await
            .unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::OrderEvent);

        let orders = bridge.open_orders();
        assert_eq!(orders.len(), 1);
        let (ticket, order) = orders.iter().next().unwrap();
        assert_eq!(order.symbol, "EURUSD");
        assert_eq!(order.lots, 0.02);
        assert_eq!(order.comment, "round-trip");
        let ticket: u64 = ticket.parse().unwrap();

        bridge
            .modify_order(&OrderModification::new(ticket).stop_loss(1.1).take_profit(1.4))
            .await
            .unwrap();
        match next_event(&mut rx).await {
            BridgeEvent::Message(message) => assert_eq!(message.field("message"), Some("modified")),
            other => panic!("unexpected event {other:?}"),
        }
        // Orders and messages are polled independently.
        let key = ticket.to_string();
        wait_until(|| {
            bridge
                .open_orders()
                .get(&key)
                .is_some_and(|order| order.stop_loss == 1.1 && order.take_profit == 1.4)
        })
        .await;

        bridge.close_order(ticket, 0.0).await.unwrap();
        assert_eq!(next_event(&mut rx).await, BridgeEvent::OrderEvent);
        assert!(bridge.open_orders().is_empty());

        expect_quiet(&mut rx).await;

        bridge.shutdown().await;
        cancel.cancel();
        terminal.await.unwrap();
    }
}
