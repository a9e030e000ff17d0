//! Event-driven GPSD client
//!
//! A [`GpsdClient`] is a cheap, cloneable handle to a driver task that owns
//! the connection. Methods never block: they queue a command for the driver
//! and return. Everything the connection produces (lifecycle transitions,
//! protocol messages, failures) is delivered as an [`Event`] to handlers
//! registered by name, or to channel subscribers.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use gpsd_events::client::GpsdClient;
//! use gpsd_events::config::{ClientConfig, ReconnectPolicy};
//! use gpsd_events::event::Event;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("127.0.0.1", 2947)
//!     .with_reconnect(ReconnectPolicy::fixed(Duration::from_secs(5)));
//! let client = GpsdClient::new(config)?;
//!
//! client.on("TPV", |event: &Event| println!("fix: {:?}", event.message()));
//! client.on("connected", |_: &Event| println!("connected"));
//!
//! client.connect().await?;
//! client.watch(None)?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    Result,
    config::ClientConfig,
    error::GpsdError,
    event::{Dispatcher, Event, HandlerId},
    protocol::v3::{
        RequestMessage,
        request::WatchOptions,
        types::{Device, Watch},
    },
};

mod driver;
/// Connection state machine
pub mod lifecycle;
/// Transport connectors
pub mod transport;

pub use lifecycle::ConnectionState;
pub use transport::{Connector, TcpConnector};

use driver::{Command, Driver};

/// Handle to a GPSD connection
///
/// The connection, with its reconnect timers, lives as long as at least one
/// clone of the handle does.
#[derive(Debug, Clone)]
pub struct GpsdClient {
    commands: mpsc::UnboundedSender<Command>,
    dispatcher: Arc<Dispatcher>,
    state: watch::Receiver<ConnectionState>,
}

impl GpsdClient {
    /// Creates a client connecting over TCP
    ///
    /// The client starts disconnected; call [`GpsdClient::connect`].
    /// Must be called within a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, TcpConnector)
    }

    /// Creates a client using a custom transport connector
    pub fn with_connector<C: Connector>(config: ClientConfig, connector: C) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(Dispatcher::new());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver::new(
            connector,
            config,
            dispatcher.clone(),
            command_rx,
            state_tx,
        );
        tokio::spawn(driver.run());

        Ok(GpsdClient {
            commands,
            dispatcher,
            state,
        })
    }

    /// Starts connecting
    ///
    /// The attempt is issued immediately, whether or not the returned future
    /// is polled. The future resolves once the attempt connects, or with the
    /// attempt's error when it fails. It resolves at once when already
    /// connected. Under a reconnect policy, later attempts are reported
    /// through events only.
    pub fn connect(&self) -> impl Future<Output = Result<()>> + Send + use<> {
        let (tx, rx) = oneshot::channel();
        let sent = self.command(Command::Connect(tx));
        async move {
            sent?;
            rx.await.map_err(|_| GpsdError::ClientClosed)?
        }
    }

    /// Unwatches and closes the connection
    ///
    /// The unwatch command and the close are issued immediately; the
    /// returned future resolves once the transport has closed. Automatic
    /// reconnects stop until the next [`GpsdClient::connect`].
    pub fn disconnect(&self) -> impl Future<Output = Result<()>> + Send + use<> {
        let (tx, rx) = oneshot::channel();
        let sent = self.command(Command::Disconnect(tx));
        async move {
            sent?;
            rx.await.map_err(|_| GpsdError::ClientClosed)
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the transport is connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Waits until the connection state satisfies `predicate`
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> Result<ConnectionState>
    where
        F: FnMut(ConnectionState) -> bool,
    {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| predicate(*s))
            .await
            .map_err(|_| GpsdError::ClientClosed)?;
        Ok(*reached)
    }

    /// Subscribes to streamed reports
    ///
    /// `None` sends the default directive, JSON on and NMEA off.
    pub fn watch(&self, watch: Option<Watch>) -> Result<()> {
        let watch = watch.unwrap_or_else(Watch::json_stream);
        self.send(RequestMessage::Watch(Some(watch)))
    }

    /// Subscribes to streamed reports built with [`WatchOptions`]
    pub fn watch_with(&self, opts: WatchOptions) -> Result<()> {
        self.watch(Some(opts.build()))
    }

    /// Stops streamed reports
    pub fn unwatch(&self) -> Result<()> {
        self.send(RequestMessage::unwatch())
    }

    /// Requests a `VERSION` report
    pub fn version(&self) -> Result<()> {
        self.send(RequestMessage::Version)
    }

    /// Requests a `DEVICES` report
    pub fn devices(&self) -> Result<()> {
        self.send(RequestMessage::Devices)
    }

    /// Requests a `DEVICE` report
    pub fn device(&self) -> Result<()> {
        self.send(RequestMessage::Device(None))
    }

    /// Configures a device
    pub fn configure_device(&self, device: Device) -> Result<()> {
        self.send(RequestMessage::Device(Some(device)))
    }

    /// Requests a `POLL` snapshot
    pub fn poll(&self) -> Result<()> {
        self.send(RequestMessage::Poll)
    }

    /// Queues a request
    ///
    /// When no transport is connected the request is dropped and an
    /// `error.socket` event reports it.
    pub fn send(&self, request: RequestMessage) -> Result<()> {
        self.command(Command::Send(request))
    }

    /// Registers a handler for events dispatched under `name`
    ///
    /// `name` is a lifecycle or error event name (see [`crate::event`]) or a
    /// message class such as `"TPV"`.
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.dispatcher.on(name, handler)
    }

    /// Registers a handler for the next event dispatched under `name`
    pub fn once<F>(&self, name: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.dispatcher.once(name, handler)
    }

    /// Removes a handler
    pub fn off(&self, id: HandlerId) -> bool {
        self.dispatcher.off(id)
    }

    /// Receives every event
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        self.dispatcher.subscribe()
    }

    fn command(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).map_err(|_| GpsdError::ClientClosed)
    }
}
