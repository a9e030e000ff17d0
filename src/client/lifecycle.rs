//! Connection lifecycle state machine
//!
//! [`Lifecycle`] performs no I/O. It receives transport notifications and
//! timer ticks, updates the connection state, frames and routes inbound
//! data, dispatches events, and answers with the [`Action`]s the transport
//! owner must carry out. Keeping it free of sockets and clocks lets every
//! transition be driven and checked deterministically.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    config::{ClientConfig, ReconnectPolicy},
    event::{Dispatcher, Event},
    framing::FrameBuffer,
    protocol::v3::RequestMessage,
    router::MessageRouter,
};

/// State of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport, or a transport that is being ended
    #[default]
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Transport established
    Connected,
}

/// Something the transport reported
#[derive(Debug)]
pub enum Notification {
    /// Connect attempt succeeded
    Connect,
    /// Bytes received
    Data(Vec<u8>),
    /// Transport closed, or a connect attempt failed
    Close,
    /// Transport error; a close follows when the transport is unusable
    Error(io::Error),
    /// No activity for the configured idle timeout
    Timeout,
}

/// Transport operation requested by the lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start a connect attempt
    Connect,
    /// Write a request
    Send(RequestMessage),
    /// Close the write half and wait for the peer to close
    End,
    /// Drop the transport, or abort the connect attempt, without waiting
    Destroy,
    /// Start the fixed reconnect timer
    ArmReconnect(Duration),
    /// Cancel the fixed reconnect timer
    DisarmReconnect,
}

/// Connection state, framing and reconnect bookkeeping of one client
#[derive(Debug)]
pub struct Lifecycle {
    state: ConnectionState,
    /// A transport has connected and not closed yet
    handle_open: bool,
    last_received_at: Instant,
    reconnect_armed: bool,
    /// Set until the first `connect` and by `disconnect`; blocks automatic
    /// reconnects
    stopped: bool,
    frames: FrameBuffer,
    router: MessageRouter,
    policy: ReconnectPolicy,
    emit_transient_errors: bool,
    dispatcher: Arc<Dispatcher>,
}

impl Lifecycle {
    /// Creates a disconnected lifecycle
    pub fn new(config: &ClientConfig, dispatcher: Arc<Dispatcher>, now: Instant) -> Self {
        Lifecycle {
            state: ConnectionState::Disconnected,
            handle_open: false,
            last_received_at: now,
            reconnect_armed: false,
            stopped: true,
            frames: FrameBuffer::with_delimiter(&config.delimiter),
            router: MessageRouter::new(config.parse),
            policy: config.reconnect,
            emit_transient_errors: config.emits_transient_errors(),
            dispatcher,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the transport is connected
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether a transport handle exists, connected or being ended
    pub fn has_transport(&self) -> bool {
        self.handle_open
    }

    /// When data last arrived, or the last attempt started
    pub fn last_received_at(&self) -> Instant {
        self.last_received_at
    }

    /// Whether the fixed reconnect timer is running
    pub fn reconnect_armed(&self) -> bool {
        self.reconnect_armed
    }

    /// Reconnection policy in effect
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Starts connecting unless already connecting or connected
    ///
    /// The staleness window restarts with the new attempt.
    pub fn connect(&mut self, now: Instant) -> Vec<Action> {
        self.stopped = false;
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored");
            return Vec::new();
        }

        let mut actions = self.teardown();
        self.last_received_at = now;
        self.state = ConnectionState::Connecting;
        actions.push(Action::Connect);
        actions
    }

    /// Unwatches and ends the transport; automatic reconnects stop
    pub fn disconnect(&mut self) -> Vec<Action> {
        self.stopped = true;

        let mut actions = Vec::new();
        if self.reconnect_armed {
            self.reconnect_armed = false;
            actions.push(Action::DisarmReconnect);
        }

        match self.state {
            ConnectionState::Connected => {
                actions.push(Action::Send(RequestMessage::unwatch()));
                actions.push(Action::End);
                self.state = ConnectionState::Disconnected;
            }
            ConnectionState::Connecting => {
                actions.extend(self.teardown());
                self.state = ConnectionState::Disconnected;
            }
            // Either idle, or already ending and waiting for the close
            ConnectionState::Disconnected => {}
        }
        actions
    }

    /// Applies a transport notification
    pub fn notify(&mut self, notification: Notification, now: Instant) -> Vec<Action> {
        match notification {
            Notification::Connect => self.on_connect(now),
            Notification::Data(bytes) => {
                self.on_data(&bytes, now);
                Vec::new()
            }
            Notification::Close => self.on_close(),
            Notification::Error(err) => {
                self.on_error(err);
                Vec::new()
            }
            Notification::Timeout => self.on_timeout(),
        }
    }

    /// A connect attempt succeeded; cancels pending fixed reconnects
    pub fn on_connect(&mut self, now: Instant) -> Vec<Action> {
        self.state = ConnectionState::Connected;
        self.handle_open = true;
        self.last_received_at = now;
        self.frames.clear();

        let mut actions = Vec::new();
        if self.reconnect_armed {
            self.reconnect_armed = false;
            actions.push(Action::DisarmReconnect);
        }

        tracing::info!("connected to gpsd");
        self.emit(Event::Connected);
        actions
    }

    /// Frames the chunk and routes every complete message, in order
    pub fn on_data(&mut self, chunk: &[u8], now: Instant) {
        self.last_received_at = now;
        self.frames.push(chunk);
        while let Some(message) = self.frames.extract() {
            for event in self.router.route(&message) {
                self.emit(event);
            }
        }
    }

    /// The transport closed, or a connect attempt failed
    ///
    /// Emits `disconnected` either way, then arms the fixed reconnect timer
    /// unless the close was requested.
    pub fn on_close(&mut self) -> Vec<Action> {
        if std::mem::replace(&mut self.handle_open, false) {
            tracing::info!("disconnected from gpsd");
        } else {
            tracing::debug!("connect attempt closed");
        }
        self.state = ConnectionState::Disconnected;
        self.frames.clear();
        self.emit(Event::Disconnected);

        match self.policy {
            ReconnectPolicy::FixedInterval { interval } if !self.stopped && !self.reconnect_armed => {
                tracing::debug!(?interval, "scheduling reconnect attempts");
                self.reconnect_armed = true;
                vec![Action::ArmReconnect(interval)]
            }
            _ => Vec::new(),
        }
    }

    /// Reports a transport error without changing state
    pub fn on_error(&mut self, err: io::Error) {
        let transient = matches!(
            err.kind(),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
        );

        if !transient {
            tracing::warn!(error = %err, "socket error");
            self.emit(Event::Socket(err.into()));
        } else if self.emit_transient_errors {
            tracing::debug!(error = %err, "connection error");
            self.emit(Event::Connection(err.into()));
        } else {
            tracing::debug!(error = %err, "suppressed connection error");
        }
    }

    /// Idle timeout elapsed; ends an established transport gracefully
    pub fn on_timeout(&mut self) -> Vec<Action> {
        if !self.handle_open || self.state != ConnectionState::Connected {
            return Vec::new();
        }

        tracing::info!("gpsd connection timed out");
        self.emit(Event::Timeout);
        self.state = ConnectionState::Disconnected;
        vec![Action::End]
    }

    /// Fixed reconnect timer fired
    pub fn on_reconnect_tick(&mut self) -> Vec<Action> {
        if !self.reconnect_armed || self.stopped || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }

        tracing::debug!("reconnecting");
        self.emit(Event::Reconnecting);
        let mut actions = self.teardown();
        self.state = ConnectionState::Connecting;
        actions.push(Action::Connect);
        actions
    }

    /// Staleness timer fired
    ///
    /// Forces a reconnect when nothing was received for longer than the
    /// threshold. The silence window restarts with the new attempt.
    pub fn on_staleness_tick(&mut self, now: Instant) -> Vec<Action> {
        let ReconnectPolicy::StalenessThreshold { threshold, .. } = self.policy else {
            return Vec::new();
        };
        if self.stopped {
            return Vec::new();
        }

        let silence = now.saturating_duration_since(self.last_received_at);
        if silence <= threshold {
            return Vec::new();
        }

        tracing::info!(?silence, ?threshold, "gpsd connection stale, reconnecting");
        self.emit(Event::Reconnecting);
        let mut actions = self.teardown();
        self.last_received_at = now;
        self.state = ConnectionState::Connecting;
        actions.push(Action::Connect);
        actions
    }

    /// Hard-closes whatever transport or attempt exists
    ///
    /// The destroyed transport reports no close of its own, so
    /// `disconnected` is emitted here.
    fn teardown(&mut self) -> Vec<Action> {
        let connecting = self.state == ConnectionState::Connecting;
        if !self.handle_open && !connecting {
            return Vec::new();
        }

        self.handle_open = false;
        self.frames.clear();
        self.state = ConnectionState::Disconnected;
        self.emit(Event::Disconnected);
        vec![Action::Destroy]
    }

    fn emit(&self, event: Event) {
        self.dispatcher.dispatch(event);
    }
}
