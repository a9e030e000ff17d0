//! Events produced by the client and the dispatcher delivering them
//!
//! Every observation the client makes (connection transitions, routed
//! messages, failures) becomes an [`Event`]. Events are delivered by name:
//! fixed names for lifecycle and error events, and the message's `class`
//! value for protocol messages. The name to handler mapping is resolved when
//! the event is dispatched, so handlers may be registered for classes this
//! crate knows nothing about.
//!
//! # Example
//!
//! ```
//! use gpsd_events::event::{Dispatcher, Event};
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.on("connected", |_event: &Event| println!("connected"));
//!
//! assert_eq!(dispatcher.dispatch(Event::Connected), 1);
//! assert_eq!(dispatcher.dispatch(Event::Timeout), 0);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::router::{BadMessage, ParsedMessage};

/// Emitted when the transport connects
pub const CONNECTED: &str = "connected";
/// Emitted when the transport or a connect attempt closes
pub const DISCONNECTED: &str = "disconnected";
/// Emitted before each automatic reconnect attempt
pub const RECONNECTING: &str = "reconnecting";
/// Emitted when the transport has been idle for too long
pub const TIMEOUT: &str = "timeout";
/// Emitted for every unit when message parsing is disabled
pub const RAW: &str = "raw";
/// Emitted for units that could not be parsed
pub const ERROR: &str = "error";
/// Emitted for socket failures other than refused/reset
pub const ERROR_SOCKET: &str = "error.socket";
/// Emitted for refused/reset connections when not suppressed
pub const ERROR_CONNECTION: &str = "error.connection";

/// Shared transport error attached to socket events
///
/// `std::io::Error` is not `Clone`, the error is reference counted so an
/// event can reach several handlers.
#[derive(Debug, Clone)]
pub struct TransportError(Arc<std::io::Error>);

impl TransportError {
    /// Kind of the underlying I/O error
    pub fn kind(&self) -> std::io::ErrorKind {
        self.0.kind()
    }

    /// The underlying I/O error
    pub fn get_ref(&self) -> &std::io::Error {
        &self.0
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError(Arc::new(err))
    }
}

impl PartialEq for TransportError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.0.to_string() == other.0.to_string()
    }
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// An observation dispatched to handlers
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Transport connected
    Connected,
    /// The transport or a connect attempt closed
    Disconnected,
    /// An automatic reconnect attempt is about to start
    Reconnecting,
    /// Transport idle timeout elapsed
    Timeout,
    /// Unparsed unit (message parsing disabled)
    Raw(String),
    /// Parsed protocol message, dispatched under its class
    Message(ParsedMessage),
    /// Unit that could not be parsed
    BadMessage(BadMessage),
    /// Socket failure
    Socket(TransportError),
    /// Refused or reset connection
    Connection(TransportError),
}

impl Event {
    /// Name the event is dispatched under
    pub fn name(&self) -> &str {
        match self {
            Event::Connected => CONNECTED,
            Event::Disconnected => DISCONNECTED,
            Event::Reconnecting => RECONNECTING,
            Event::Timeout => TIMEOUT,
            Event::Raw(_) => RAW,
            Event::Message(msg) => msg.class.as_str(),
            Event::BadMessage(_) => ERROR,
            Event::Socket(_) => ERROR_SOCKET,
            Event::Connection(_) => ERROR_CONNECTION,
        }
    }

    /// Parsed message carried by this event, if any
    pub fn message(&self) -> Option<&ParsedMessage> {
        match self {
            Event::Message(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Identifies a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Registration {
    id: HandlerId,
    once: bool,
    handler: Handler,
}

/// Delivers events to handlers registered by name and to channel subscribers
///
/// Handlers run synchronously on the dispatching task, in registration
/// order. No lock is held while a handler runs, so handlers may register
/// or remove other handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<String, Vec<Registration>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
    next_id: AtomicU64,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("events", &lock(&self.handlers).keys().collect::<Vec<_>>())
            .field("subscribers", &lock(&self.subscribers).len())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every event dispatched under `name`
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(name.into(), false, Arc::new(handler))
    }

    /// Registers a handler for the next event dispatched under `name` only
    pub fn once<F>(&self, name: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(name.into(), true, Arc::new(handler))
    }

    /// Removes a handler, returning whether it was registered
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = lock(&self.handlers);
        let mut removed = false;
        for registrations in handlers.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        handlers.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    /// Receives every dispatched event, whatever its name
    ///
    /// The subscription ends when the receiver is dropped.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Number of handlers registered under `name`
    pub fn listener_count(&self, name: &str) -> usize {
        lock(&self.handlers).get(name).map_or(0, Vec::len)
    }

    /// Delivers an event, returning how many handlers and subscribers got it
    pub fn dispatch(&self, event: Event) -> usize {
        let handlers: Vec<Handler> = {
            let mut handlers = lock(&self.handlers);
            match handlers.get_mut(event.name()) {
                Some(registrations) => {
                    let selected = registrations.iter().map(|r| r.handler.clone()).collect();
                    registrations.retain(|r| !r.once);
                    if registrations.is_empty() {
                        handlers.remove(event.name());
                    }
                    selected
                }
                None => Vec::new(),
            }
        };

        for handler in handlers.iter() {
            handler(&event);
        }

        let mut delivered = handlers.len();
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });

        if delivered == 0 && matches!(event, Event::BadMessage(_) | Event::Socket(_)) {
            tracing::debug!(event = event.name(), "failure event had no listener");
        }
        delivered
    }

    fn register(&self, name: String, once: bool, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.handlers)
            .entry(name)
            .or_default()
            .push(Registration { id, once, handler });
        id
    }
}

/// Handlers may panic; the maps stay consistent so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Event) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_: &Event| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn message_events_are_dispatched_by_class() {
        let dispatcher = Dispatcher::new();
        let (tpv, on_tpv) = counter();
        let (sky, on_sky) = counter();
        dispatcher.on("TPV", on_tpv);
        dispatcher.on("SKY", on_sky);

        let msg = ParsedMessage::from_value(serde_json::json!({"class": "TPV"})).unwrap();
        assert_eq!(dispatcher.dispatch(Event::Message(msg)), 1);

        assert_eq!(tpv.load(Ordering::SeqCst), 1);
        assert_eq!(sky.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn once_handlers_fire_a_single_time() {
        let dispatcher = Dispatcher::new();
        let (count, handler) = counter();
        dispatcher.once(DISCONNECTED, handler);

        dispatcher.dispatch(Event::Disconnected);
        dispatcher.dispatch(Event::Disconnected);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count(DISCONNECTED), 0);
    }

    #[test]
    fn off_removes_handler() {
        let dispatcher = Dispatcher::new();
        let (count, handler) = counter();
        let id = dispatcher.on(TIMEOUT, handler);

        assert!(dispatcher.off(id));
        assert!(!dispatcher.off(id));
        dispatcher.dispatch(Event::Timeout);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handlers_may_register_during_dispatch() {
        let dispatcher = Arc::new(Dispatcher::new());
        let inner = dispatcher.clone();
        dispatcher.on(CONNECTED, move |_| {
            inner.on(DISCONNECTED, |_| {});
        });

        dispatcher.dispatch(Event::Connected);
        assert_eq!(dispatcher.listener_count(DISCONNECTED), 1);
    }

    #[test]
    fn subscribers_receive_all_events_until_dropped() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.dispatch(Event::Connected);
        dispatcher.dispatch(Event::Raw("$GPGGA".into()));
        assert_eq!(rx.try_recv().unwrap(), Event::Connected);
        assert_eq!(rx.try_recv().unwrap(), Event::Raw("$GPGGA".into()));

        drop(rx);
        assert_eq!(dispatcher.dispatch(Event::Timeout), 0);
    }

    #[test]
    fn socket_events_carry_the_error() {
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let event = Event::Socket(err.into());
        assert_eq!(event.name(), ERROR_SOCKET);

        let Event::Socket(inner) = &event else {
            unreachable!()
        };
        assert_eq!(inner.kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(inner.to_string(), "pipe closed");
    }
}
