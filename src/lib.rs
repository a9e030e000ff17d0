//! # gpsd-events
//!
//! An event-driven client for GPSD (GPS Service Daemon) and its JSON protocol.
//!
//! GPSD monitors GPS and AIS receivers and streams their reports as
//! newline-delimited JSON objects on TCP port 2947. This crate keeps a
//! persistent connection to the daemon, reassembles the byte stream into
//! messages, dispatches each message to the handlers registered for its
//! `class`, and recovers from connection loss according to a
//! [`config::ReconnectPolicy`].
//!
//! ## Components
//!
//! - [`framing::FrameBuffer`] turns an arbitrary byte stream into complete lines
//! - [`router::MessageRouter`] splits, parses and classifies each line
//! - [`client::lifecycle::Lifecycle`] is the connection state machine
//! - [`client::GpsdClient`] is the handle applications use
//!
//! ## Example
//!
//! ```no_run
//! use gpsd_events::{client::GpsdClient, config::ClientConfig, event::Event};
//! use gpsd_events::protocol::v3::ResponseMessage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GpsdClient::new(ClientConfig::default())?;
//!
//! client.on("TPV", |event: &Event| {
//!     if let Some(Ok(ResponseMessage::Tpv(tpv))) = event.message().map(|m| m.decode::<ResponseMessage>()) {
//!         println!("position: {:?}", tpv.position());
//!     }
//! });
//! client.on("error", |event: &Event| eprintln!("{event:?}"));
//!
//! client.connect().await?;
//! client.watch(None)?;
//! # Ok(())
//! # }
//! ```

use crate::error::GpsdError;

/// Client handle, connection state machine and transport
pub mod client;

/// Client configuration and reconnect policies
pub mod config;

/// Error types used throughout the library
pub mod error;

/// Events and their dispatch
pub mod event;

/// Delimiter-based message framing
pub mod framing;

/// Protocol definitions and message types for the GPSD JSON protocol
pub mod protocol;

/// Classification of framed messages into events
pub mod router;

/// Convenience type alias for Results with GpsdError
pub type Result<T> = core::result::Result<T, GpsdError>;
