//! GPSD JSON protocol encoding
//!
//! Requests are short ASCII commands (`?VERSION;`, `?WATCH={...};`) written
//! one per line. Responses are JSON objects identified by their `class`
//! field; routing only needs that field, while [`v3`] offers typed views of
//! the common message classes.

use crate::Result;

pub mod v3;

/// A message decodable from a GPSD response payload
pub trait GpsdJsonResponse: serde::de::DeserializeOwned {}

/// A request that can be written to GPSD
pub trait GpsdJsonRequest {
    /// Command text without the line terminator
    fn to_command(&self) -> Result<String>;

    /// Command text as written on the wire, newline terminated
    fn to_line(&self) -> Result<String> {
        let mut line = self.to_command()?;
        line.push('\n');
        Ok(line)
    }
}
