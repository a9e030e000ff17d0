//! Classification of framed messages into dispatchable events
//!
//! A single framed line from GPSD normally holds one JSON object, but some
//! daemons glue objects together without a separator (`}{`). The router
//! splits such lines, parses each unit and turns it into an [`Event`]
//! keyed by the unit's `class` discriminator.

use serde::Serialize;

use crate::{Result, error::GpsdError, event::Event, protocol::GpsdJsonResponse};

/// Message carried by the `error` event for units that cannot be parsed
pub const BAD_MESSAGE_FORMAT: &str = "Bad message format";

/// A parsed protocol message
///
/// Routing only looks at `class`. The payload is kept as generic JSON so
/// classes unknown to this crate still reach their handlers intact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMessage {
    /// Value of the `class` discriminator
    pub class: String,
    /// The whole parsed object, `class` included
    pub payload: serde_json::Value,
}

impl ParsedMessage {
    /// Builds a message from a parsed JSON value
    ///
    /// Fails when the value has no string `class` field.
    pub fn from_value(payload: serde_json::Value) -> Result<Self> {
        let class = payload
            .get("class")
            .and_then(serde_json::Value::as_str)
            .ok_or(GpsdError::Protocol("missing class discriminator"))?
            .to_owned();

        Ok(ParsedMessage { class, payload })
    }

    /// Decodes the payload into a typed message
    ///
    /// # Example
    /// ```
    /// use gpsd_events::protocol::v3::ResponseMessage;
    /// use gpsd_events::router::ParsedMessage;
    ///
    /// let msg = ParsedMessage::from_value(serde_json::json!({
    ///     "class": "VERSION", "release": "3.25", "rev": "3.25",
    ///     "proto_major": 3, "proto_minor": 15
    /// })).unwrap();
    ///
    /// let typed: ResponseMessage = msg.decode().unwrap();
    /// assert!(matches!(typed, ResponseMessage::Version(_)));
    /// ```
    pub fn decode<T: GpsdJsonResponse>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(GpsdError::Json)
    }
}

/// Details of a unit that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadMessage {
    /// Always [`BAD_MESSAGE_FORMAT`]
    pub message: String,
    /// The offending unit, verbatim
    pub cause: String,
    /// Parser failure detail
    pub error: String,
}

impl BadMessage {
    fn new(cause: &str, error: impl ToString) -> Self {
        BadMessage {
            message: BAD_MESSAGE_FORMAT.to_owned(),
            cause: cause.to_owned(),
            error: error.to_string(),
        }
    }
}

/// Converts framed messages into events
#[derive(Debug, Clone, Copy)]
pub struct MessageRouter {
    parse: bool,
}

impl MessageRouter {
    /// Creates a router
    ///
    /// With `parse` disabled every unit is passed through as a `raw` event
    /// and no JSON parsing is attempted.
    pub fn new(parse: bool) -> Self {
        MessageRouter { parse }
    }

    /// Routes one framed message, returning its events in unit order
    ///
    /// A malformed unit produces an [`Event::BadMessage`] and never stops
    /// the remaining units from being routed.
    pub fn route(&self, message: &str) -> Vec<Event> {
        let normalized = message.replace("}{", "}\n{");

        normalized
            .split('\n')
            .map(|unit| unit.strip_suffix('\r').unwrap_or(unit))
            .filter(|unit| !unit.is_empty())
            .map(|unit| self.route_unit(unit))
            .collect()
    }

    fn route_unit(&self, unit: &str) -> Event {
        if !self.parse {
            return Event::Raw(unit.to_owned());
        }

        let parsed = serde_json::from_str::<serde_json::Value>(unit)
            .map_err(GpsdError::Json)
            .and_then(ParsedMessage::from_value);

        match parsed {
            Ok(msg) => {
                tracing::trace!(class = %msg.class, "routed message");
                Event::Message(msg)
            }
            Err(err) => {
                tracing::debug!(unit, error = %err, "dropping malformed unit");
                Event::BadMessage(BadMessage::new(unit, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(Event::name).collect()
    }

    #[test]
    fn concatenated_objects_are_split_in_order() {
        let router = MessageRouter::new(true);
        let events = router.route(r#"{"class":"A"}{"class":"B"}"#);
        assert_eq!(names(&events), vec!["A", "B"]);
    }

    #[test]
    fn malformed_unit_does_not_suppress_siblings() {
        let router = MessageRouter::new(true);
        let events = router.route("{\"class\":\"X\"\n{\"class\":\"Y\"}");
        assert_eq!(names(&events), vec!["error", "Y"]);

        let Event::BadMessage(bad) = &events[0] else {
            panic!("expected bad message, got {:?}", events[0]);
        };
        assert_eq!(bad.message, BAD_MESSAGE_FORMAT);
        assert_eq!(bad.cause, "{\"class\":\"X\"");
        assert!(!bad.error.is_empty());
    }

    #[test]
    fn raw_mode_passes_units_verbatim() {
        let router = MessageRouter::new(false);
        let events = router.route("$GPGGA,123519,4807.038,N{not json}{\"class\":\"TPV\"}");

        assert_eq!(
            events,
            vec![
                Event::Raw("$GPGGA,123519,4807.038,N{not json}".into()),
                Event::Raw("{\"class\":\"TPV\"}".into()),
            ]
        );
    }

    #[test]
    fn empty_units_and_carriage_returns_are_skipped() {
        let router = MessageRouter::new(true);
        let events = router.route("{\"class\":\"TPV\"}\r\n\r\n\n");
        assert_eq!(names(&events), vec!["TPV"]);

        assert!(router.route("").is_empty());
        assert!(MessageRouter::new(false).route("\r").is_empty());
    }

    #[test]
    fn missing_class_is_reported_as_bad_message() {
        let router = MessageRouter::new(true);
        let events = router.route("{\"mode\":3}\n[1,2]");
        assert_eq!(names(&events), vec!["error", "error"]);
    }

    #[test]
    fn payload_keeps_the_whole_object() {
        let router = MessageRouter::new(true);
        let events = router.route(r#"{"class":"TPV","mode":3,"lat":51.5}"#);

        let Event::Message(msg) = &events[0] else {
            panic!("expected message");
        };
        assert_eq!(msg.class, "TPV");
        assert_eq!(msg.payload["lat"], serde_json::json!(51.5));
    }
}
