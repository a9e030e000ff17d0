//! GPSD JSON Protocol Version 3
//!
//! Version 3 is the protocol spoken by GPSD 3.x releases.
//!
//! - Commands start with '?' and end with ';'
//! - Responses are JSON objects with a "class" field indicating message type
//!
//! # References
//!
//! - [GPSD Protocol Documentation](https://gpsd.io/gpsd_json.html)

use crate::protocol::GpsdJsonResponse;

/// Request message types and builders
pub mod request;
/// Response message types
pub mod response;
/// Common data types used in protocol messages
pub mod types;

/// Protocol version 3 major version number
pub const API_VERSION_MAJOR: i32 = 3;

/// Lowest protocol minor version the typed messages were written against
pub const API_VERSION_MINOR: i32 = 15;

/// Type alias for version 3 response messages
pub type ResponseMessage = response::Message;
impl GpsdJsonResponse for ResponseMessage {}

/// Type alias for version 3 request messages
pub type RequestMessage = request::Message;
