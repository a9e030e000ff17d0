//! Typed views of GPSD v3 response messages
//!
//! Messages are identified by their "class" field. Only the classes most
//! clients act on are modelled; any other class decodes to
//! [`Message::Other`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{API_VERSION_MAJOR, API_VERSION_MINOR, types::*};

/// Time-Position-Velocity (TPV) report
///
/// Reference: [json_tpv_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L34)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tpv {
    /// Device path that provided this data
    pub device: Option<String>,
    /// GPS fix mode (NoFix, 2D, 3D)
    #[serde(default)]
    pub mode: FixMode,
    /// GPS fix status (standard, DGPS, RTK, etc.)
    pub status: Option<FixStatus>,
    /// GPS time of fix
    pub time: Option<DateTime<Utc>>,
    /// Latitude in degrees (positive = North)
    pub lat: Option<f64>,
    /// Longitude in degrees (positive = East)
    pub lon: Option<f64>,
    /// Altitude, height above ellipsoid, in meters
    #[serde(rename = "altHAE")]
    pub alt_hae: Option<f64>,
    /// Altitude, MSL (mean sea level) in meters
    #[serde(rename = "altMSL")]
    pub alt_msl: Option<f64>,
    /// Speed over ground in meters/second
    pub speed: Option<f64>,
    /// True track (course over ground) in degrees
    pub track: Option<f64>,
    /// Climb/sink rate in meters per second
    pub climb: Option<f64>,
    /// Estimated horizontal position error in meters
    pub eph: Option<f64>,
    /// Estimated vertical error in meters
    pub epv: Option<f64>,
    /// Estimated time error in seconds
    pub ept: Option<f64>,
    /// Current leap seconds (GPS-UTC offset)
    pub leapseconds: Option<i32>,
    #[cfg(feature = "extra-fields")]
    /// Additional fields not explicitly defined
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

impl Tpv {
    /// Latitude and longitude when the fix carries both
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

/// Satellite Sky View (SKY) report
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sky {
    /// Device path that provided this data
    pub device: Option<String>,
    /// GPS time of this sky view
    pub time: Option<DateTime<Utc>>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Position dilution of precision
    pub pdop: Option<f64>,
    /// Number of satellites visible
    #[serde(rename = "nSat")]
    pub n_sat: Option<i32>,
    /// Number of satellites used in navigation solution
    #[serde(rename = "uSat")]
    pub u_sat: Option<i32>,
    /// Visible satellites
    #[serde(default)]
    pub satellites: Vec<Satellite>,
}

/// GPSD daemon version information
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Version {
    /// GPSD release version string
    pub release: String,
    /// Git revision hash
    pub rev: String,
    /// Protocol major version number
    pub proto_major: i32,
    /// Protocol minor version number
    pub proto_minor: i32,
    /// Remote server URL (if applicable)
    pub remote: Option<String>,
}

impl Version {
    /// Whether the typed messages of this module match the daemon's protocol
    pub fn is_supported(&self) -> bool {
        self.proto_major == API_VERSION_MAJOR && self.proto_minor >= API_VERSION_MINOR
    }
}

/// List of GPS devices known to GPSD
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Error notification from GPSD
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Error {
    /// Error message text
    pub message: String,
}

/// - [libgps_json_unpack](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c#L792)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "class", rename_all = "UPPERCASE")]
/// GPSD response message types
pub enum Message {
    /// Time-Position-Velocity report
    Tpv(Tpv),
    /// Satellite sky view report
    Sky(Sky),
    /// List of available GPS devices
    Devices(DeviceList),
    /// Single GPS device information
    Device(Device),
    /// Current watch settings
    Watch(Watch),
    /// GPSD version information
    Version(Version),
    /// Error message from GPSD
    Error(Error),
    /// Any class not modelled here
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tpv_report() {
        let msg: Message = serde_json::from_str(
            r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2024-05-01T12:00:00.000Z","lat":35.68,"lon":139.76,"altHAE":40.1,"speed":0.1}"#,
        )
        .unwrap();

        let Message::Tpv(tpv) = msg else {
            panic!("expected TPV");
        };
        assert_eq!(tpv.mode, FixMode::Fix3D);
        assert_eq!(tpv.position(), Some((35.68, 139.76)));
        assert!(tpv.time.is_some());
    }

    #[test]
    fn sky_report() {
        let msg: Message = serde_json::from_str(
            r#"{"class":"SKY","hdop":0.9,"satellites":[{"PRN":5,"el":45.0,"az":120.0,"ss":38.0,"used":true},{"PRN":12,"used":false}]}"#,
        )
        .unwrap();

        let Message::Sky(sky) = msg else {
            panic!("expected SKY");
        };
        assert_eq!(sky.satellites.len(), 2);
        assert_eq!(sky.satellites.iter().filter(|s| s.used).count(), 1);
    }

    #[test]
    fn version_compatibility() {
        let msg: Message = serde_json::from_str(
            r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#,
        )
        .unwrap();
        let Message::Version(version) = msg else {
            panic!("expected VERSION");
        };
        assert!(version.is_supported());
    }

    #[test]
    fn unknown_class_is_other() {
        let msg: Message = serde_json::from_str(r#"{"class":"AIS","type":1}"#).unwrap();
        assert_eq!(msg, Message::Other);
    }
}
