use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::Deserialize_repr;
use serde_with::skip_serializing_none;

/// * [gps_fix_t.mode](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L181)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize_repr)]
#[repr(i32)]
pub enum FixMode {
    #[default]
    NotSeen = 0,
    NoFix = 1,
    Fix2D = 2,
    Fix3D = 3,
}

/// * [gps_fix_t.status](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L192)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize_repr)]
#[repr(i32)]
pub enum FixStatus {
    Unknown = 0,
    Gps = 1,
    /// with DGPS
    DGps = 2,
    /// with RTK Fixed
    RTKFixed = 3,
    /// with RTK Float
    RTKFloat = 4,
    /// with dead reckoning
    DR = 5,
    /// with GNSS + dead reckoning
    GnssDR = 6,
    /// time only (surveyed in, manual)
    Time = 7,
    Simulated = 8,
    PpsFix = 9,
}

/// * [satellite.gnssid](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L2449)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize_repr)]
#[repr(u8)]
pub enum GnssId {
    Gps = 0,
    Sbas = 1,
    Gal = 2,
    Bd = 3,
    Imes = 4,
    Qzss = 5,
    Glo = 6,
    Irnss = 7,
}

bitflags::bitflags! {
    /// Kinds of data seen on a device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u32 {
        const SEEN_GPS = 0x01;
        const SEEN_RTCM2 = 0x02;
        const SEEN_RTCM3 = 0x04;
        const SEEN_AIS = 0x08;
    }
}

impl Serialize for PropertyFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for PropertyFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(PropertyFlags::from_bits_truncate(u32::deserialize(deserializer)?))
    }
}

/// One satellite of a SKY report
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Satellite {
    #[serde(rename = "PRN")]
    pub prn: i16,
    #[serde(rename = "az")]
    pub azimuth: Option<f64>,
    #[serde(rename = "el")]
    pub elevation: Option<f64>,
    pub gnssid: Option<GnssId>,
    /// Signal strength in dB-Hz
    pub ss: Option<f64>,
    #[serde(default)]
    pub used: bool,
}

/// # Device Information
/// - [json_device_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/shared_json.c#L28)
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Device {
    pub path: Option<String>,
    /// Sent as ISO 8601 text by current daemons, as Unix seconds by old ones
    #[serde(default, deserialize_with = "activation_time")]
    pub activated: Option<DateTime<Utc>>,
    pub flags: Option<PropertyFlags>,
    pub driver: Option<String>,
    pub subtype: Option<String>,
    pub native: Option<i32>,
    pub bps: Option<i32>,
    pub stopbits: Option<u32>,
    pub cycle: Option<f64>,
    pub mincycle: Option<f64>,
}

/// # Watch Policy
/// - [json_watch_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/shared_json.c#L95)
///
/// Fields serialize in declaration order; `json` leads so the unwatch
/// directive reads `{"class":"WATCH","json":true,"enable":false}`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Watch {
    pub json: Option<bool>,
    pub enable: Option<bool>,
    pub device: Option<String>,
    pub nmea: Option<bool>,
    pub pps: Option<bool>,
    pub raw: Option<i32>,
    pub scaled: Option<bool>,
    pub split24: Option<bool>,
    pub timing: Option<bool>,
    pub remote: Option<String>,
}

impl Watch {
    /// JSON reports on, NMEA off
    pub fn json_stream() -> Self {
        Watch {
            json: Some(true),
            nmea: Some(false),
            ..Default::default()
        }
    }

    /// Stream disabled
    pub fn disabled() -> Self {
        Watch {
            enable: Some(false),
            json: Some(true),
            ..Default::default()
        }
    }
}

fn activation_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(iso_time)) => Ok(DateTime::parse_from_rfc3339(&iso_time)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))),
        Some(serde_json::Value::Number(unix_time)) => Ok(unix_time.as_f64().and_then(|secs| {
            DateTime::<Utc>::from_timestamp(secs.trunc() as i64, (secs.fract() * 1e9) as u32)
        })),
        Some(_) => Err(serde::de::Error::custom(
            "Invalid type for 'activated' field",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_flags_serialize_as_bits() {
        let flags = PropertyFlags::SEEN_GPS | PropertyFlags::SEEN_AIS;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "9");

        let parsed: PropertyFlags = serde_json::from_str("255").unwrap();
        assert!(parsed.contains(PropertyFlags::all()));
    }

    #[test]
    fn device_activation_accepts_both_encodings() {
        let iso: Device =
            serde_json::from_str(r#"{"path":"/dev/ttyUSB0","activated":"2024-05-01T12:00:00.000Z"}"#)
                .unwrap();
        let unix: Device = serde_json::from_str(r#"{"activated":1714564800.0}"#).unwrap();

        assert!(iso.activated.is_some());
        assert_eq!(iso.activated, unix.activated);
        assert!(serde_json::from_str::<Device>(r#"{"activated":true}"#).is_err());
    }
}
