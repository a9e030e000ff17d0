use serde::Serialize;

use super::types::{Device, Watch};
use crate::{Result, error::GpsdError, protocol::GpsdJsonRequest};

/// Commands understood by GPSD
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `?DEVICES;` list known devices
    Devices,
    /// `?WATCH;` query, or `?WATCH={...};` to change the watch policy
    Watch(Option<Watch>),
    /// `?DEVICE;` query, or `?DEVICE={...};` to configure a device
    Device(Option<Device>),
    /// `?POLL;` snapshot of the current fix
    Poll,
    /// `?VERSION;` daemon version
    Version,
}

impl Message {
    /// Watch directive enabling the JSON stream without NMEA
    pub fn watch() -> Self {
        Message::Watch(Some(Watch::json_stream()))
    }

    /// Watch directive disabling the stream
    pub fn unwatch() -> Self {
        Message::Watch(Some(Watch::disabled()))
    }
}

/// Prefixes a payload with its `class` so GPSD accepts it as an object of
/// that class.
#[derive(Serialize)]
struct Tagged<'a, T> {
    class: &'static str,
    #[serde(flatten)]
    inner: &'a T,
}

fn tagged<T: Serialize>(class: &'static str, inner: &T) -> Result<String> {
    serde_json::to_string(&Tagged { class, inner }).map_err(GpsdError::Json)
}

impl GpsdJsonRequest for Message {
    fn to_command(&self) -> Result<String> {
        let cmd = match self {
            Message::Devices => "?DEVICES;".into(),
            Message::Watch(Some(watch)) => format!("?WATCH={};", tagged("WATCH", watch)?),
            Message::Watch(None) => "?WATCH;".into(),
            Message::Device(Some(device)) => format!("?DEVICE={};", tagged("DEVICE", device)?),
            Message::Device(None) => "?DEVICE;".into(),
            Message::Poll => "?POLL;".into(),
            Message::Version => "?VERSION;".into(),
        };
        Ok(cmd)
    }
}

/// Builder for watch directives
///
/// ```
/// use gpsd_events::protocol::v3::request::WatchOptions;
///
/// let watch = WatchOptions::json().pps(true).device("/dev/ttyUSB0").build();
/// assert_eq!(watch.pps, Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatchOptions {
    inner: Watch,
}

impl WatchOptions {
    /// Structured JSON reports (TPV, SKY, ...)
    pub fn json() -> Self {
        WatchOptions {
            inner: Watch {
                enable: Some(true),
                json: Some(true),
                ..Default::default()
            },
        }
    }

    /// NMEA 0183 sentences, delivered as unparsed units
    pub fn nmea() -> Self {
        WatchOptions {
            inner: Watch {
                enable: Some(true),
                nmea: Some(true),
                ..Default::default()
            },
        }
    }

    /// Raw receiver data, hex dumped
    pub fn raw() -> Self {
        WatchOptions {
            inner: Watch {
                enable: Some(true),
                raw: Some(1),
                ..Default::default()
            },
        }
    }

    /// Restricts the stream to one device path
    pub fn device<S: AsRef<str>>(mut self, device: S) -> Self {
        self.inner.device = Some(device.as_ref().into());
        self
    }

    /// PPS timing reports
    pub fn pps(mut self, enable: bool) -> Self {
        self.inner.pps = Some(enable);
        self
    }

    /// Timing fields in reports
    pub fn timing(mut self, enable: bool) -> Self {
        self.inner.timing = Some(enable);
        self
    }

    /// Scaled output of AIS/sub-frame values
    pub fn scaled(mut self, enable: bool) -> Self {
        self.inner.scaled = Some(enable);
        self
    }

    /// Split AIS type 24 messages into parts A and B
    pub fn split24(mut self, enable: bool) -> Self {
        self.inner.split24 = Some(enable);
        self
    }

    /// Finished watch object
    pub fn build(self) -> Watch {
        self.inner
    }
}

impl From<WatchOptions> for Watch {
    fn from(opts: WatchOptions) -> Self {
        opts.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_watch_directive() {
        assert_eq!(
            Message::watch().to_command().unwrap(),
            r#"?WATCH={"class":"WATCH","json":true,"nmea":false};"#
        );
    }

    #[test]
    fn unwatch_directive() {
        assert_eq!(
            Message::unwatch().to_line().unwrap(),
            "?WATCH={\"class\":\"WATCH\",\"json\":true,\"enable\":false};\n"
        );
    }

    #[test]
    fn simple_commands() {
        assert_eq!(Message::Version.to_line().unwrap(), "?VERSION;\n");
        assert_eq!(Message::Devices.to_line().unwrap(), "?DEVICES;\n");
        assert_eq!(Message::Device(None).to_line().unwrap(), "?DEVICE;\n");
        assert_eq!(Message::Poll.to_command().unwrap(), "?POLL;");
        assert_eq!(Message::Watch(None).to_command().unwrap(), "?WATCH;");
    }

    #[test]
    fn custom_watch_keeps_only_set_fields() {
        let watch = WatchOptions::nmea().device("/dev/ttyACM0").build();
        assert_eq!(
            Message::Watch(Some(watch)).to_command().unwrap(),
            r#"?WATCH={"class":"WATCH","enable":true,"device":"/dev/ttyACM0","nmea":true};"#
        );
    }

    #[test]
    fn device_configuration_command() {
        let device = Device {
            path: Some("/dev/ttyUSB0".into()),
            bps: Some(9600),
            ..Default::default()
        };
        assert_eq!(
            Message::Device(Some(device)).to_command().unwrap(),
            r#"?DEVICE={"class":"DEVICE","path":"/dev/ttyUSB0","bps":9600};"#
        );
    }
}
