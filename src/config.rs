//! Client configuration
//!
//! [`ClientConfig`] is built in code with `with_*` methods, or converted
//! from [`ClientOptions`], which deserializes the option names GPSD client
//! libraries conventionally use (`hostname`, `autoReconnect`, ...).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gpsd_events::config::{ClientConfig, ClientOptions, ReconnectPolicy};
//!
//! let config = ClientConfig::default()
//!     .with_reconnect(ReconnectPolicy::fixed(Duration::from_secs(5)));
//! assert_eq!(config.port, 2947);
//!
//! let options: ClientOptions =
//!     serde_json::from_str(r#"{"hostname":"gps.local","reconnectInterval":2,"reconnectThreshold":10}"#)
//!         .unwrap();
//! let config = ClientConfig::try_from(options).unwrap();
//! assert!(matches!(config.reconnect, ReconnectPolicy::StalenessThreshold { .. }));
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::{Result, error::GpsdError, framing::DEFAULT_DELIMITER};

/// Default GPSD TCP port
pub const DEFAULT_PORT: u16 = 2947;

/// Default GPSD host
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// How the client recovers from a lost connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Never reconnect automatically
    #[default]
    None,
    /// After a close, retry every `interval` until a connect succeeds
    FixedInterval {
        /// Delay between attempts
        interval: Duration,
    },
    /// Every `interval`, force a reconnect if nothing was received for
    /// longer than `threshold`
    StalenessThreshold {
        /// Period of the staleness check
        interval: Duration,
        /// Tolerated silence from the daemon
        threshold: Duration,
    },
}

impl ReconnectPolicy {
    /// Fixed-interval retry policy
    pub fn fixed(interval: Duration) -> Self {
        ReconnectPolicy::FixedInterval { interval }
    }

    /// Staleness-threshold policy
    pub fn staleness(interval: Duration, threshold: Duration) -> Self {
        ReconnectPolicy::StalenessThreshold {
            interval,
            threshold,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ReconnectPolicy::None => Ok(()),
            ReconnectPolicy::FixedInterval { interval } if interval.is_zero() => Err(
                GpsdError::InvalidConfig("reconnect interval must be greater than zero"),
            ),
            ReconnectPolicy::StalenessThreshold { interval, .. } if interval.is_zero() => Err(
                GpsdError::InvalidConfig("reconnect interval must be greater than zero"),
            ),
            _ => Ok(()),
        }
    }
}

/// Handling of refused and reset connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransientErrorPolicy {
    /// Suppress while a reconnect policy is active, emit otherwise
    #[default]
    Auto,
    /// Always emit `error.connection`
    Emit,
    /// Never emit, only log
    Suppress,
}

/// Connection configuration, immutable once the client is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// GPSD host name or address
    pub host: String,
    /// GPSD TCP port
    pub port: u16,
    /// Parse units as JSON (otherwise emit them as `raw`)
    pub parse: bool,
    /// Reconnection policy
    pub reconnect: ReconnectPolicy,
    /// Refused/reset error handling
    pub transient_errors: TransientErrorPolicy,
    /// Emit `timeout` and end the connection after this much inactivity
    pub idle_timeout: Option<Duration>,
    /// Enable TCP keep-alive on connected sockets
    pub keep_alive: bool,
    /// Message delimiter
    pub delimiter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOSTNAME.into(),
            port: DEFAULT_PORT,
            parse: true,
            reconnect: ReconnectPolicy::None,
            transient_errors: TransientErrorPolicy::Auto,
            idle_timeout: None,
            keep_alive: true,
            delimiter: DEFAULT_DELIMITER.into(),
        }
    }
}

impl ClientConfig {
    /// Configuration for the given host and port, other settings default
    pub fn new<S: AsRef<str>>(host: S, port: u16) -> Self {
        ClientConfig {
            host: host.as_ref().into(),
            port,
            ..Default::default()
        }
    }

    /// Enables or disables JSON parsing of received units
    pub fn with_parse(mut self, parse: bool) -> Self {
        self.parse = parse;
        self
    }

    /// Sets the reconnection policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets how refused/reset connections are reported
    pub fn with_transient_errors(mut self, policy: TransientErrorPolicy) -> Self {
        self.transient_errors = policy;
        self
    }

    /// Sets the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Enables or disables TCP keep-alive
    pub fn with_keep_alive(mut self, enable: bool) -> Self {
        self.keep_alive = enable;
        self
    }

    /// Sets the message delimiter
    pub fn with_delimiter<S: AsRef<str>>(mut self, delimiter: S) -> Self {
        self.delimiter = delimiter.as_ref().into();
        self
    }

    /// Whether refused/reset connections are reported as events
    pub fn emits_transient_errors(&self) -> bool {
        match self.transient_errors {
            TransientErrorPolicy::Emit => true,
            TransientErrorPolicy::Suppress => false,
            TransientErrorPolicy::Auto => self.reconnect == ReconnectPolicy::None,
        }
    }

    /// Checks the configuration for values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(GpsdError::InvalidConfig("hostname must not be empty"));
        }
        if self.port == 0 {
            return Err(GpsdError::InvalidConfig("port must not be zero"));
        }
        if self.delimiter.is_empty() {
            return Err(GpsdError::InvalidConfig("delimiter must not be empty"));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(GpsdError::InvalidConfig("timeout must be greater than zero"));
        }
        self.reconnect.validate()
    }
}

/// Deserializable client options
///
/// Durations are given in seconds. `autoReconnect` selects the
/// fixed-interval policy, `reconnectInterval` with `reconnectThreshold`
/// the staleness policy; a value of zero leaves the policy disabled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientOptions {
    /// GPSD port, 2947 when absent
    pub port: Option<u16>,
    /// GPSD host, "localhost" when absent
    pub hostname: Option<String>,
    /// Parse messages, true when absent
    pub parse: Option<bool>,
    /// Fixed reconnect interval in seconds
    pub auto_reconnect: Option<f64>,
    /// Staleness check period in seconds
    pub reconnect_interval: Option<f64>,
    /// Staleness threshold in seconds
    pub reconnect_threshold: Option<f64>,
    /// Idle timeout in seconds
    pub timeout: Option<f64>,
}

impl TryFrom<ClientOptions> for ClientConfig {
    type Error = GpsdError;

    fn try_from(opts: ClientOptions) -> Result<Self> {
        let auto_reconnect = seconds(opts.auto_reconnect)?;
        let interval = seconds(opts.reconnect_interval)?;
        let threshold = seconds(opts.reconnect_threshold)?;

        let reconnect = match (auto_reconnect, interval, threshold) {
            (None, None, None) => ReconnectPolicy::None,
            (Some(interval), None, None) => ReconnectPolicy::fixed(interval),
            (None, Some(interval), Some(threshold)) => {
                ReconnectPolicy::staleness(interval, threshold)
            }
            (Some(_), _, _) => {
                return Err(GpsdError::InvalidConfig(
                    "autoReconnect cannot be combined with reconnectInterval/reconnectThreshold",
                ));
            }
            _ => {
                return Err(GpsdError::InvalidConfig(
                    "reconnectInterval and reconnectThreshold must be given together",
                ));
            }
        };

        let config = ClientConfig {
            host: opts.hostname.unwrap_or_else(|| DEFAULT_HOSTNAME.into()),
            port: opts.port.unwrap_or(DEFAULT_PORT),
            parse: opts.parse.unwrap_or(true),
            reconnect,
            idle_timeout: seconds(opts.timeout)?,
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }
}

/// Converts an optional seconds value; zero means "not set"
fn seconds(value: Option<f64>) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(secs) if secs == 0.0 => Ok(None),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|_| GpsdError::InvalidConfig("durations must be finite and positive")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<ClientConfig> {
        let opts: ClientOptions = serde_json::from_str(json).map_err(GpsdError::Json)?;
        ClientConfig::try_from(opts)
    }

    #[test]
    fn empty_options_use_defaults() {
        let config = parse("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 2947);
        assert!(config.parse);
        assert_eq!(config.reconnect, ReconnectPolicy::None);
    }

    #[test]
    fn auto_reconnect_selects_fixed_interval() {
        let config = parse(r#"{"autoReconnect": 1.5, "parse": false}"#).unwrap();
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::fixed(Duration::from_millis(1500))
        );
        assert!(!config.parse);
    }

    #[test]
    fn zero_auto_reconnect_disables_policy() {
        let config = parse(r#"{"autoReconnect": 0}"#).unwrap();
        assert_eq!(config.reconnect, ReconnectPolicy::None);
    }

    #[test]
    fn staleness_needs_both_values() {
        let config = parse(r#"{"reconnectInterval": 5, "reconnectThreshold": 30}"#).unwrap();
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::staleness(Duration::from_secs(5), Duration::from_secs(30))
        );

        assert!(matches!(
            parse(r#"{"reconnectInterval": 5}"#),
            Err(GpsdError::InvalidConfig(_))
        ));
    }

    #[test]
    fn both_reconnect_forms_are_rejected() {
        let err = parse(r#"{"autoReconnect": 1, "reconnectInterval": 5, "reconnectThreshold": 30}"#)
            .unwrap_err();
        assert!(matches!(err, GpsdError::InvalidConfig(_)));
    }

    #[test]
    fn negative_durations_are_rejected() {
        assert!(matches!(
            parse(r#"{"timeout": -1}"#),
            Err(GpsdError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_options_are_rejected() {
        assert!(matches!(parse(r#"{"host": "x"}"#), Err(GpsdError::Json(_))));
    }

    #[test]
    fn transient_errors_follow_policy_when_auto() {
        let plain = ClientConfig::default();
        assert!(plain.emits_transient_errors());

        let fixed = plain
            .clone()
            .with_reconnect(ReconnectPolicy::fixed(Duration::from_secs(1)));
        assert!(!fixed.emits_transient_errors());

        let forced = fixed.with_transient_errors(TransientErrorPolicy::Emit);
        assert!(forced.emits_transient_errors());
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let config =
            ClientConfig::default().with_reconnect(ReconnectPolicy::fixed(Duration::ZERO));
        assert!(config.validate().is_err());
        assert!(ClientConfig::new("", 2947).validate().is_err());
        assert!(ClientConfig::new("gps", 0).validate().is_err());
    }
}
