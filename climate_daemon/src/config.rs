use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use climate_core::dispatch::command_endpoint;
use climate_core::{
    ClimateError, ClimateResult, Location, ReadSettings, RelaySettings, Schedule, SensorKind,
};
use std::time::Duration;

/// Every option can be given as a flag or through the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "climate_daemon")]
#[command(about = "Reads a DHT11/DHT22 sensor on a schedule and reports to the damage-report API")]
#[command(version)]
#[command(args_override_self = true)]
#[command(
    after_help = "Cron patterns have 5 fields; prepend a column for seconds granularity, e.g. every 13th second: \"13 * * * * *\""
)]
pub struct Config {
    /// Sensor model: 11 for DHT11, 22 for DHT22/AM2302
    #[arg(long = "type", env = "TYPE", value_name = "11|22")]
    pub kind: SensorKind,

    /// GPIO pin (BCM numbering) the sensor is connected to
    #[arg(long, env = "PIN")]
    pub pin: u8,

    /// Base URL of the damage-report API
    #[arg(long, env = "API_URL")]
    pub api_url: String,

    /// ID of the location of the sensor
    #[arg(long, env = "LOCATION_ID")]
    pub location_id: String,

    /// Name of the location; defaults to the location ID
    #[arg(long, env = "LOCATION_NAME")]
    pub location_name: Option<String>,

    /// Time (ms) to wait for the sensor before giving up on a read
    #[arg(long, env = "TIMEOUT", default_value_t = 5000)]
    pub timeout: u64,

    /// Cron pattern describing when to read
    #[arg(long, env = "CRON_PATTERN", default_value = "* * * * *")]
    pub cron_pattern: String,

    /// Fixed cadence in ms; overrides the cron pattern
    #[arg(long, env = "INTERVAL")]
    pub interval: Option<u64>,

    /// GPIO pin driving the relay that powers the sensor
    #[arg(long, env = "RELAY_PIN")]
    pub relay_pin: Option<u8>,

    /// Time (ms) the sensor is kept unpowered during a reset
    #[arg(long, env = "RELAY_RESET_TIME", default_value_t = 5000)]
    pub relay_reset_time: u64,

    /// Consecutive failed cycles that trigger a relay reset
    #[arg(long, env = "RELAY_RESET_THRESHOLD", default_value_t = 3)]
    pub relay_reset_threshold: u32,

    /// Request timeout (ms) for the API call
    #[arg(long, env = "HTTP_TIMEOUT", default_value_t = 10000)]
    pub http_timeout: u64,

    /// Skip the sensor and send random data instead
    #[arg(long, env = "SIMULATE", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub simulate: bool,

    /// loggly.com subdomain; logs go to stdout only unless the token is set too
    #[arg(long, env = "LOGGLY_SUBDOMAIN")]
    pub loggly_subdomain: Option<String>,

    /// loggly.com customer token
    #[arg(long, env = "LOGGLY_TOKEN", hide_env_values = true)]
    pub loggly_token: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub log_json: bool,
}

/// Loggly credentials, present only when both parts are non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogglySettings {
    pub subdomain: String,
    pub token: String,
}

impl Config {
    /// Checks clap cannot express; every failure is a configuration error
    pub fn validate(&self) -> ClimateResult<()> {
        command_endpoint(&self.api_url)?;

        if self.location_id.trim().is_empty() {
            return Err(ClimateError::config("LOCATION_ID must not be empty"));
        }
        if self.timeout == 0 {
            return Err(ClimateError::config("TIMEOUT must be greater than zero"));
        }
        if self.http_timeout == 0 {
            return Err(ClimateError::config("HTTP_TIMEOUT must be greater than zero"));
        }
        if let Some(relay_pin) = self.relay_pin {
            if relay_pin == self.pin {
                return Err(ClimateError::config(format!(
                    "RELAY_PIN must differ from PIN (both are {})",
                    relay_pin
                )));
            }
            if self.relay_reset_time == 0 {
                return Err(ClimateError::config(
                    "RELAY_RESET_TIME must be greater than zero",
                ));
            }
        }
        if self.relay_reset_threshold == 0 {
            return Err(ClimateError::config(
                "RELAY_RESET_THRESHOLD must be at least 1",
            ));
        }

        self.schedule().map(|_| ())
    }

    pub fn schedule(&self) -> ClimateResult<Schedule> {
        match self.interval {
            Some(ms) => Schedule::interval(Duration::from_millis(ms)),
            None => Schedule::parse_cron(&self.cron_pattern),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.location_id.trim(), self.location_name.clone())
    }

    pub fn read_settings(&self) -> ReadSettings {
        ReadSettings {
            kind: self.kind,
            pin: self.pin,
            timeout: Duration::from_millis(self.timeout),
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            reset_time: Duration::from_millis(self.relay_reset_time),
            threshold: self.relay_reset_threshold,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout)
    }

    pub fn loggly(&self) -> Option<LogglySettings> {
        let subdomain = self.loggly_subdomain.as_deref().map(str::trim).unwrap_or("");
        let token = self.loggly_token.as_deref().map(str::trim).unwrap_or("");
        if subdomain.is_empty() || token.is_empty() {
            return None;
        }
        Some(LogglySettings {
            subdomain: subdomain.to_string(),
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Config, clap::Error> {
        let mut args = vec![
            "climate_daemon",
            "--type",
            "22",
            "--pin",
            "4",
            "--api-url",
            "http://api.local:3000",
            "--location-id",
            "cellar",
        ];
        args.extend_from_slice(extra);
        Config::try_parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        config.validate().unwrap();

        assert_eq!(config.kind, SensorKind::Dht22);
        assert_eq!(config.read_settings().timeout, Duration::from_millis(5000));
        assert_eq!(config.relay_settings(), RelaySettings::default());
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.location().name, "cellar");
        assert!(matches!(config.schedule().unwrap(), Schedule::Cron { .. }));
        assert!(config.loggly().is_none());
    }

    #[test]
    fn test_missing_required_fails() {
        let err = Config::try_parse_from(["climate_daemon", "--pin", "4"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_rejects_unknown_sensor_type() {
        assert!(parse(&["--type", "33"]).is_err());
    }

    #[test]
    fn test_interval_overrides_cron() {
        let config = parse(&["--interval", "1500", "--cron-pattern", "not a cron"]).unwrap();
        config.validate().unwrap();
        assert!(matches!(
            config.schedule().unwrap(),
            Schedule::Interval(period) if period == Duration::from_millis(1500)
        ));
    }

    #[test]
    fn test_validation_errors() {
        let cases: &[&[&str]] = &[
            &["--api-url", "ftp://api.local"],
            &["--timeout", "0"],
            &["--http-timeout", "0"],
            &["--interval", "0"],
            &["--relay-pin", "4"],
            &["--relay-reset-threshold", "0"],
            &["--cron-pattern", "* * *"],
        ];
        for extra in cases {
            let config = parse(extra).unwrap();
            assert!(
                matches!(config.validate(), Err(ClimateError::Config(_))),
                "{:?} should be rejected",
                extra
            );
        }
    }

    #[test]
    fn test_simulate_flag() {
        assert!(parse(&["--simulate"]).unwrap().simulate);
        assert!(!parse(&[]).unwrap().simulate);
    }

    #[test]
    fn test_loggly_needs_both_parts() {
        let config = parse(&["--loggly-subdomain", "acme"]).unwrap();
        assert!(config.loggly().is_none());

        let config = parse(&["--loggly-subdomain", "acme", "--loggly-token", "abc"]).unwrap();
        assert_eq!(
            config.loggly(),
            Some(LogglySettings {
                subdomain: "acme".into(),
                token: "abc".into()
            })
        );
    }
}
