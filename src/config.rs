//! # config — Bridge configuration from environment variables
//!
//! | Variable                | Default                 | Description                                  |
//! |-------------------------|-------------------------|----------------------------------------------|
//! | `BACKEND_URL`           | `http://localhost:5000` | Remote decision service                      |
//! | `BACKEND_API_KEY`       | *(empty)*               | Bearer token for the backend                 |
//! | `SYMBOL`                | `EURUSD`                | The one symbol this session trades           |
//! | `LOT_SIZE`              | `0.01`                  | Volume of every market order                 |
//! | `MAX_SPREAD`            | `20`                    | Max spread (points) to accept a signal       |
//! | `MAX_POSITIONS`         | `3`                     | Max open positions carrying our magic number |
//! | `SLIPPAGE_TOLERANCE`    | `0.0030`                | Max entry deviation from live price          |
//! | `BUFFER_CAPACITY`       | `500`                   | Tick batch capacity                          |
//! | `POLL_INTERVAL_MS`      | `500`                   | Signal poll period                           |
//! | `FLUSH_INTERVAL_SECS`   | `30`                    | Max age of a tick batch before upload        |
//! | `REQUEST_TIMEOUT_SECS`  | `5`                     | Timeout of every outbound HTTP call          |
//! | `TRADING_ENABLED`       | `true`                  | `false` = collect and report only            |
//! | `MAGIC_NUMBER`          | `420001`                | Strategy identifier attached to orders       |
//! | `ORDER_COMMENT`         | `SYNC`                  | Order comment prefix                         |
//! | `MT5_BASE_URL`          | `mock`                  | MT5 EA adapter, or `mock` for paper fills    |
//! | `BIND_ADDR`             | `0.0.0.0:3000`          | Where the EA pushes ticks / trade changes    |
//! | `BRIDGE_API_KEY`        | *(empty)*               | Required `X-API-Key` on ingress when set     |
//! | `HEALTH_RECHECK_SECS`   | `60`                    | Re-check period while not connected, 0 = off |
//! | `EVENT_QUEUE_CAPACITY`  | `1024`                  | Pending host events before ticks are dropped |
//! | `REPORT_QUEUE_CAPACITY` | `256`                   | Pending trade reports                        |

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{bail, Context};

use crate::engine::validator::RiskLimits;

/// Everything the bridge needs at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url:           String,
    pub backend_api_key:       String,
    pub symbol:                String,
    pub lot_size:              f64,
    pub risk:                  RiskLimits,
    pub buffer_capacity:       usize,
    pub poll_interval:         Duration,
    pub flush_interval:        Duration,
    pub request_timeout:       Duration,
    pub trading_enabled:       bool,
    pub magic:                 u64,
    pub order_comment:         String,
    /// `"mock"` selects the in-memory paper desk.
    pub mt5_base_url:          String,
    pub bind_addr:             SocketAddr,
    pub bridge_api_key:        String,
    /// `None` disables the periodic health re-check.
    pub health_recheck:        Option<Duration>,
    pub event_queue_capacity:  usize,
    pub report_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url:           "http://localhost:5000".to_string(),
            backend_api_key:       String::new(),
            symbol:                "EURUSD".to_string(),
            lot_size:              0.01,
            risk: RiskLimits {
                max_spread:         20.0,
                max_positions:      3,
                slippage_tolerance: 0.0030,
            },
            buffer_capacity:       500,
            poll_interval:         Duration::from_millis(500),
            flush_interval:        Duration::from_secs(30),
            request_timeout:       Duration::from_secs(5),
            trading_enabled:       true,
            magic:                 420001,
            order_comment:         "SYNC".to_string(),
            mt5_base_url:          "mock".to_string(),
            bind_addr:             SocketAddr::from(([0, 0, 0, 0], 3000)),
            bridge_api_key:        String::new(),
            health_recheck:        Some(Duration::from_secs(60)),
            event_queue_capacity:  1024,
            report_queue_capacity: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key → value source, falling back to
    /// [`Config::default`] for absent keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let env = Env(&lookup);
        let defaults = Self::default();

        let health_secs: u64 = env.parse("HEALTH_RECHECK_SECS", 60)?;

        let config = Self {
            backend_url:     env.string("BACKEND_URL", &defaults.backend_url)
                .trim_end_matches('/')
                .to_string(),
            backend_api_key: env.string("BACKEND_API_KEY", ""),
            symbol:          env.string("SYMBOL", &defaults.symbol),
            lot_size:        env.parse("LOT_SIZE", defaults.lot_size)?,
            risk: RiskLimits {
                max_spread:         env.parse("MAX_SPREAD", defaults.risk.max_spread)?,
                max_positions:      env.parse("MAX_POSITIONS", defaults.risk.max_positions)?,
                slippage_tolerance: env.parse("SLIPPAGE_TOLERANCE", defaults.risk.slippage_tolerance)?,
            },
            buffer_capacity: env.parse("BUFFER_CAPACITY", defaults.buffer_capacity)?,
            poll_interval:   Duration::from_millis(env.parse("POLL_INTERVAL_MS", 500)?),
            flush_interval:  Duration::from_secs(env.parse("FLUSH_INTERVAL_SECS", 30)?),
            request_timeout: Duration::from_secs(env.parse("REQUEST_TIMEOUT_SECS", 5)?),
            trading_enabled: env.flag("TRADING_ENABLED", true),
            magic:           env.parse("MAGIC_NUMBER", defaults.magic)?,
            order_comment:   env.string("ORDER_COMMENT", &defaults.order_comment),
            mt5_base_url:    env.string("MT5_BASE_URL", &defaults.mt5_base_url)
                .trim_end_matches('/')
                .to_string(),
            bind_addr:       env.parse("BIND_ADDR", defaults.bind_addr)?,
            bridge_api_key:  env.string("BRIDGE_API_KEY", ""),
            health_recheck:  (health_secs > 0).then(|| Duration::from_secs(health_secs)),
            event_queue_capacity:  env.parse("EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity)?,
            report_queue_capacity: env.parse("REPORT_QUEUE_CAPACITY", defaults.report_queue_capacity)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.symbol.is_empty() {
            bail!("SYMBOL must not be empty");
        }
        if self.buffer_capacity == 0 {
            bail!("BUFFER_CAPACITY must be greater than zero");
        }
        if self.poll_interval.is_zero() || self.flush_interval.is_zero() || self.request_timeout.is_zero() {
            bail!("POLL_INTERVAL_MS, FLUSH_INTERVAL_SECS and REQUEST_TIMEOUT_SECS must be non-zero");
        }
        if self.event_queue_capacity == 0 || self.report_queue_capacity == 0 {
            bail!("queue capacities must be greater than zero");
        }
        if !(self.lot_size > 0.0) {
            bail!("LOT_SIZE must be positive, got {}", self.lot_size);
        }
        Ok(())
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.0)(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{key} has an invalid value: '{raw}'")),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        (self.0)(key)
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config.buffer_capacity, 500);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.risk.max_positions, 3);
        assert!(config.trading_enabled);
        assert_eq!(config.mt5_base_url, "mock");
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("BACKEND_URL", "https://signals.example.com/"),
            ("SYMBOL", "GBPUSD"),
            ("MAX_SPREAD", "35.5"),
            ("TRADING_ENABLED", "false"),
            ("HEALTH_RECHECK_SECS", "0"),
            ("BIND_ADDR", "127.0.0.1:9000"),
        ])
        .unwrap();

        assert_eq!(config.backend_url, "https://signals.example.com");
        assert_eq!(config.symbol, "GBPUSD");
        assert_eq!(config.risk.max_spread, 35.5);
        assert!(!config.trading_enabled);
        assert_eq!(config.health_recheck, None);
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = load(&[("BUFFER_CAPACITY", "lots")]).unwrap_err();
        assert!(err.to_string().contains("BUFFER_CAPACITY"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(load(&[("BUFFER_CAPACITY", "0")]).is_err());
        assert!(load(&[("POLL_INTERVAL_MS", "0")]).is_err());
    }
}
