//! Process-level configuration read from the environment.

use std::time::Duration;

use leastcount_room::RoomConfig;

use crate::LeastCountError;

/// Listen address when neither `LEASTCOUNT_BIND` nor `PORT` is set.
pub const DEFAULT_BIND: &str = "0.0.0.0:3001";

/// A connection that sends nothing for this long is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Server settings that aren't part of any one room.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// `None` keeps quiet connections open forever.
    pub idle_timeout: Option<Duration>,

    pub rooms: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            rooms: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the process environment.
    ///
    /// - `LEASTCOUNT_BIND`: full listen address, wins over `PORT`.
    /// - `PORT`: port on `0.0.0.0`.
    /// - `LEASTCOUNT_SWEEP_SECS`: stale-room sweep period.
    /// - `LEASTCOUNT_IDLE_TIMEOUT_SECS`: `0` disables the idle timeout.
    pub fn from_env() -> Result<Self, LeastCountError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LeastCountError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("LEASTCOUNT_BIND") {
            config.bind_addr = addr;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = parse("PORT", &port)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(secs) = lookup("LEASTCOUNT_SWEEP_SECS") {
            let secs: u64 = parse("LEASTCOUNT_SWEEP_SECS", &secs)?;
            if secs == 0 {
                return Err(LeastCountError::Config(
                    "LEASTCOUNT_SWEEP_SECS must be positive".into(),
                ));
            }
            config.rooms.sweep.interval = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("LEASTCOUNT_IDLE_TIMEOUT_SECS") {
            let secs: u64 = parse("LEASTCOUNT_IDLE_TIMEOUT_SECS", &secs)?;
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, LeastCountError> {
    raw.trim()
        .parse()
        .map_err(|_| LeastCountError::Config(format!("{key}={raw:?} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND);
        assert_eq!(config.idle_timeout, Some(DEFAULT_IDLE_TIMEOUT));
        assert_eq!(config.rooms.sweep.interval, Duration::from_secs(600));
    }

    #[test]
    fn test_from_lookup_port_binds_all_interfaces() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_from_lookup_bind_wins_over_port() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("LEASTCOUNT_BIND", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_from_lookup_sweep_and_idle_timeout() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("LEASTCOUNT_SWEEP_SECS", "30"),
            ("LEASTCOUNT_IDLE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.rooms.sweep.interval, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_from_lookup_bad_number_is_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, LeastCountError::Config(_)));
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_from_lookup_zero_sweep_is_error() {
        let err =
            ServerConfig::from_lookup(lookup(&[("LEASTCOUNT_SWEEP_SECS", "0")])).unwrap_err();
        assert!(matches!(err, LeastCountError::Config(_)));
    }
}
