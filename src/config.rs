use crate::channel::{DEFAULT_HANDSHAKE_TIMEOUT, RECONNECT_DELAY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether state changes are computed locally or only reflected from the
/// remote controller. One model, two configurations; selected at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    Local,
    #[default]
    Remote,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub auto_restart: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 10_000,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64,
            reconnect_delay_ms: RECONNECT_DELAY.as_millis() as u64,
            auto_restart: true,
        }
    }
}

impl Connection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub home_label: String,
    pub away_label: String,
}

impl Default for Teams {
    fn default() -> Self {
        Self {
            home_label: "Home".to_string(),
            away_label: "Away".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub authority: Authority,
    pub connection: Connection,
    pub teams: Teams,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ser_connection() {
        let c: Connection = Default::default();
        let serialized = toml::to_string(&c).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(c));
    }

    #[test]
    fn test_default_timing_matches_channel() {
        let c = Connection::default();
        assert_eq!(c.handshake_timeout(), DEFAULT_HANDSHAKE_TIMEOUT);
        assert_eq!(c.reconnect_delay(), RECONNECT_DELAY);
    }

    #[test]
    fn test_ser_teams() {
        let t: Teams = Default::default();
        let serialized = toml::to_string(&t).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(t));
    }

    #[test]
    fn test_ser_config() {
        let config: Config = Default::default();
        let serialized = toml::to_string(&config).unwrap();
        let deser = toml::from_str(&serialized);
        assert_eq!(deser, Ok(config));
    }
}
