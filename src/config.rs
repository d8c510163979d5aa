//! Gateway configuration with environment overrides

use crate::retry::RetryPolicy;
use std::env;
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the inbound sensor listener binds to
    pub listen_addr: String,
    /// Per-frame read deadline; exceeding it ends the session
    pub read_timeout: Duration,
    /// Owner identity bound to each inbound session
    pub owner: String,
    /// Stream broker configuration
    pub broker: BrokerConfig,
    /// Actuator device configuration
    pub device: DeviceConfig,
    /// External settings service configuration
    pub settings_api: SettingsApiConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9000".into(),
            read_timeout: Duration::from_secs(30),
            owner: "alice".into(),
            broker: BrokerConfig::default(),
            device: DeviceConfig::default(),
            settings_api: SettingsApiConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(addr) = env::var("GATEWAY_LISTEN_ADDR") {
            cfg.listen_addr = addr;
        }
        if let Some(secs) = env_u64("GATEWAY_READ_TIMEOUT_SECS") {
            cfg.read_timeout = Duration::from_secs(secs);
        }
        if let Ok(owner) = env::var("GATEWAY_OWNER") {
            cfg.owner = owner;
        }
        if let Ok(url) = env::var("NATS_URL") {
            cfg.broker.url = url;
        }

        // Device address comes as host/port pair for firmware parity
        let host = env::var("DEVICE_HOST").ok();
        let port = env_u64("DEVICE_PORT");
        if host.is_some() || port.is_some() {
            cfg.device.address = format!(
                "{}:{}",
                host.unwrap_or_else(|| "127.0.0.1".into()),
                port.unwrap_or(1234)
            );
        }

        if let Ok(base) = env::var("API_BASE_URL") {
            cfg.settings_api.base_url = base;
        }

        cfg
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Stream broker (NATS JetStream) configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker URL
    pub url: String,
    /// Stream name to provision
    pub stream: String,
    /// Subject readings are published on
    pub subject: String,
    /// Stream retention window
    pub max_age: Duration,
    /// Per-attempt connect timeout
    pub connect_timeout: Duration,
    /// Bootstrap retry policy
    pub retry: RetryPolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".into(),
            stream: "SENSOR_READINGS".into(),
            subject: "SENSOR_READINGS".into(),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            connect_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Actuator device connection configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device host:port
    pub address: String,
    /// Connect timeout for fresh connections
    pub connect_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:1234".into(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// External settings service (read-only HTTP boundary)
#[derive(Debug, Clone)]
pub struct SettingsApiConfig {
    /// Base URL of the settings service
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for SettingsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api_service:80".into(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sets variables for one test and restores the previous values on
    /// drop, even when the test panics
    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            let saved = vars.iter().map(|(key, _)| (*key, env::var(key).ok())).collect();
            for (key, value) in vars {
                env::set_var(key, value);
            }
            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.read_timeout, Duration::from_secs(30));
        assert_eq!(cfg.broker.stream, "SENSOR_READINGS");
        assert_eq!(cfg.broker.max_age, Duration::from_secs(604_800));
        assert_eq!(cfg.device.address, "127.0.0.1:1234");
        assert_eq!(cfg.broker.retry.max_attempts, 5);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::set(&[
            ("GATEWAY_LISTEN_ADDR", "0.0.0.0:9100"),
            ("GATEWAY_OWNER", "bob"),
            ("DEVICE_HOST", "10.0.0.7"),
            ("DEVICE_PORT", "4321"),
            ("NATS_URL", "nats://broker:4222"),
        ]);

        let cfg = GatewayConfig::from_env();
        assert_eq!(cfg.listen_addr, "0.0.0.0:9100");
        assert_eq!(cfg.owner, "bob");
        assert_eq!(cfg.device.address, "10.0.0.7:4321");
        assert_eq!(cfg.broker.url, "nats://broker:4222");
    }
}
