use std::env;

use crate::discovery::DeviceProfile;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub device: DeviceProfile,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

fn env_required(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{key} environment variable is required"))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = DeviceProfile::default();

        let config = Self {
            mqtt: MqttConfig {
                broker_host: env_required("MQTT_BROKER_HOST")?,
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                username: env_optional("MQTT_USERNAME"),
                password: env_optional("MQTT_PASSWORD"),
                client_id: env_or_default("MQTT_CLIENT_ID", "display-discovery".to_string()),
            },
            device: DeviceProfile {
                manufacturer: env_or_default("DISPLAY_MANUFACTURER", defaults.manufacturer),
                model: env_or_default("DISPLAY_MODEL", defaults.model),
                hw_version: env_or_default("DISPLAY_HW_VERSION", defaults.hw_version),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.mqtt.broker_host.is_empty() {
            return Err("MQTT_BROKER_HOST must not be empty".into());
        }
        if self.device.manufacturer.is_empty() {
            return Err("DISPLAY_MANUFACTURER must not be empty".into());
        }
        if self.device.model.is_empty() {
            return Err("DISPLAY_MODEL must not be empty".into());
        }
        Ok(())
    }
}
