//! Turns a display's LWT message into Home Assistant discovery configs.
//!
//! Pure and synchronous: no I/O, no state between calls. The caller supplies the
//! current time so that everything except `last_seen` is reproducible.

pub mod builder;
pub mod firmware;
pub mod payload;
pub mod topic;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, debug, error, warn};

use builder::{DebugEcho, SensorConfig};
use payload::LwtPayload;

/// Reasons an LWT message produces no output. None of them are fatal.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid topic format: {0}")]
    InvalidTopicShape(String),

    #[error("Empty payload received")]
    EmptyPayload,

    #[error("Failed to parse LWT JSON: {0}")]
    PayloadParse(String),
}

impl DiscoveryError {
    pub fn severity(&self) -> Level {
        match self {
            DiscoveryError::InvalidTopicShape(_) | DiscoveryError::EmptyPayload => Level::WARN,
            DiscoveryError::PayloadParse(_) => Level::ERROR,
        }
    }
}

/// Static part of the device descriptor shared by every display.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub manufacturer: String,
    pub model: String,
    pub hw_version: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            manufacturer: "VA7RCV".to_string(),
            model: "E-Paper Display ESP32".to_string(),
            hw_version: "v1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundPayload {
    Discovery(SensorConfig),
    Debug(DebugEcho),
}

/// A message ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: OutboundPayload,
    pub retain: bool,
}

impl OutboundMessage {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.payload)
    }
}

/// Run one LWT message through validation, parsing and the builder.
pub fn process(
    topic: &str,
    payload: &LwtPayload,
    now: DateTime<Utc>,
    profile: &DeviceProfile,
) -> Result<Vec<OutboundMessage>, DiscoveryError> {
    let device_name = topic::parse_lwt_topic(topic)
        .ok_or_else(|| DiscoveryError::InvalidTopicShape(topic.to_string()))?;
    let lwt = payload::parse_lwt_payload(payload)?;

    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let fw_version = firmware::decode_firmware_version(
        lwt.firmware_version.as_ref().and_then(firmware::firmware_number),
    );

    debug!(
        "Building discovery batch for {} (firmware {}, battery {:?})",
        device_name, fw_version, lwt.battery_percentage
    );

    Ok(builder::build_messages(
        device_name,
        &lwt,
        &fw_version,
        &timestamp,
        profile,
    ))
}

/// Like [`process`], but failures are logged at their severity and turn into an
/// empty batch.
pub fn handle_lwt(
    topic: &str,
    payload: &LwtPayload,
    now: DateTime<Utc>,
    profile: &DeviceProfile,
) -> Vec<OutboundMessage> {
    match process(topic, payload, now, profile) {
        Ok(messages) => messages,
        Err(e) => {
            if e.severity() == Level::ERROR {
                error!("{}", e);
            } else {
                warn!("{}", e);
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use minijinja::{Environment, context};
    use serde_json::{Value, json};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 8, 30, 0).unwrap()
    }

    fn run(topic: &str, payload: LwtPayload) -> Result<Vec<OutboundMessage>, DiscoveryError> {
        process(topic, &payload, now(), &DeviceProfile::default())
    }

    fn template_of(msg: &OutboundMessage) -> &str {
        match &msg.payload {
            OutboundPayload::Discovery(config) => &config.value_template,
            OutboundPayload::Debug(_) => panic!("debug echo has no template"),
        }
    }

    fn availability_of(msg: &OutboundMessage) -> &str {
        match &msg.payload {
            OutboundPayload::Discovery(config) => &config.availability.value_template,
            OutboundPayload::Debug(_) => panic!("debug echo has no availability"),
        }
    }

    fn render(template: &str, value_json: Value) -> String {
        let env = Environment::new();
        env.render_str(template, context! { value_json => value_json })
            .unwrap()
    }

    #[test]
    fn test_porch_display_end_to_end() {
        let messages = run(
            "displays/porch-display/lwt",
            LwtPayload::from(r#"{"battery_percentage":87,"firmware_version":123}"#),
        )
        .unwrap();

        assert_eq!(messages.len(), 10);
        match &messages[0].payload {
            OutboundPayload::Discovery(config) => {
                assert_eq!(config.unique_id, "porch-display_battery_percentage");
                assert_eq!(config.device.sw_version, "v1.2.3");
            }
            OutboundPayload::Debug(_) => panic!("first message should be a discovery config"),
        }
        assert_eq!(messages[9].topic, "displays/debug/porch-display/log");

        let state = json!({"battery_percentage": 87, "firmware_version": 123});
        assert_eq!(render(template_of(&messages[6]), state), "v1.2.3");
    }

    #[test]
    fn test_firmware_template_matches_decoder() {
        let messages = run("displays/a/lwt", LwtPayload::from("{}")).unwrap();
        let template = template_of(&messages[6]);
        for raw in [0_i64, 100, 235, 999, 1203] {
            assert_eq!(
                render(template, json!({ "firmware_version": raw })),
                firmware::decode_firmware_version(Some(raw)),
                "firmware {raw}"
            );
        }
    }

    #[test]
    fn test_availability_rule() {
        let messages = run("displays/a/lwt", LwtPayload::from("{}")).unwrap();
        let template = availability_of(&messages[0]);
        assert_eq!(render(template, json!({"battery_percentage": 42})), "online");
        assert_eq!(render(template, json!({})), "offline");
    }

    #[test]
    fn test_field_templates_render_state() {
        let messages = run("displays/a/lwt", LwtPayload::from("{}")).unwrap();
        let state = json!({
            "battery_percentage": 55,
            "battery_voltage": 3.7,
            "battery_sensor_present": true,
            "rssi": -70
        });
        assert_eq!(render(template_of(&messages[0]), state.clone()), "55");
        assert_eq!(render(template_of(&messages[1]), state.clone()), "3.7");
        assert_eq!(render(template_of(&messages[3]), state.clone()), "ON");
        assert_eq!(render(template_of(&messages[4]), state), "-70");
        assert_eq!(render(template_of(&messages[3]), json!({})), "OFF");
    }

    #[test]
    fn test_object_id_shared_across_sensors() {
        let messages = run("displays/living-room-2/lwt", LwtPayload::from("{}")).unwrap();
        let ids: Vec<&str> = messages[..9]
            .iter()
            .map(|m| match &m.payload {
                OutboundPayload::Discovery(config) => config.object_id.as_str(),
                OutboundPayload::Debug(_) => panic!("unexpected debug echo"),
            })
            .collect();
        assert!(ids.iter().all(|id| *id == "living_room_2"));
    }

    #[test]
    fn test_last_seen_uses_injected_clock() {
        let messages = run("displays/a/lwt", LwtPayload::from("{}")).unwrap();
        assert_eq!(template_of(&messages[8]), "2026-10-15T08:30:00.000Z");
        match &messages[9].payload {
            OutboundPayload::Debug(echo) => {
                assert_eq!(echo.last_seen, "2026-10-15T08:30:00.000Z");
                assert_eq!(echo.firmware_version_parsed, "v0.0.0");
            }
            OutboundPayload::Discovery(_) => panic!("last message should be the debug echo"),
        }
    }

    #[test]
    fn test_structured_payload() {
        let payload = LwtPayload::from(json!({"battery_percentage": 10, "free_heap": 20480}));
        let messages = run("displays/hall/lwt", payload).unwrap();
        assert_eq!(messages.len(), 10);
    }

    #[test]
    fn test_non_object_json_still_announces() {
        for text in ["42", "[1,2]", "\"hi\"", "true"] {
            let messages = run("displays/hall/lwt", LwtPayload::from(text)).unwrap();
            assert_eq!(messages.len(), 10, "payload {text}");
            match &messages[9].payload {
                OutboundPayload::Debug(echo) => {
                    assert_eq!(echo.battery_percentage, None);
                    assert_eq!(echo.firmware_version_parsed, "v0.0.0");
                }
                OutboundPayload::Discovery(_) => panic!("last message should be the debug echo"),
            }
        }
    }

    #[test]
    fn test_mistyped_fields_echoed_and_firmware_coerced() {
        let messages = run(
            "displays/a/lwt",
            LwtPayload::from(r#"{"battery_percentage":"87","firmware_version":"123","rssi":"-70"}"#),
        )
        .unwrap();
        match &messages[0].payload {
            OutboundPayload::Discovery(config) => assert_eq!(config.device.sw_version, "v1.2.3"),
            OutboundPayload::Debug(_) => panic!("first message should be a discovery config"),
        }
        let echo = serde_json::to_value(&messages[9].payload).unwrap();
        assert_eq!(echo["battery_percentage"], json!("87"));
        assert_eq!(echo["firmware_version"], json!("123"));
        assert_eq!(echo["rssi"], json!("-70"));
        assert_eq!(echo["firmware_version_parsed"], json!("v1.2.3"));
    }

    #[test]
    fn test_invalid_topics() {
        for topic in ["displays/hall", "sensors/hall/lwt", "displays/hall/state", ""] {
            let err = run(topic, LwtPayload::from("{}")).unwrap_err();
            assert!(matches!(err, DiscoveryError::InvalidTopicShape(_)));
            assert_eq!(err.severity(), Level::WARN);
        }
    }

    #[test]
    fn test_empty_payload_is_warning() {
        for payload in [LwtPayload::Absent, LwtPayload::from(""), LwtPayload::Json(Value::Null)] {
            let err = run("displays/hall/lwt", payload).unwrap_err();
            assert!(matches!(err, DiscoveryError::EmptyPayload));
            assert_eq!(err.severity(), Level::WARN);
        }
    }

    #[test]
    fn test_parse_failure_is_error() {
        let err = run("displays/hall/lwt", LwtPayload::from("{\"battery_percentage\":")).unwrap_err();
        assert!(matches!(err, DiscoveryError::PayloadParse(_)));
        assert_eq!(err.severity(), Level::ERROR);
        assert!(err.to_string().starts_with("Failed to parse LWT JSON"));
    }

    #[test]
    fn test_topic_checked_before_payload() {
        let err = run("nope", LwtPayload::Absent).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidTopicShape(_)));
    }

    #[test]
    fn test_handle_lwt_swallows_failures() {
        let profile = DeviceProfile::default();
        assert!(handle_lwt("bad/topic", &LwtPayload::from("{}"), now(), &profile).is_empty());
        assert!(handle_lwt("displays/a/lwt", &LwtPayload::Absent, now(), &profile).is_empty());
        assert!(handle_lwt("displays/a/lwt", &LwtPayload::from("oops"), now(), &profile).is_empty());
        assert_eq!(
            handle_lwt("displays/a/lwt", &LwtPayload::from("{}"), now(), &profile).len(),
            10
        );
    }
}
