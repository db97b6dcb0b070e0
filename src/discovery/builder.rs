//! Home Assistant discovery configs for one display.
//!
//! Every sensor reads from the display's LWT topic; the LWT payload carries the
//! full telemetry snapshot, so there is no separate state topic per sensor.

use serde::Serialize;
use serde_json::Value;

use super::payload::LwtData;
use super::topic::{debug_topic, device_slug, discovery_topic, lwt_topic};
use super::{DeviceProfile, OutboundMessage, OutboundPayload};

pub const AVAILABILITY_TEMPLATE: &str =
    "{{ 'online' if value_json.battery_percentage is defined else 'offline' }}";

/// Same decoding as `decode_firmware_version`, evaluated by Home Assistant.
pub const FIRMWARE_TEMPLATE: &str = "{% set fw = value_json.firmware_version | int %}{% set major = (fw / 100) | int %}{% set minor = ((fw % 100) / 10) | int %}{% set patch = fw % 10 %}v{{ major }}.{{ minor }}.{{ patch }}";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub hw_version: String,
    pub sw_version: String,
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub name: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub topic: String,
    pub value_template: String,
}

/// Discovery config payload for a sensor or binary_sensor entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorConfig {
    pub name: String,
    pub state_topic: String,
    pub value_template: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub force_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    pub object_id: String,
    pub unique_id: String,
    pub device: DeviceDescriptor,
    pub availability: Availability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
}

/// Raw telemetry echoed to the debug topic for troubleshooting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugEcho {
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percentage: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_rate: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_sensor_present: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_time: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<Value>,
    pub firmware_version_parsed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_heap: Option<Value>,
    pub last_seen: String,
}

enum ValueSource {
    /// `{{ value_json.<field> }}`
    Field,
    /// ON/OFF from a boolean field.
    Presence,
    Firmware,
    /// The time this batch was built.
    Timestamp,
}

struct SensorDef {
    name: &'static str,
    slug: &'static str,
    /// LWT field name; doubles as the unique_id suffix.
    field: &'static str,
    platform: &'static str,
    device_class: Option<&'static str>,
    unit: Option<&'static str>,
    measurement: bool,
    icon: Option<&'static str>,
    value: ValueSource,
}

const SENSORS: [SensorDef; 9] = [
    SensorDef {
        name: "battery",
        slug: "battery",
        field: "battery_percentage",
        platform: "sensor",
        device_class: Some("battery"),
        unit: Some("%"),
        measurement: true,
        icon: None,
        value: ValueSource::Field,
    },
    SensorDef {
        name: "voltage",
        slug: "voltage",
        field: "battery_voltage",
        platform: "sensor",
        device_class: Some("voltage"),
        unit: Some("V"),
        measurement: true,
        icon: None,
        value: ValueSource::Field,
    },
    SensorDef {
        name: "charge_rate",
        slug: "charge_rate",
        field: "charge_rate",
        platform: "sensor",
        device_class: None,
        unit: Some("%/hr"),
        measurement: true,
        icon: Some("mdi:battery-charging"),
        value: ValueSource::Field,
    },
    SensorDef {
        name: "battery_sensor",
        slug: "battery_sensor",
        field: "battery_sensor_present",
        platform: "binary_sensor",
        device_class: Some("connectivity"),
        unit: None,
        measurement: false,
        icon: None,
        value: ValueSource::Presence,
    },
    SensorDef {
        name: "rssi",
        slug: "rssi",
        field: "rssi",
        platform: "sensor",
        device_class: Some("signal_strength"),
        unit: Some("dBm"),
        measurement: true,
        icon: Some("mdi:wifi"),
        value: ValueSource::Field,
    },
    SensorDef {
        name: "sleep_time",
        slug: "sleep_time",
        field: "sleep_time",
        platform: "sensor",
        device_class: Some("duration"),
        unit: Some("h"),
        measurement: true,
        icon: Some("mdi:sleep"),
        value: ValueSource::Field,
    },
    SensorDef {
        name: "firmware_version",
        slug: "firmware_version",
        field: "firmware_version",
        platform: "sensor",
        device_class: None,
        unit: None,
        measurement: false,
        icon: Some("mdi:chip"),
        value: ValueSource::Firmware,
    },
    SensorDef {
        name: "free_heap",
        slug: "free_heap",
        field: "free_heap",
        platform: "sensor",
        device_class: None,
        unit: Some("bytes"),
        measurement: true,
        icon: Some("mdi:memory"),
        value: ValueSource::Field,
    },
    SensorDef {
        name: "last_seen",
        slug: "last_seen",
        field: "last_seen",
        platform: "sensor",
        device_class: Some("timestamp"),
        unit: None,
        measurement: false,
        icon: Some("mdi:clock-outline"),
        value: ValueSource::Timestamp,
    },
];

pub fn device_descriptor(
    device_name: &str,
    fw_version: &str,
    profile: &DeviceProfile,
) -> DeviceDescriptor {
    DeviceDescriptor {
        hw_version: profile.hw_version.clone(),
        sw_version: fw_version.to_string(),
        identifiers: vec![device_name.to_string()],
        manufacturer: profile.manufacturer.clone(),
        name: device_name.to_string(),
        model: profile.model.clone(),
    }
}

/// Build the full batch for one LWT message: nine discovery configs followed by
/// the debug echo, always in the same order.
pub fn build_messages(
    device_name: &str,
    lwt: &LwtData,
    fw_version: &str,
    timestamp_iso: &str,
    profile: &DeviceProfile,
) -> Vec<OutboundMessage> {
    let state_topic = lwt_topic(device_name);
    // TODO: switch to a per-sensor object_id ("{device_slug}_{field}") together with a
    // cleanup of the entities HA already registered; today every sensor shares it.
    let object_id = device_slug(device_name);
    let device = device_descriptor(device_name, fw_version, profile);
    let availability = Availability {
        topic: state_topic.clone(),
        value_template: AVAILABILITY_TEMPLATE.to_string(),
    };

    let mut messages: Vec<OutboundMessage> = SENSORS
        .iter()
        .map(|def| {
            let value_template = match def.value {
                ValueSource::Field => format!("{{{{ value_json.{} }}}}", def.field),
                ValueSource::Presence => format!(
                    "{{{{ 'ON' if value_json.{} else 'OFF' }}}}",
                    def.field
                ),
                ValueSource::Firmware => FIRMWARE_TEMPLATE.to_string(),
                ValueSource::Timestamp => timestamp_iso.to_string(),
            };
            let binary = def.platform == "binary_sensor";

            let config = SensorConfig {
                name: def.name.to_string(),
                state_topic: state_topic.clone(),
                value_template,
                platform: def.platform.to_string(),
                device_class: def.device_class.map(String::from),
                force_update: true,
                state_class: def.measurement.then(|| "measurement".to_string()),
                unit_of_measurement: def.unit.map(String::from),
                object_id: object_id.clone(),
                unique_id: format!("{}_{}", device_name, def.field),
                device: device.clone(),
                availability: availability.clone(),
                icon: def.icon.map(String::from),
                payload_on: binary.then(|| "ON".to_string()),
                payload_off: binary.then(|| "OFF".to_string()),
            };

            OutboundMessage {
                topic: discovery_topic(def.platform, device_name, def.slug),
                payload: OutboundPayload::Discovery(config),
                retain: true,
            }
        })
        .collect();

    messages.push(OutboundMessage {
        topic: debug_topic(device_name),
        payload: OutboundPayload::Debug(DebugEcho {
            device_name: device_name.to_string(),
            battery_percentage: lwt.battery_percentage.clone(),
            battery_voltage: lwt.battery_voltage.clone(),
            charge_rate: lwt.charge_rate.clone(),
            battery_sensor_present: lwt.battery_sensor_present.clone(),
            rssi: lwt.rssi.clone(),
            sleep_time: lwt.sleep_time.clone(),
            firmware_version: lwt.firmware_version.clone(),
            firmware_version_parsed: fw_version.to_string(),
            free_heap: lwt.free_heap.clone(),
            last_seen: timestamp_iso.to_string(),
        }),
        retain: false,
    });

    messages
}
