use serde_json::{Map, Value};
use tracing::debug;

use super::DiscoveryError;

/// Payload as handed over by whoever received the LWT message.
#[derive(Debug, Clone)]
pub enum LwtPayload {
    /// No payload at all.
    Absent,
    /// Raw bytes straight off the wire.
    Bytes(Vec<u8>),
    /// Text that still needs JSON decoding.
    Text(String),
    /// Already decoded upstream.
    Json(Value),
}

impl From<&[u8]> for LwtPayload {
    fn from(bytes: &[u8]) -> Self {
        LwtPayload::Bytes(bytes.to_vec())
    }
}

impl From<&str> for LwtPayload {
    fn from(text: &str) -> Self {
        LwtPayload::Text(text.to_string())
    }
}

impl From<Value> for LwtPayload {
    fn from(value: Value) -> Self {
        LwtPayload::Json(value)
    }
}

/// Telemetry a display packs into its LWT message. Every field is optional and
/// holds whatever JSON value was sent, so the debug echo reproduces it unchanged.
/// Typed readers live with their consumers (see `firmware::firmware_number`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LwtData {
    pub battery_percentage: Option<Value>,
    pub battery_voltage: Option<Value>,
    pub charge_rate: Option<Value>,
    pub battery_sensor_present: Option<Value>,
    pub rssi: Option<Value>,
    pub sleep_time: Option<Value>,
    pub firmware_version: Option<Value>,
    pub free_heap: Option<Value>,
}

impl LwtData {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            battery_percentage: obj.get("battery_percentage").cloned(),
            battery_voltage: obj.get("battery_voltage").cloned(),
            charge_rate: obj.get("charge_rate").cloned(),
            battery_sensor_present: obj.get("battery_sensor_present").cloned(),
            rssi: obj.get("rssi").cloned(),
            sleep_time: obj.get("sleep_time").cloned(),
            firmware_version: obj.get("firmware_version").cloned(),
            free_heap: obj.get("free_heap").cloned(),
        }
    }
}

/// Falsy scalars count as "nothing was sent", the same as an absent payload.
fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Decode an LWT payload into its telemetry fields.
///
/// Empty payloads yield [`DiscoveryError::EmptyPayload`]; text that is not valid
/// JSON yields [`DiscoveryError::PayloadParse`]. Nothing else is validated: a JSON
/// value that is not an object simply carries no fields.
pub fn parse_lwt_payload(payload: &LwtPayload) -> Result<LwtData, DiscoveryError> {
    let value = match payload {
        LwtPayload::Absent => return Err(DiscoveryError::EmptyPayload),
        LwtPayload::Bytes(bytes) => {
            if bytes.is_empty() {
                return Err(DiscoveryError::EmptyPayload);
            }
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DiscoveryError::PayloadParse(e.to_string()))?;
            serde_json::from_str::<Value>(text)
                .map_err(|e| DiscoveryError::PayloadParse(e.to_string()))?
        }
        LwtPayload::Text(text) => {
            if text.is_empty() {
                return Err(DiscoveryError::EmptyPayload);
            }
            serde_json::from_str::<Value>(text)
                .map_err(|e| DiscoveryError::PayloadParse(e.to_string()))?
        }
        LwtPayload::Json(value) => {
            if is_empty_json(value) {
                return Err(DiscoveryError::EmptyPayload);
            }
            value.clone()
        }
    };

    match &value {
        Value::Object(obj) => Ok(LwtData::from_object(obj)),
        other => {
            debug!("LWT payload is not a JSON object ({}), no fields to read", other);
            Ok(LwtData::default())
        }
    }
}
