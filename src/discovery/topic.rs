//! Topic layout for the e-paper displays.
//!
//! Displays publish their status (and register it as their MQTT last will) on
//! `displays/<device_name>/lwt`. Everything else is derived from that name.

pub const DISPLAYS_PREFIX: &str = "displays";
pub const LWT_SUFFIX: &str = "lwt";
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Subscription filter matching every display's LWT topic.
pub const LWT_SUBSCRIPTION: &str = "displays/+/lwt";

/// Extract the device name from `displays/<device_name>/lwt`.
/// Segments after the `lwt` suffix are ignored.
pub fn parse_lwt_topic(topic: &str) -> Option<&str> {
    let mut parts = topic.split('/');
    let prefix = parts.next()?;
    let device_name = parts.next()?;
    let suffix = parts.next()?;
    if prefix != DISPLAYS_PREFIX || suffix != LWT_SUFFIX {
        return None;
    }
    Some(device_name)
}

/// Object-id-safe slug: dashes become underscores.
pub fn device_slug(device_name: &str) -> String {
    device_name.replace('-', "_")
}

pub fn lwt_topic(device_name: &str) -> String {
    format!("{DISPLAYS_PREFIX}/{device_name}/{LWT_SUFFIX}")
}

pub fn debug_topic(device_name: &str) -> String {
    format!("{DISPLAYS_PREFIX}/debug/{device_name}/log")
}

/// `homeassistant/{platform}/{device_name}/{slug}/config`
pub fn discovery_topic(platform: &str, device_name: &str, slug: &str) -> String {
    format!("{DISCOVERY_PREFIX}/{platform}/{device_name}/{slug}/config")
}

pub fn bridge_status_topic() -> String {
    format!("{DISPLAYS_PREFIX}/bridge_status")
}
