use serde_json::Value;

/// Firmware builds report their version as one integer: `major*100 + minor*10 + patch`.
/// 123 → "v1.2.3". Digits outside 0-9 are not rejected, they just produce an odd string.
pub fn decode_firmware_version(raw: Option<i64>) -> String {
    let Some(v) = raw else {
        return "v0.0.0".to_string();
    };
    // Math.floor for the divisions and JS `%` (sign follows the dividend) for the
    // remainders, so -5 decodes to "v-1.-1.-5".
    let major = v.div_euclid(100);
    let minor = (v % 100).div_euclid(10);
    let patch = v % 10;
    format!("v{major}.{minor}.{patch}")
}

/// Read the encoded version from a raw LWT field. Numbers, numeric strings and
/// booleans are coerced; non-integral values are truncated toward zero. `null` and
/// anything non-numeric read as absent.
pub fn firmware_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u.min(i64::MAX as u64) as i64))
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(0);
            }
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
