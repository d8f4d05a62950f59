//! Secret scrubbing for anything that ends up in logs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9\-_]{16,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").expect("api key pattern is valid")
});

const SECRET_FIELDS: [&str; 5] = ["apikey", "api_key", "token", "password", "secret"];

pub const REDACTED: &str = "[REDACTED]";

/// Redacts API keys and bearer tokens in free text.
pub fn redact_sensitive_data(input: &str) -> String {
    API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]").into_owned()
}

/// Copy of a JSON tree with secret-looking fields masked.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let masked = if is_secret_field(k) && !v.is_null() {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_value(v)
                    };
                    (k.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::String(s) => Value::String(redact_sensitive_data(s)),
        other => other.clone(),
    }
}

fn is_secret_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_FIELDS.iter().any(|f| lower.ends_with(f))
}
