use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::http::header::HeaderMap;

/// Forwarded-IP headers checked in preference order. The first present header
/// is trusted as-is; see DESIGN.md for the spoofing tradeoff.
const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn format_rate_limit_key(scope: &str, key: &str) -> String {
    format!("{}:{}", scope, key)
}

/// Source identifier for an inbound request, falling back to a sentinel when
/// no forwarding header is present (e.g. direct connections in development).
pub fn client_ip(headers: &HeaderMap) -> String {
    for name in CLIENT_IP_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    "unknown".to_string()
}
