//! Threat heuristics shared by the request gate and the contact endpoint.
//!
//! Fixed denylists (scanning-tool user agents, sensitive path probes,
//! command-injection-suggestive query parameters, spoofed routing headers),
//! the baseline protective response header set, and text sanitization.

use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

/// Known scanning and credential-attack tool signatures, matched
/// case-insensitively against the user-agent string.
static SCANNER_UA_SET: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)masscan",
        r"(?i)nmap",
        r"(?i)sqlmap",
        r"(?i)nikto",
        r"(?i)dirb",
        r"(?i)gobuster",
        r"(?i)ffuf",
        r"(?i)hydra",
        r"(?i)medusa",
        r"(?i)ncrack",
        r"(?i)john",
        r"(?i)hashcat",
    ])
    .expect("scanner user-agent patterns are valid")
});

static PROTOCOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(javascript|data|vbscript):").expect("protocol pattern is valid"));

static EVENT_HANDLER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)on\w+=").expect("event handler pattern is valid"));

/// Paths probed by automated scanners: admin panels, environment files,
/// version-control directories, API and framework internals.
pub const SENSITIVE_PATH_PREFIXES: [&str; 7] = [
    "/api/",
    "/_next/",
    "/admin/",
    "/private/",
    "/.env",
    "/.git",
    "/wp-admin",
];

/// Query parameter keys suggestive of command injection.
pub const SUSPICIOUS_PARAMS: [&str; 7] = ["eval", "exec", "system", "shell", "cmd", "bash", "sh"];

/// Headers associated with URL-rewrite/origin-spoofing attacks.
pub const SPOOFED_ROUTING_HEADERS: [&str; 2] = ["x-original-url", "x-rewrite-url"];

/// Baseline protective headers, attached to every response path.
pub const BASELINE_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
];

pub fn is_scanner_user_agent(user_agent: &str) -> bool {
    SCANNER_UA_SET.is_match(user_agent)
}

pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// First suspicious query parameter key in the raw query string, if any.
pub fn find_suspicious_param(query: &str) -> Option<&'static str> {
    for pair in query.split('&') {
        let key = pair.split('=').next().unwrap_or(pair);
        if let Some(hit) = SUSPICIOUS_PARAMS.iter().find(|param| **param == key) {
            return Some(hit);
        }
    }
    None
}

/// First spoofed routing header present in the request, if any.
pub fn find_spoofed_header(headers: &HeaderMap) -> Option<&'static str> {
    SPOOFED_ROUTING_HEADERS
        .iter()
        .copied()
        .find(|name| headers.contains_key(*name))
}

pub fn apply_baseline_headers(headers: &mut HeaderMap) {
    for (name, value) in BASELINE_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
}

/// Strip markup and script-bearing fragments from user-supplied text:
/// angle brackets, `javascript:`/`data:`/`vbscript:` protocols, and inline
/// event-handler attributes, then trim surrounding whitespace.
pub fn sanitize_text(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let no_protocols = PROTOCOL_RE.replace_all(&stripped, "");
    let no_handlers = EVENT_HANDLER_RE.replace_all(&no_protocols, "");
    no_handlers.trim().to_string()
}
