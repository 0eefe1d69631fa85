use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Request gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Maximum requests per source within one window
    pub max_requests: u32,
    /// Fixed window length in seconds
    pub window_secs: u64,
    /// Block duration applied when the limit is exceeded, in seconds
    pub block_secs: u64,
    /// Per-request probability of an opportunistic expired-entry sweep
    pub cleanup_probability: f64,
    /// Path prefix exempt from gate checks; endpoints under it enforce
    /// their own, stricter limits
    pub bypass_prefix: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 15 * 60,
            block_secs: 60 * 60,
            cleanup_probability: 0.01,
            bypass_prefix: "/api/".to_string(),
        }
    }
}

/// Contact form rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Maximum submissions per source within one window
    pub max_submissions: u32,
    /// Fixed window length in seconds
    pub window_secs: u64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            max_submissions: 5,
            window_secs: 15 * 60,
        }
    }
}

/// Abuse ledger maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Interval between background cleanup passes, in seconds
    pub cleanup_interval_secs: u64,
    /// Idle time after which a reputation record is evicted, in seconds
    pub reputation_retention_secs: u64,
    /// Bounded per-IP security event history
    pub max_events_per_ip: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 60 * 60,
            reputation_retention_secs: 24 * 60 * 60,
            max_events_per_ip: 100,
        }
    }
}

/// CAPTCHA verification configuration
///
/// The secret has no shipped default; startup fails when it is absent from
/// both the config file and the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Provider shared secret
    pub secret: String,
    /// Verification endpoint URL
    pub verify_url: String,
    /// Verification request timeout in seconds; expiry is treated as failure
    pub timeout_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Request gate configuration
    pub gate: GateConfig,
    /// Contact form configuration
    pub contact: ContactConfig,
    /// Abuse ledger configuration
    pub ledger: LedgerConfig,
    /// CAPTCHA configuration
    pub captcha: CaptchaConfig,
}
