//! Configuration management for site-shield.
//!
//! Loads application configuration from a TOML file layered under
//! environment variables (double-underscore separated, e.g.
//! `GATE__MAX_REQUESTS`).

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use std::env;

use crate::models::Config;

/// Load configuration from the config file and environment.
///
/// Every setting has a shipped default except `captcha.secret`, which must
/// be provided via the file or `CAPTCHA__SECRET`; loading fails without it.
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(Environment::default().separator("__"))
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("gate.max_requests", 100)?
        .set_default("gate.window_secs", 900)?
        .set_default("gate.block_secs", 3600)?
        .set_default("gate.cleanup_probability", 0.01)?
        .set_default("gate.bypass_prefix", "/api/")?
        .set_default("contact.max_submissions", 5)?
        .set_default("contact.window_secs", 900)?
        .set_default("ledger.cleanup_interval_secs", 3600)?
        .set_default("ledger.reputation_retention_secs", 86_400)?
        .set_default("ledger.max_events_per_ip", 100)?
        .set_default(
            "captcha.verify_url",
            "https://challenges.cloudflare.com/turnstile/v0/siteverify",
        )?
        .set_default("captcha.timeout_secs", 10)?
        .build()?;

    config.try_deserialize()
}
