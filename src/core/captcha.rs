//! CAPTCHA verification client.
//!
//! The provider is an external collaborator treated as an opaque
//! boolean-returning remote check, reached through the [`CaptchaVerifier`]
//! trait. The shipped implementation talks to the Cloudflare Turnstile
//! siteverify endpoint with an explicit request timeout; callers treat any
//! transport failure as a failed verification (fail closed).

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::CaptchaConfig;

/// Errors that can occur during CAPTCHA verification
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("verification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("verification response malformed: {0}")]
    MalformedResponse(String),
}

/// Opaque remote token check.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Verify a client-supplied token for the given source IP.
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, CaptchaError>;
}

/// Cloudflare Turnstile verification client
pub struct TurnstileVerifier {
    /// HTTP client
    client: Client,
    /// Provider shared secret
    secret: String,
    /// Verification endpoint URL
    verify_url: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
    remoteip: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl TurnstileVerifier {
    /// Create a new verifier instance. The request timeout comes from the
    /// configuration; an expired request surfaces as a transport error.
    pub fn new(config: &CaptchaConfig) -> Result<Self, CaptchaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            secret: config.secret.clone(),
            verify_url: config.verify_url.clone(),
        })
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, remote_ip: &str) -> Result<bool, CaptchaError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&VerifyRequest {
                secret: &self.secret,
                response: token,
                remoteip: remote_ip,
            })
            .send()
            .await?;

        let body = response.text().await?;
        let outcome: VerifyResponse = serde_json::from_str(&body)
            .map_err(|err| CaptchaError::MalformedResponse(err.to_string()))?;

        if !outcome.success && !outcome.error_codes.is_empty() {
            debug!(
                "captcha rejected for {}: {}",
                remote_ip,
                outcome.error_codes.join(", ")
            );
        }
        Ok(outcome.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_response_parses_provider_payload() {
        let ok: VerifyResponse =
            serde_json::from_str(r#"{"success": true, "challenge_ts": "2026-01-01T00:00:00Z"}"#)
                .unwrap();
        assert!(ok.success);
        assert!(ok.error_codes.is_empty());

        let rejected: VerifyResponse =
            serde_json::from_str(r#"{"success": false, "error-codes": ["invalid-input-response"]}"#)
                .unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.error_codes, vec!["invalid-input-response"]);
    }
}
