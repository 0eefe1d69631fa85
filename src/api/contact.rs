//! Contact form submission endpoint.
//!
//! Accepts a JSON submission, applies its own per-IP rate limit
//! (independent of the request gate's counters), validates the payload
//! including the honeypot field, verifies the CAPTCHA token (fail closed),
//! sanitizes the text fields, and hands the submission to the mailer
//! (fail open). Every branch resolves to a concrete HTTP response.

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::Utc;
use log::{error, warn};
use metrics::increment_counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::api::ApiState;
use crate::core::events::{EventType, SecurityEvent};
use crate::core::mailer::ContactSubmission;
use crate::core::threats::sanitize_text;
use crate::utils::{client_ip, format_rate_limit_key, now_millis};

/// Rate-limit key scope for contact submissions.
pub const CONTACT_SCOPE: &str = "contact";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Errors that escape the handler; everything else is answered inline.
/// Surfaced to the caller as a generic 500 with no internal detail.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("malformed request body: {0}")]
    Body(#[from] serde_json::Error),
}

impl ResponseError for ContactError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        error!("contact endpoint failure: {self}");
        HttpResponse::InternalServerError()
            .json(json!({ "error": "Internal server error. Please try again later." }))
    }
}

/// Inbound contact form payload. All fields are defaulted so that absent
/// fields surface as validation errors rather than deserialization faults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Honeypot: invisible to humans, must stay empty
    pub website: String,
    pub captcha_token: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ContactForm {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut check = |field, message| errors.push(FieldError { field, message });

        match self.first_name.chars().count() {
            0 => check("firstName", "First name is required"),
            n if n > 50 => check("firstName", "First name too long"),
            _ => {}
        }
        match self.last_name.chars().count() {
            0 => check("lastName", "Last name is required"),
            n if n > 50 => check("lastName", "Last name too long"),
            _ => {}
        }
        if !EMAIL_RE.is_match(&self.email) {
            check("email", "Invalid email address");
        }
        match self.subject.chars().count() {
            0 => check("subject", "Subject is required"),
            n if n > 100 => check("subject", "Subject too long"),
            _ => {}
        }
        match self.message.chars().count() {
            n if n < 10 => check("message", "Message must be at least 10 characters"),
            n if n > 1000 => check("message", "Message too long"),
            _ => {}
        }
        if !self.website.is_empty() {
            check("website", "Invalid submission");
        }
        if self.captcha_token.is_empty() {
            check("captchaToken", "CAPTCHA verification required");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn sanitized(&self, ip: &str) -> ContactSubmission {
        ContactSubmission {
            first_name: sanitize_text(&self.first_name),
            last_name: sanitize_text(&self.last_name),
            email: sanitize_text(&self.email),
            subject: sanitize_text(&self.subject),
            message: sanitize_text(&self.message),
            ip: ip.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Contact form submission handler
pub async fn submit(
    state: web::Data<ApiState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ContactError> {
    let ip = client_ip(req.headers());
    let now = now_millis();
    let config = &state.config.contact;

    let key = format_rate_limit_key(CONTACT_SCOPE, &ip);
    let window_ms = config.window_secs * 1000;
    if state
        .ledger
        .check_and_increment(&key, config.max_submissions, window_ms, now)
    {
        return Ok(HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, config.window_secs.to_string()))
            .json(json!({
                "error": "Too many contact form submissions. Please try again later."
            })));
    }
    state.ledger.sweep_expired(now);

    let form: ContactForm = serde_json::from_slice(&body)?;

    if let Err(details) = form.validate() {
        if !form.website.is_empty() {
            state.ledger.record_event(
                SecurityEvent::new(EventType::FormSpam, &*ip)
                    .with_details("non-empty honeypot field"),
            );
        }
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Invalid input data",
            "details": details,
        })));
    }

    let verified = match state.captcha.verify(&form.captcha_token, &ip).await {
        Ok(verified) => verified,
        Err(err) => {
            warn!("captcha verification unavailable, failing closed: {err}");
            false
        }
    };
    if !verified {
        state
            .ledger
            .record_event(SecurityEvent::new(EventType::CaptchaFail, &*ip));
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "CAPTCHA verification failed. Please try again."
        })));
    }

    let submission = form.sanitized(&ip);
    if let Err(err) = state.mailer.send(&submission).await {
        // the submission is already accepted; delivery failure is ours to chase
        error!("contact mail delivery failed: {err}");
    }
    increment_counter!("contact_submissions_total");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Thank you for your message! I will get back to you soon."
    })))
}
