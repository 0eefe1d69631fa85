//! Security event records.
//!
//! Every detected anomaly is captured as an immutable [`SecurityEvent`] and
//! fed to the abuse ledger, which derives reputation scores from the event
//! type's fixed point deduction.

use chrono::{DateTime, Utc};
use log::Level;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of detected anomaly types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RateLimit,
    BlockedIp,
    SuspiciousUa,
    FormSpam,
    CaptchaFail,
    XssAttempt,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::RateLimit => "rate_limit",
            EventType::BlockedIp => "blocked_ip",
            EventType::SuspiciousUa => "suspicious_ua",
            EventType::FormSpam => "form_spam",
            EventType::CaptchaFail => "captcha_fail",
            EventType::XssAttempt => "xss_attempt",
        }
    }

    /// Severity is derived from the type, never stored.
    pub fn severity(self) -> Severity {
        match self {
            EventType::FormSpam => Severity::Low,
            EventType::RateLimit | EventType::SuspiciousUa | EventType::CaptchaFail => {
                Severity::Medium
            }
            EventType::BlockedIp | EventType::XssAttempt => Severity::High,
        }
    }

    /// Fixed reputation deduction applied at ingestion time.
    pub fn deduction(self) -> u32 {
        match self {
            EventType::RateLimit => 10,
            EventType::SuspiciousUa => 20,
            EventType::FormSpam => 15,
            EventType::CaptchaFail => 25,
            EventType::XssAttempt => 40,
            EventType::BlockedIp => 50,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event ID
    pub id: Uuid,
    /// Event type
    pub event_type: EventType,
    /// Source IP
    pub ip: String,
    /// User agent, if relevant to the detection
    pub user_agent: Option<String>,
    /// Request path, if relevant to the detection
    pub path: Option<String>,
    /// Free-text detail
    pub details: Option<String>,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(event_type: EventType, ip: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            ip: ip.into(),
            user_agent: None,
            path: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Emit the event to the log at a level matching its severity.
    pub fn log(&self) {
        let severity = self.event_type.severity();
        let level = match severity {
            Severity::Low => Level::Info,
            Severity::Medium => Level::Warn,
            Severity::High | Severity::Critical => Level::Error,
        };
        log::log!(
            level,
            "[security] {} from {} severity={} path={} details={}",
            self.event_type,
            self.ip,
            severity,
            self.path.as_deref().unwrap_or("-"),
            self.details.as_deref().unwrap_or("-"),
        );
    }
}
