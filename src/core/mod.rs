//! Core functionality for site-shield.
//!
//! This module contains the abuse-mitigation components: the request gate,
//! the abuse ledger, threat heuristics, and the trait seams for the CAPTCHA
//! and email collaborators.

pub mod captcha;
pub mod events;
pub mod gate;
pub mod ledger;
pub mod mailer;
pub mod threats;

pub use captcha::{CaptchaError, CaptchaVerifier, TurnstileVerifier};
pub use events::{EventType, SecurityEvent, Severity};
pub use gate::{RequestGate, Verdict};
pub use ledger::{AbuseLedger, IpReputation, RateLimitEntry};
pub use mailer::{ContactSubmission, LogMailer, MailError, Mailer};
