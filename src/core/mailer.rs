//! Contact submission hand-off.
//!
//! Email delivery is an external collaborator behind the [`Mailer`] trait.
//! Delivery is fail-open: the submission was already accepted by the time
//! the mailer runs, so a delivery error is logged and must not affect the
//! user-visible response. The shipped implementation records the sanitized
//! submission in the service log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during submission delivery
#[derive(Debug, Error)]
pub enum MailError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A validated, sanitized contact form submission ready for hand-off.
#[derive(Debug, Clone, Serialize)]
pub struct ContactSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Source IP of the submitter
    pub ip: String,
    /// Submission timestamp
    pub timestamp: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, submission: &ContactSubmission) -> Result<(), MailError>;
}

/// Delivery stand-in that writes the submission to the service log with the
/// message truncated, keeping the full text out of log storage.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, submission: &ContactSubmission) -> Result<(), MailError> {
        let preview: String = submission.message.chars().take(100).collect();
        info!(
            "contact submission from {} <{}> ({}): subject={:?} message={:?}...",
            submission.first_name, submission.email, submission.ip, submission.subject, preview,
        );
        Ok(())
    }
}
