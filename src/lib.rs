//! site-shield
//!
//! Abuse mitigation and contact API service for a personal portfolio site:
//! a request gate applying IP rate limiting and threat denylists ahead of
//! every route, an in-process abuse ledger tracking counters and IP
//! reputation, and a contact form endpoint with CAPTCHA verification and
//! email hand-off.

pub mod api;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;
