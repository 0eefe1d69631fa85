//! Request gate: admission control for every inbound request.
//!
//! Implemented as actix-web middleware wrapping the whole application. Each
//! request is checked against the abuse ledger (active block, then rate
//! limit) and the fixed threat denylists before any route handler runs.
//! Paths under the configured bypass prefix skip the checks; the baseline
//! protective headers are attached to every response, allow or deny.

use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap},
    http::StatusCode,
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::warn;
use metrics::increment_counter;

use crate::core::events::{EventType, SecurityEvent};
use crate::core::ledger::AbuseLedger;
use crate::core::threats;
use crate::models::GateConfig;
use crate::utils::{client_ip, format_rate_limit_key, now_millis};

/// Rate-limit key scope for general page traffic. The contact endpoint uses
/// its own scope, keeping the two layers' counters independent.
pub const GENERAL_SCOPE: &str = "general";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BlockedIp,
    RateLimited,
    ScannerUserAgent,
    SensitivePath,
    SuspiciousParam,
    SpoofedHeader,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::BlockedIp => "blocked_ip",
            DenyReason::RateLimited => "rate_limit",
            DenyReason::ScannerUserAgent => "scanner_ua",
            DenyReason::SensitivePath => "sensitive_path",
            DenyReason::SuspiciousParam => "suspicious_param",
            DenyReason::SpoofedHeader => "spoofed_header",
        }
    }
}

/// Admission decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny {
        status: StatusCode,
        body: &'static str,
        retry_after_secs: Option<u64>,
        reason: DenyReason,
    },
}

impl Verdict {
    fn deny(
        status: StatusCode,
        body: &'static str,
        retry_after_secs: Option<u64>,
        reason: DenyReason,
    ) -> Self {
        Verdict::Deny {
            status,
            body,
            retry_after_secs,
            reason,
        }
    }
}

/// Admission-control middleware factory.
#[derive(Clone)]
pub struct RequestGate {
    config: Arc<GateConfig>,
    ledger: Arc<AbuseLedger>,
}

impl RequestGate {
    pub fn new(config: GateConfig, ledger: Arc<AbuseLedger>) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
        }
    }

    /// Evaluate one request against the ledger and the threat denylists.
    /// First match wins; every deny is recorded before it is returned.
    pub fn evaluate(
        &self,
        ip: &str,
        path: &str,
        query: &str,
        headers: &HeaderMap,
        now: u64,
    ) -> Verdict {
        let key = format_rate_limit_key(GENERAL_SCOPE, ip);

        if let Some(remaining) = self.ledger.block_remaining(&key, now) {
            self.ledger
                .record_event(SecurityEvent::new(EventType::BlockedIp, ip).with_path(path));
            return Verdict::deny(
                StatusCode::FORBIDDEN,
                "Access Denied - IP Blocked",
                Some(remaining),
                DenyReason::BlockedIp,
            );
        }

        let window_ms = self.config.window_secs * 1000;
        if self
            .ledger
            .check_and_increment(&key, self.config.max_requests, window_ms, now)
        {
            self.ledger.block(&key, now, self.config.block_secs * 1000);
            self.ledger.record_event(
                SecurityEvent::new(EventType::RateLimit, ip)
                    .with_path(path)
                    .with_details("general request limit exceeded"),
            );
            return Verdict::deny(
                StatusCode::TOO_MANY_REQUESTS,
                "Too Many Requests",
                Some(self.config.block_secs),
                DenyReason::RateLimited,
            );
        }

        if rand::random::<f64>() < self.config.cleanup_probability {
            self.ledger.sweep_expired(now);
        }

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if threats::is_scanner_user_agent(user_agent) {
            self.ledger.record_event(
                SecurityEvent::new(EventType::SuspiciousUa, ip)
                    .with_user_agent(user_agent)
                    .with_path(path),
            );
            return Verdict::deny(
                StatusCode::FORBIDDEN,
                "Access Denied",
                None,
                DenyReason::ScannerUserAgent,
            );
        }

        if threats::is_sensitive_path(path) {
            // disguised as not-found so the prober learns nothing
            warn!("blocked access to sensitive path {} from {}", path, ip);
            return Verdict::deny(
                StatusCode::NOT_FOUND,
                "Not Found",
                None,
                DenyReason::SensitivePath,
            );
        }

        if let Some(param) = threats::find_suspicious_param(query) {
            self.ledger.record_event(
                SecurityEvent::new(EventType::XssAttempt, ip)
                    .with_path(path)
                    .with_details(format!("suspicious parameter: {param}")),
            );
            return Verdict::deny(
                StatusCode::BAD_REQUEST,
                "Bad Request",
                None,
                DenyReason::SuspiciousParam,
            );
        }

        if let Some(header_name) = threats::find_spoofed_header(headers) {
            self.ledger.record_event(
                SecurityEvent::new(EventType::XssAttempt, ip)
                    .with_path(path)
                    .with_details(format!("spoofed routing header: {header_name}")),
            );
            return Verdict::deny(
                StatusCode::BAD_REQUEST,
                "Bad Request",
                None,
                DenyReason::SpoofedHeader,
            );
        }

        Verdict::Allow
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestGateMiddleware {
            service,
            gate: self.clone(),
        }))
    }
}

pub struct RequestGateMiddleware<S> {
    service: S,
    gate: RequestGate,
}

impl<S, B> Service<ServiceRequest> for RequestGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verdict = if req.path().starts_with(&self.gate.config.bypass_prefix) {
            // programmatic endpoints enforce their own, stricter limits
            Verdict::Allow
        } else {
            let ip = client_ip(req.headers());
            self.gate.evaluate(
                &ip,
                req.path(),
                req.query_string(),
                req.headers(),
                now_millis(),
            )
        };

        match verdict {
            Verdict::Allow => {
                increment_counter!("gate_allowed_total");
                let fut = self.service.call(req);
                Box::pin(async move {
                    let mut res = fut.await?;
                    threats::apply_baseline_headers(res.headers_mut());
                    Ok(res.map_into_left_body())
                })
            }
            Verdict::Deny {
                status,
                body,
                retry_after_secs,
                reason,
            } => {
                increment_counter!("gate_denied_total", "reason" => reason.as_str());
                let (request, _payload) = req.into_parts();
                let mut builder = HttpResponse::build(status);
                if let Some(secs) = retry_after_secs {
                    builder.insert_header((header::RETRY_AFTER, secs.to_string()));
                }
                let mut response = builder
                    .content_type("text/plain; charset=utf-8")
                    .body(body);
                threats::apply_baseline_headers(response.headers_mut());
                let response = ServiceResponse::new(request, response.map_into_right_body());
                Box::pin(async move { Ok(response) })
            }
        }
    }
}
