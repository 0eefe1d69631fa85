//! API endpoints for site-shield.
//!
//! This module provides the programmatic HTTP surface: the contact form
//! submission endpoint, the health check, and the metrics exposition
//! endpoint. These paths sit under the gate's bypass prefix and enforce
//! their own limits.

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::captcha::CaptchaVerifier;
use crate::core::ledger::AbuseLedger;
use crate::core::mailer::Mailer;
use crate::models::Config;

pub mod contact;

pub struct ApiState {
    pub ledger: Arc<AbuseLedger>,
    pub captcha: Arc<dyn CaptchaVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<Config>,
}

/// API configuration function for Actix-web
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(
                web::resource("/contact")
                    .route(web::post().to(contact::submit))
                    .default_service(web::route().to(method_not_allowed)),
            ),
    );
}

/// Health check endpoint response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// Rejection for unsupported methods on the contact resource
async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(json!({ "error": "Method not allowed" }))
}

/// Prometheus exposition endpoint; registered alongside [`routes`] with the
/// recorder handle installed at startup.
pub async fn metrics_snapshot(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(handle.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn health_check_reports_ok() {
        let app = test::init_service(App::new().configure(routes)).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn contact_rejects_non_post_methods() {
        let app = test::init_service(App::new().configure(routes)).await;

        for req in [
            test::TestRequest::get().uri("/api/contact").to_request(),
            test::TestRequest::put().uri("/api/contact").to_request(),
            test::TestRequest::delete().uri("/api/contact").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), 405);
        }
    }
}
