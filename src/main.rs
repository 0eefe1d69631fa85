//! site-shield
//!
//! This is the main entry point for the service. It initializes the
//! application components, spawns the ledger maintenance task, and starts
//! the web server with the request gate wrapped around every route.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::info;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;

use site_shield::api::{self, ApiState};
use site_shield::config;
use site_shield::core::{AbuseLedger, LogMailer, RequestGate, TurnstileVerifier};
use site_shield::utils::now_millis;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting site-shield...");

    // Load configuration
    let config = config::load_config().context("failed to load configuration")?;
    let config = Arc::new(config);

    // Install the metrics recorder
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    // Initialize the abuse ledger and external collaborators
    let ledger = Arc::new(AbuseLedger::new(config.ledger.max_events_per_ip));
    let captcha =
        TurnstileVerifier::new(&config.captcha).context("failed to build CAPTCHA client")?;

    let state = web::Data::new(ApiState {
        ledger: ledger.clone(),
        captcha: Arc::new(captcha),
        mailer: Arc::new(LogMailer),
        config: config.clone(),
    });

    // Periodic ledger maintenance, independent of request volume
    {
        let ledger = ledger.clone();
        let interval_secs = config.ledger.cleanup_interval_secs;
        let retention_ms = config.ledger.reputation_retention_secs * 1000;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                ledger.cleanup(now_millis(), retention_ms);
                log::debug!(
                    "ledger cleanup pass complete; tracking {} sources, {} reputations",
                    ledger.tracked_sources(),
                    ledger.tracked_reputations(),
                );
            }
        });
    }

    let gate = RequestGate::new(config.gate.clone(), ledger.clone());
    let bind_addr = (config.server.host.clone(), config.server.port);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::Data::new(prometheus.clone()))
            .wrap(gate.clone())
            .configure(api::routes)
            .route("/api/metrics", web::get().to(api::metrics_snapshot))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
