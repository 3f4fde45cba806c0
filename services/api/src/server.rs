use crate::cli::ServeArgs;
use crate::infra::{build_marketplace, seed_demo_data, AppState};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use homeadapt::config::AppConfig;
use homeadapt::error::AppError;
use homeadapt::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.webhook.signing_secret.is_none() {
        warn!("WEBHOOK_SECRET is not set; payment webhook deliveries will be rejected");
    }

    let (service, store, assessments, _gateway) =
        build_marketplace(config.webhook.signing_secret.clone());
    seed_demo_data(&store, &assessments).map_err(AppError::from)?;

    let app = with_marketplace_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead marketplace service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
