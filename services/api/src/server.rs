use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDormRepository};
use crate::routes::with_dorm_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use roommate_ai::config::AppConfig;
use roommate_ai::error::AppError;
use roommate_ai::telemetry;
use roommate_ai::workflows::allocation::{AdvisoryBackend, AllocationEngine};
use roommate_ai::workflows::dorm::DormAllocationService;
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

    let backend = AdvisoryBackend::from_config(&config.advisory)?;
    if !backend.is_enabled() {
        warn!("APP_ADVISORY_URL not set; allocations use deterministic packing only");
    }
    let engine = Arc::new(AllocationEngine::new(backend, config.advisory.timeout));
    let repository = Arc::new(InMemoryDormRepository::default());
    let dorm_service = Arc::new(DormAllocationService::new(repository, engine));

    let app = with_dorm_routes(dorm_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "roommate allocation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
