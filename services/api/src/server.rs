use crate::cli::{ServeArgs, SeedArgs};
use crate::clients::{HttpAdmissionClassifier, HttpRecommendationSource, RetryPolicy};
use crate::infra::{load_capacity, AppState, InMemoryStores, TracingNotificationPublisher};
use crate::routes::with_admission_routes;
use admission_ratings::admission::{
    AdmissionService, AdmissionStores, BroadcastOrchestrator, NotificationFactory,
    NotificationPublisher, StatusEngine,
};
use admission_ratings::config::AppConfig;
use admission_ratings::error::AppError;
use admission_ratings::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Fully wired use cases over seeded in-memory stores.
pub(crate) struct Components {
    pub(crate) service: Arc<AdmissionService>,
    pub(crate) orchestrator: Arc<BroadcastOrchestrator>,
}

pub(crate) fn assemble(
    config: &AppConfig,
    seed: &SeedArgs,
    publisher: Arc<dyn NotificationPublisher>,
) -> Result<Components, AppError> {
    let capacity = Arc::new(load_capacity(config)?);
    let engine = Arc::new(StatusEngine::new(config.thresholds.clone(), capacity));

    let stores = InMemoryStores::default();
    stores.seed(seed.files())?;
    let stores = AdmissionStores {
        applicants: Arc::new(stores.applicants),
        ratings: Arc::new(stores.ratings),
        profiles: Arc::new(stores.profiles),
    };

    let http = reqwest::Client::new();
    let policy = RetryPolicy::from_endpoints(&config.services);
    let classifier = Arc::new(HttpAdmissionClassifier::new(
        http.clone(),
        &config.services.classifier_url,
        policy,
    ));
    let recommender = Arc::new(HttpRecommendationSource::new(
        http,
        &config.services.recommender_url,
        policy,
    ));

    let factory = Arc::new(NotificationFactory::new(
        Arc::clone(&stores.profiles),
        Arc::clone(&engine),
    ));
    let orchestrator = Arc::new(BroadcastOrchestrator::new(
        Arc::clone(&stores.applicants),
        Arc::clone(&stores.ratings),
        factory,
        publisher,
        config.broadcast.settings.clone(),
    ));
    let service = Arc::new(AdmissionService::new(
        stores,
        classifier,
        recommender,
        engine,
    ));

    Ok(Components {
        service,
        orchestrator,
    })
}

fn spawn_periodic_broadcast(orchestrator: Arc<BroadcastOrchestrator>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; wait a full period before the first cycle.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match orchestrator.broadcast().await {
                Ok(summary) => info!(
                    published = summary.published,
                    failed = summary.failed,
                    "scheduled broadcast finished"
                ),
                Err(err) => error!(error = %err, "scheduled broadcast aborted"),
            }
        }
    });
}

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let components = assemble(
        &config,
        &args.seed,
        Arc::new(TracingNotificationPublisher),
    )?;
    if let Some(period) = config.broadcast.interval {
        info!(interval_secs = period.as_secs(), "periodic broadcast enabled");
        spawn_periodic_broadcast(Arc::clone(&components.orchestrator), period);
    }

    let app = with_admission_routes(components.service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "rating analytics service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
