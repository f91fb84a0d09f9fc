use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{Notifier, RedisNotificationDispatcher};
use appointment_cell::store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use queue_cell::store::{InMemoryQueueStore, QueueStore, SupabaseQueueStore};
use schedule_cell::store::{InMemoryScheduleStore, ScheduleStore, SupabaseScheduleStore};
use shared_config::AppConfig;
use shared_utils::SystemClock;

use crate::router::Backends;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    let backends = select_backends(&config).await;

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), backends)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server terminated")?;

    Ok(())
}

async fn select_backends(config: &AppConfig) -> Backends {
    let (schedule_store, appointment_store, queue_store): (
        Arc<dyn ScheduleStore>,
        Arc<dyn AppointmentStore>,
        Arc<dyn QueueStore>,
    ) = if config.is_configured() {
        info!("Using Supabase stores at {}", config.supabase_url);
        (
            Arc::new(SupabaseScheduleStore::new(config)),
            Arc::new(SupabaseAppointmentStore::new(config)),
            Arc::new(SupabaseQueueStore::new(config)),
        )
    } else {
        warn!("Supabase is not configured; data lives in memory and is lost on restart");
        (
            Arc::new(InMemoryScheduleStore::new()),
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(InMemoryQueueStore::new()),
        )
    };

    let notifier = if config.is_redis_configured() {
        match RedisNotificationDispatcher::new(config).await {
            Ok(dispatcher) => Notifier::new(Arc::new(dispatcher)),
            Err(e) => {
                warn!("Redis unavailable ({}); notifications will only be logged", e);
                Notifier::log_only()
            }
        }
    } else {
        warn!("REDIS_URL not set; notifications will only be logged");
        Notifier::log_only()
    };

    Backends {
        schedule_store,
        appointment_store,
        queue_store,
        notifier,
        clock: Arc::new(SystemClock),
    }
}
