use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use appointment_cell::services::Notifier;
use appointment_cell::store::AppointmentStore;
use appointment_cell::AppointmentCellState;
use queue_cell::router::queue_routes;
use queue_cell::store::QueueStore;
use queue_cell::QueueCellState;
use schedule_cell::router::schedule_routes;
use schedule_cell::store::ScheduleStore;
use schedule_cell::ScheduleCellState;
use shared_config::AppConfig;
use shared_utils::Clock;

/// Storage and side-effect backends chosen at startup.
pub struct Backends {
    pub schedule_store: Arc<dyn ScheduleStore>,
    pub appointment_store: Arc<dyn AppointmentStore>,
    pub queue_store: Arc<dyn QueueStore>,
    pub notifier: Notifier,
    pub clock: Arc<dyn Clock>,
}

pub fn create_router(config: Arc<AppConfig>, backends: Backends) -> Router {
    let schedule_state = Arc::new(ScheduleCellState::new(config.clone(), backends.schedule_store));

    let appointment_state = Arc::new(AppointmentCellState::new(
        config.clone(),
        schedule_state.schedule.clone(),
        backends.appointment_store,
        backends.notifier.clone(),
        backends.clock.clone(),
    ));

    let queue_state = Arc::new(QueueCellState::new(
        config,
        appointment_state.booking.clone(),
        backends.queue_store,
        backends.notifier,
        backends.clock,
    ));

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedule", schedule_routes(schedule_state))
        .nest("/appointments", appointment_routes(appointment_state))
        .nest("/queue", queue_routes(queue_state))
}
