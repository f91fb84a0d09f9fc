use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::QueueCellState;

pub fn queue_routes(state: Arc<QueueCellState>) -> Router {
    let protected_routes = Router::new()
        .route("/check-in/{appointment_id}", post(handlers::check_in_patient))
        .route("/doctors/{doctor_id}/call-next", post(handlers::call_next_patient))
        .route("/doctors/{doctor_id}/today", get(handlers::get_today_queue))
        .route("/patients/{appointment_id}/status", patch(handlers::update_queue_patient_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
