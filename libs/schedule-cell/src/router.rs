use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ScheduleCellState;

pub fn schedule_routes(state: Arc<ScheduleCellState>) -> Router {
    let public_routes = Router::new()
        .route("/doctors/{doctor_id}/availability", get(handlers::get_availability));

    let protected_routes = Router::new()
        .route("/doctors/{doctor_id}/availability", put(handlers::set_availability))
        .route(
            "/doctors/{doctor_id}/exceptions",
            get(handlers::list_exceptions).post(handlers::create_exception),
        )
        .route("/exceptions/{exception_id}", delete(handlers::delete_exception))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
