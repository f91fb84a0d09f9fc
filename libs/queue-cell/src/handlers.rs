use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use appointment_cell::handlers::map_appointment_error;
use schedule_cell::handlers::map_schedule_error;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CallNextOutcome, QueueError, UpdateQueueStatusRequest};
use crate::state::QueueCellState;

pub fn map_queue_error(error: QueueError) -> AppError {
    match error {
        e @ (QueueError::NotFound | QueueError::EntryNotFound(_)) => AppError::NotFound(e.to_string()),
        e @ QueueError::AlreadyCheckedIn(_) => AppError::conflict("ALREADY_CHECKED_IN", e.to_string()),
        e @ QueueError::ConsultationInProgress(_) => {
            AppError::rejected("CONSULTATION_IN_PROGRESS", e.to_string())
        }
        e @ QueueError::InvalidTransition { .. } => AppError::rejected("INVALID_TRANSITION", e.to_string()),
        e @ QueueError::NotToday { .. } => AppError::rejected("NOT_TODAY", e.to_string()),
        e @ QueueError::AppointmentNotActive(_) => AppError::rejected("APPOINTMENT_NOT_ACTIVE", e.to_string()),
        e @ QueueError::Busy => AppError::conflict("QUEUE_BUSY", e.to_string()),
        QueueError::Forbidden(msg) => AppError::Forbidden(msg),
        QueueError::Schedule(e) => map_schedule_error(e),
        QueueError::Appointment(e) => map_appointment_error(e),
        QueueError::Store(e) => AppError::Database(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn check_in_patient(
    State(state): State<Arc<QueueCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let entry = state
        .queue
        .check_in(&user, &appointment_id)
        .await
        .map_err(map_queue_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token_number": entry.token_number,
            "entry": entry
        })),
    ))
}

#[axum::debug_handler]
pub async fn call_next_patient(
    State(state): State<Arc<QueueCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .queue
        .call_next(&user, &doctor_id)
        .await
        .map_err(map_queue_error)?;

    let body = match outcome {
        CallNextOutcome::Called(entry) => json!({
            "status": "called",
            "current_token": entry.token_number,
            "entry": entry
        }),
        CallNextOutcome::QueueEmpty { current_token } => json!({
            "status": "queue_empty",
            "current_token": current_token,
            "message": "No patients waiting"
        }),
    };

    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn update_queue_patient_status(
    State(state): State<Arc<QueueCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateQueueStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .queue
        .update_patient_status(&user, &appointment_id, request.status)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

#[axum::debug_handler]
pub async fn get_today_queue(
    State(state): State<Arc<QueueCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let queue = state
        .queue
        .get_today(&user, &doctor_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "waiting": queue.waiting_count(),
        "queue": queue
    })))
}
