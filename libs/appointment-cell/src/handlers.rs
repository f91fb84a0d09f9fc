use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use schedule_cell::handlers::map_schedule_error;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, BookAppointmentRequest, CancelAppointmentRequest, RescheduleAppointmentRequest,
    UpdatePaymentRequest, UpdateStatusRequest,
};
use crate::state::AppointmentCellState;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

pub fn map_appointment_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        e @ AppointmentError::InvalidSlot(_) => AppError::rejected("INVALID_SLOT", e.to_string()),
        e @ AppointmentError::SlotAlreadyBooked => AppError::conflict("SLOT_ALREADY_BOOKED", e.to_string()),
        e @ AppointmentError::InvalidTransition { .. } => AppError::rejected("INVALID_TRANSITION", e.to_string()),
        e @ AppointmentError::NotReschedulable(_) => AppError::rejected("NOT_RESCHEDULABLE", e.to_string()),
        e @ AppointmentError::RescheduleLimitExceeded { .. } => {
            AppError::rejected("RESCHEDULE_LIMIT_EXCEEDED", e.to_string())
        }
        e @ AppointmentError::TooLateToReschedule { .. } => {
            AppError::rejected("TOO_LATE_TO_RESCHEDULE", e.to_string())
        }
        AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::Schedule(e) => map_schedule_error(e),
        AppointmentError::Store(e) => AppError::Database(e.to_string()),
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .booking
        .get_slots(&doctor_id, query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(slots)))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state
        .booking
        .request_booking(&user, request)
        .await
        .map_err(map_appointment_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get_appointment(&user, &appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<DateQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .booking
        .list_doctor_appointments(&user, &doctor_id, query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    request: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let reason = request.and_then(|Json(body)| body.reason);

    let appointment = state
        .booking
        .cancel(&user, &appointment_id, reason)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .reschedule(&user, &appointment_id, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .update_status(&user, &appointment_id, request.status)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_payment_status(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .update_payment_status(&user, &appointment_id, request.payment_status)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_audit(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let entries = state
        .booking
        .get_audit(&user, &appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "audit_log": entries
    })))
}
