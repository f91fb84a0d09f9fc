use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateExceptionRequest, ScheduleError, SetAvailabilityRequest};
use crate::state::ScheduleCellState;

#[derive(Debug, Deserialize)]
pub struct ExceptionRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub fn map_schedule_error(error: ScheduleError) -> AppError {
    match error {
        ScheduleError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        ScheduleError::ExceptionNotFound => AppError::NotFound("Schedule exception not found".to_string()),
        e @ ScheduleError::ExceptionExists(_) => AppError::conflict("EXCEPTION_EXISTS", e.to_string()),
        ScheduleError::Validation(msg) => AppError::ValidationError(msg),
        ScheduleError::Forbidden => AppError::Forbidden("Not allowed to manage this schedule".to_string()),
        e @ ScheduleError::InvalidProfile(_) => AppError::Internal(e.to_string()),
        ScheduleError::Store(e) => AppError::Database(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<ScheduleCellState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let availability = state
        .schedule
        .get_availability(&doctor_id)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<ScheduleCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let availability = state
        .schedule
        .set_weekly_availability(&user, &doctor_id, request.availability)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn list_exceptions(
    State(state): State<Arc<ScheduleCellState>>,
    Path(doctor_id): Path<String>,
    Query(range): Query<ExceptionRangeQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let exceptions = state
        .schedule
        .list_exceptions(&user, &doctor_id, range.from, range.to)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "exceptions": exceptions,
        "total": exceptions.len()
    })))
}

#[axum::debug_handler]
pub async fn create_exception(
    State(state): State<Arc<ScheduleCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let exception = state
        .schedule
        .create_exception(&user, &doctor_id, request)
        .await
        .map_err(map_schedule_error)?;

    Ok((StatusCode::CREATED, Json(json!(exception))))
}

#[axum::debug_handler]
pub async fn delete_exception(
    State(state): State<Arc<ScheduleCellState>>,
    Path(exception_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    state
        .schedule
        .delete_exception(&user, &exception_id)
        .await
        .map_err(map_schedule_error)?;

    Ok(StatusCode::NO_CONTENT)
}
