use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use schedule_cell::models::{ClockTime, ScheduleError};
use shared_database::DatabaseError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub clinic_id: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub booked_by: String,
    pub channel: BookingChannel,
    #[serde(default)]
    pub reschedule_count: u32,
    pub previous_appointment_id: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Holds its slot: anything but cancelled.
    pub fn is_live(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Doctor-local wall-clock start.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.start_time.on(self.date)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Still waiting to be seen.
    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Waived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BookingChannel {
    Online,
    WalkIn,
}

// ==============================================================================
// AUDIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Created,
    Confirmed,
    Cancelled,
    Rescheduled,
    Completed,
    NoShow,
    Payment,
}

impl From<AppointmentStatus> for AuditAction {
    fn from(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Pending => AuditAction::Created,
            AppointmentStatus::Confirmed => AuditAction::Confirmed,
            AppointmentStatus::Completed => AuditAction::Completed,
            AppointmentStatus::Cancelled => AuditAction::Cancelled,
            AppointmentStatus::NoShow => AuditAction::NoShow,
        }
    }
}

/// One immutable line of an appointment's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, performed_by: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            performed_by: performed_by.to_string(),
            timestamp,
            details: None,
            old_value: None,
            new_value: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_change(mut self, old_value: Value, new_value: Value) -> Self {
        self.old_value = Some(old_value);
        self.new_value = Some(new_value);
        self
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    /// Required when staff book on a patient's behalf; patients book for themselves.
    pub patient_id: Option<String>,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_start_time: ClockTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotView {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_booked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlots {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub is_available: bool,
    pub slots: Vec<SlotView>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Requested slot is not bookable: {0}")]
    InvalidSlot(String),

    #[error("Slot is already booked")]
    SlotAlreadyBooked,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("A {0} appointment cannot be rescheduled")]
    NotReschedulable(AppointmentStatus),

    #[error("Appointment has already been rescheduled the maximum {max} times")]
    RescheduleLimitExceeded { max: u32 },

    #[error("Appointments can only be rescheduled more than {min_hours} hours ahead")]
    TooLateToReschedule { min_hours: u32 },

    #[error("Unauthorized access to appointment: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}
