use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::{supabase::SupabaseClient, DatabaseError};

use crate::models::{Appointment, AppointmentStatus, AuditEntry};
use crate::store::AppointmentStore;

/// Appointment rows with their audit trail embedded, oldest entry first.
const APPOINTMENT_SELECT: &str = "select=*,audit_log:appointment_audit(*)&audit_log.order=seq.asc";

/// Appointments in PostgREST. Slot uniqueness comes from the partial unique
/// index `appointments_live_slot_key`; reschedule runs inside the
/// `reschedule_appointment` SQL function.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn row(appointment: &Appointment) -> Value {
        json!({
            "id": appointment.id,
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "clinic_id": appointment.clinic_id,
            "date": appointment.date,
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "status": appointment.status,
            "payment_status": appointment.payment_status,
            "booked_by": appointment.booked_by,
            "channel": appointment.channel,
            "reschedule_count": appointment.reschedule_count,
            "previous_appointment_id": appointment.previous_appointment_id,
            "cancelled_by": appointment.cancelled_by,
            "cancel_reason": appointment.cancel_reason,
            "created_at": appointment.created_at,
            "updated_at": appointment.updated_at
        })
    }

    fn first(rows: Vec<Appointment>, context: &str) -> Result<Appointment, DatabaseError> {
        rows.into_iter().next().ok_or_else(|| DatabaseError::Api {
            status: 200,
            message: format!("{} returned no row", context),
        })
    }

    /// Explain an empty conditional write: the row is gone or moved on.
    async fn missing_or_stale(&self, appointment_id: &str, expected: AppointmentStatus) -> DatabaseError {
        match self.get(appointment_id).await {
            Ok(None) => DatabaseError::NotFound(format!("appointment {}", appointment_id)),
            Ok(Some(stored)) => DatabaseError::StaleWrite(format!(
                "appointment {} is {}, expected {}",
                appointment_id, stored.status, expected
            )),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let path = format!("/rest/v1/appointments?{}", APPOINTMENT_SELECT);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                Some(Self::row(appointment)),
                Some(SupabaseClient::representation()),
            )
            .await?;

        Self::first(rows, "appointment insert")
    }

    async fn get(&self, appointment_id: &str) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&{}", appointment_id, APPOINTMENT_SELECT);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_for_doctor_on(&self, doctor_id: &str, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&order=start_time.asc,created_at.asc&{}",
            doctor_id, date, APPOINTMENT_SELECT
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn update_if_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError> {
        debug!(
            "Conditional update of appointment {} ({} -> {})",
            appointment.id, expected, appointment.status
        );

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}&{}",
            appointment.id, expected, APPOINTMENT_SELECT
        );
        let body = json!({
            "status": appointment.status,
            "payment_status": appointment.payment_status,
            "cancelled_by": appointment.cancelled_by,
            "cancel_reason": appointment.cancel_reason,
            "updated_at": appointment.updated_at
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(body), Some(SupabaseClient::representation()))
            .await?;

        match rows.into_iter().next() {
            Some(updated) => Ok(updated),
            None => Err(self.missing_or_stale(&appointment.id, expected).await),
        }
    }

    async fn reschedule(
        &self,
        cancelled: &Appointment,
        expected: AppointmentStatus,
        replacement: &Appointment,
    ) -> Result<Appointment, DatabaseError> {
        let rows: Vec<Appointment> = self
            .supabase
            .rpc(
                "reschedule_appointment",
                json!({
                    "p_old_id": cancelled.id,
                    "p_expected_status": expected,
                    "p_cancelled_by": cancelled.cancelled_by,
                    "p_cancel_reason": cancelled.cancel_reason,
                    "p_replacement": Self::row(replacement)
                }),
            )
            .await?;

        match rows.into_iter().next() {
            Some(created) => Ok(created),
            None => {
                warn!("Reschedule of {} found it no longer {}", cancelled.id, expected);
                Err(self.missing_or_stale(&cancelled.id, expected).await)
            }
        }
    }

    async fn append_audit(&self, appointment_id: &str, entry: &AuditEntry) -> Result<(), DatabaseError> {
        let mut row = serde_json::to_value(entry)?;
        if let Value::Object(fields) = &mut row {
            fields.insert("appointment_id".to_string(), Value::from(appointment_id));
        }

        let _: Value = self
            .supabase
            .request(Method::POST, "/rest/v1/appointment_audit", Some(row))
            .await?;
        Ok(())
    }
}
