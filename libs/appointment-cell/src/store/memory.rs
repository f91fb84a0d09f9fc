use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentStatus, AuditEntry};
use crate::store::AppointmentStore;

/// Process-local store; every check-then-write runs under one lock.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<String, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn slot_taken(appointments: &HashMap<String, Appointment>, candidate: &Appointment) -> bool {
    appointments.values().any(|existing| {
        existing.is_live()
            && existing.doctor_id == candidate.doctor_id
            && existing.date == candidate.date
            && existing.start_time == candidate.start_time
    })
}

fn slot_conflict(candidate: &Appointment) -> DatabaseError {
    DatabaseError::Conflict(format!(
        "doctor {} already has a booking at {} {}",
        candidate.doctor_id, candidate.date, candidate.start_time
    ))
}

fn guard_status(
    appointments: &HashMap<String, Appointment>,
    appointment_id: &str,
    expected: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let stored = appointments
        .get(appointment_id)
        .ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", appointment_id)))?;
    if stored.status != expected {
        return Err(DatabaseError::StaleWrite(format!(
            "appointment {} is {}, expected {}",
            appointment_id, stored.status, expected
        )));
    }
    Ok(())
}

/// Copy the mutable columns, keeping the stored audit log.
fn apply_update(stored: &mut Appointment, update: &Appointment) {
    stored.status = update.status;
    stored.payment_status = update.payment_status;
    stored.cancelled_by = update.cancelled_by.clone();
    stored.cancel_reason = update.cancel_reason.clone();
    stored.updated_at = update.updated_at;
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.lock().await;
        if slot_taken(&appointments, appointment) {
            return Err(slot_conflict(appointment));
        }
        appointments.insert(appointment.id.clone(), appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, appointment_id: &str) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.appointments.lock().await.get(appointment_id).cloned())
    }

    async fn list_for_doctor_on(&self, doctor_id: &str, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = self.appointments.lock().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| appointment.doctor_id == doctor_id && appointment.date == date)
            .cloned()
            .collect();
        found.sort_by_key(|appointment| (appointment.start_time, appointment.created_at));
        Ok(found)
    }

    async fn update_if_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.lock().await;
        guard_status(&appointments, &appointment.id, expected)?;

        let stored = appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", appointment.id)))?;
        apply_update(stored, appointment);
        Ok(stored.clone())
    }

    async fn reschedule(
        &self,
        cancelled: &Appointment,
        expected: AppointmentStatus,
        replacement: &Appointment,
    ) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.lock().await;
        guard_status(&appointments, &cancelled.id, expected)?;

        // the old booking is about to release its slot, so it cannot block the new one
        let blocked = appointments.values().any(|existing| {
            existing.id != cancelled.id
                && existing.is_live()
                && existing.doctor_id == replacement.doctor_id
                && existing.date == replacement.date
                && existing.start_time == replacement.start_time
        });
        if blocked {
            return Err(slot_conflict(replacement));
        }

        if let Some(stored) = appointments.get_mut(&cancelled.id) {
            apply_update(stored, cancelled);
        }
        appointments.insert(replacement.id.clone(), replacement.clone());
        Ok(replacement.clone())
    }

    async fn append_audit(&self, appointment_id: &str, entry: &AuditEntry) -> Result<(), DatabaseError> {
        let mut appointments = self.appointments.lock().await;
        let stored = appointments
            .get_mut(appointment_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("appointment {}", appointment_id)))?;
        stored.audit_log.push(entry.clone());
        Ok(())
    }
}
