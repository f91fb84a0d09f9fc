use chrono::{Duration, NaiveDateTime};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::models::DoctorProfile;
use shared_database::DatabaseError;
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AuditAction, AuditEntry, RescheduleAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::notification::NotificationKind;

pub const RESCHEDULE_REASON: &str = "rescheduled";

/// Whether `appointment` may still be moved at doctor-local time `now`.
pub fn check_reschedule_policy(
    appointment: &Appointment,
    profile: &DoctorProfile,
    now: NaiveDateTime,
) -> Result<(), AppointmentError> {
    if !appointment.status.is_active() {
        return Err(AppointmentError::NotReschedulable(appointment.status));
    }

    if appointment.reschedule_count >= profile.max_reschedules {
        return Err(AppointmentError::RescheduleLimitExceeded {
            max: profile.max_reschedules,
        });
    }

    let lead_time = appointment.starts_at() - now;
    if lead_time < Duration::hours(i64::from(profile.min_reschedule_hours)) {
        return Err(AppointmentError::TooLateToReschedule {
            min_hours: profile.min_reschedule_hours,
        });
    }

    Ok(())
}

impl AppointmentBookingService {
    /// Move an appointment to another slot: the old booking is cancelled and a
    /// linked replacement created in one store operation.
    pub async fn reschedule(
        &self,
        user: &User,
        appointment_id: &str,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Reschedule of {} to {} {} requested by {}",
            appointment_id, request.new_date, request.new_start_time, user.id
        );

        let current = self.load(appointment_id).await?;
        self.ensure_can_access(user, &current)?;

        let profile = self.schedule.get_profile(&current.doctor_id).await?;
        check_reschedule_policy(&current, &profile, self.local_now(&profile)).inspect_err(|e| {
            warn!("Reschedule of {} rejected: {}", appointment_id, e);
        })?;

        let slot = self
            .validate_slot(&profile, request.new_date, request.new_start_time)
            .await?;

        let now = self.clock.now();

        let mut cancelled = current.clone();
        cancelled.status = AppointmentStatus::Cancelled;
        cancelled.cancelled_by = Some(user.id.clone());
        cancelled.cancel_reason = Some(RESCHEDULE_REASON.to_string());
        cancelled.updated_at = now;

        let replacement = Appointment {
            id: Uuid::new_v4().to_string(),
            date: request.new_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            booked_by: user.id.clone(),
            reschedule_count: current.reschedule_count + 1,
            previous_appointment_id: Some(current.id.clone()),
            cancelled_by: None,
            cancel_reason: None,
            audit_log: Vec::new(),
            created_at: now,
            updated_at: now,
            ..current.clone()
        };

        let mut created = match self.store.reschedule(&cancelled, current.status, &replacement).await {
            Ok(created) => created,
            Err(DatabaseError::Conflict(_)) => return Err(AppointmentError::SlotAlreadyBooked),
            Err(DatabaseError::StaleWrite(msg)) => {
                warn!("Appointment {} changed during reschedule: {}", current.id, msg);
                let fresh = self.load(appointment_id).await?;
                return Err(AppointmentError::NotReschedulable(fresh.status));
            }
            Err(DatabaseError::NotFound(_)) => return Err(AppointmentError::NotFound),
            Err(other) => return Err(AppointmentError::Store(other)),
        };

        let old_slot = json!({ "date": current.date, "start_time": current.start_time });
        let new_slot = json!({ "date": created.date, "start_time": created.start_time });

        let cancel_entry = AuditEntry::new(AuditAction::Cancelled, &user.id, now)
            .with_details(RESCHEDULE_REASON)
            .with_change(json!(current.status), json!({ "status": "cancelled", "replaced_by": created.id }));
        self.audit.record(&mut cancelled, cancel_entry).await;

        let reschedule_entry = AuditEntry::new(AuditAction::Rescheduled, &user.id, now)
            .with_details(format!("moved from appointment {}", current.id))
            .with_change(old_slot, new_slot);
        self.audit.record(&mut created, reschedule_entry).await;

        info!(
            "Appointment {} rescheduled to {} ({} {}), count {}",
            current.id, created.id, created.date, created.start_time, created.reschedule_count
        );
        self.notifier.send(NotificationKind::Rescheduled, &created, None);

        Ok(created)
    }
}
