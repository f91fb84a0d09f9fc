use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::models::{ClockTime, DoctorProfile, Slot};
use schedule_cell::services::ScheduleService;
use shared_database::DatabaseError;
use shared_models::auth::{User, ROLE_DOCTOR};
use shared_utils::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AuditAction, AuditEntry, BookAppointmentRequest,
    BookingChannel, DaySlots, PaymentStatus, SlotView,
};
use crate::services::audit::AuditTrail;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::{NotificationKind, Notifier};
use crate::store::AppointmentStore;

pub struct AppointmentBookingService {
    pub(crate) schedule: Arc<ScheduleService>,
    pub(crate) store: Arc<dyn AppointmentStore>,
    pub(crate) audit: AuditTrail,
    pub(crate) notifier: Notifier,
    pub(crate) lifecycle: AppointmentLifecycleService,
    pub(crate) clock: Arc<dyn Clock>,
}

impl AppointmentBookingService {
    pub fn new(
        schedule: Arc<ScheduleService>,
        store: Arc<dyn AppointmentStore>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedule,
            audit: AuditTrail::new(store.clone()),
            store,
            notifier,
            lifecycle: AppointmentLifecycleService::new(),
            clock,
        }
    }

    pub fn schedule(&self) -> &ScheduleService {
        &self.schedule
    }

    /// Doctor-local "now".
    pub fn local_now(&self, profile: &DoctorProfile) -> NaiveDateTime {
        profile.local_now(self.clock.now())
    }

    // ==============================================================================
    // SLOTS
    // ==============================================================================

    /// Bookable grid for one day. Slots that already started are left out.
    pub async fn get_slots(&self, doctor_id: &str, date: NaiveDate) -> Result<DaySlots, AppointmentError> {
        debug!("Listing slots for doctor {} on {}", doctor_id, date);

        let profile = self.schedule.get_profile(doctor_id).await?;
        let (template, candidates) = self.schedule.candidate_slots(&profile, date).await?;
        let now = self.local_now(&profile);

        let booked: HashSet<ClockTime> = self
            .store
            .list_for_doctor_on(doctor_id, date)
            .await?
            .into_iter()
            .filter(Appointment::is_live)
            .map(|appointment| appointment.start_time)
            .collect();

        let slots = candidates
            .into_iter()
            .filter(|slot| slot.start_time.on(date) >= now)
            .map(|slot| SlotView {
                start_time: slot.start_time,
                end_time: slot.end_time,
                is_booked: booked.contains(&slot.start_time),
            })
            .collect();

        Ok(DaySlots {
            doctor_id: doctor_id.to_string(),
            date,
            is_available: template.is_available(),
            slots,
        })
    }

    /// The generated slot starting at `start_time`, provided it is still ahead.
    pub(crate) async fn validate_slot(
        &self,
        profile: &DoctorProfile,
        date: NaiveDate,
        start_time: ClockTime,
    ) -> Result<Slot, AppointmentError> {
        let (_, candidates) = self.schedule.candidate_slots(profile, date).await?;

        let slot = candidates
            .into_iter()
            .find(|slot| slot.start_time == start_time)
            .ok_or_else(|| {
                AppointmentError::InvalidSlot(format!(
                    "{} {} is not one of the doctor's slots",
                    date, start_time
                ))
            })?;

        if start_time.on(date) < self.local_now(profile) {
            return Err(AppointmentError::InvalidSlot(format!(
                "{} {} is in the past",
                date, start_time
            )));
        }

        Ok(slot)
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    pub async fn request_booking(
        &self,
        user: &User,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Booking request by {} for doctor {} at {} {}",
            user.id, request.doctor_id, request.date, request.start_time
        );

        let profile = self.schedule.get_profile(&request.doctor_id).await?;

        let (patient_id, channel) = if user.is_patient() {
            match request.patient_id.as_deref() {
                Some(patient_id) if patient_id != user.id => {
                    return Err(AppointmentError::Forbidden(
                        "patients can only book for themselves".to_string(),
                    ));
                }
                _ => (user.id.clone(), BookingChannel::Online),
            }
        } else if user.id == profile.doctor_id || self.is_clinic_staff(user, &profile.clinic_id) {
            let patient_id = request.patient_id.clone().ok_or_else(|| {
                AppointmentError::Validation("patient_id is required for walk-in bookings".to_string())
            })?;
            (patient_id, BookingChannel::WalkIn)
        } else {
            return Err(AppointmentError::Forbidden(
                "not allowed to book with this doctor".to_string(),
            ));
        };

        let slot = self.validate_slot(&profile, request.date, request.start_time).await?;

        let now = self.clock.now();
        let status = match channel {
            BookingChannel::Online => AppointmentStatus::Pending,
            BookingChannel::WalkIn => AppointmentStatus::Confirmed,
        };

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id,
            doctor_id: profile.doctor_id.clone(),
            clinic_id: profile.clinic_id.clone(),
            date: request.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status,
            payment_status: PaymentStatus::Pending,
            booked_by: user.id.clone(),
            channel,
            reschedule_count: 0,
            previous_appointment_id: None,
            cancelled_by: None,
            cancel_reason: None,
            audit_log: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let mut created = self.store.insert(&appointment).await.map_err(|e| {
            if e.is_conflict() {
                warn!(
                    "Slot {} {} for doctor {} lost to a concurrent booking",
                    appointment.date, appointment.start_time, appointment.doctor_id
                );
                AppointmentError::SlotAlreadyBooked
            } else {
                AppointmentError::Store(e)
            }
        })?;

        let entry = AuditEntry::new(AuditAction::Created, &user.id, now)
            .with_details(match channel {
                BookingChannel::Online => "online booking",
                BookingChannel::WalkIn => "walk-in booking",
            })
            .with_change(Value::Null, json!(created.status));
        self.audit.record(&mut created, entry).await;

        info!(
            "Appointment {} booked for patient {} with doctor {} at {} {}",
            created.id, created.patient_id, created.doctor_id, created.date, created.start_time
        );
        self.notifier.send(NotificationKind::BookingConfirmation, &created, None);

        Ok(created)
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    /// Fetch without a principal check.
    pub async fn load(&self, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn get_appointment(&self, user: &User, appointment_id: &str) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.ensure_can_access(user, &appointment)?;
        Ok(appointment)
    }

    pub async fn list_doctor_appointments(
        &self,
        user: &User,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let profile = self.schedule.get_profile(doctor_id).await?;
        if !(user.id == doctor_id || self.is_clinic_staff(user, &profile.clinic_id)) {
            return Err(AppointmentError::Forbidden(
                "only the doctor's clinic can list appointments".to_string(),
            ));
        }
        Ok(self.store.list_for_doctor_on(doctor_id, date).await?)
    }

    /// Owning doctor or platform admin.
    pub async fn get_audit(&self, user: &User, appointment_id: &str) -> Result<Vec<AuditEntry>, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !(user.is_admin() || (user.has_role(ROLE_DOCTOR) && user.id == appointment.doctor_id)) {
            warn!("User {} denied audit log of appointment {}", user.id, appointment_id);
            return Err(AppointmentError::Forbidden(
                "audit logs are restricted to the owning doctor".to_string(),
            ));
        }
        Ok(appointment.audit_log)
    }

    // ==============================================================================
    // STATUS CHANGES
    // ==============================================================================

    pub async fn update_status(
        &self,
        user: &User,
        appointment_id: &str,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !self.can_manage(user, &appointment) {
            return Err(AppointmentError::Forbidden(
                "only clinic staff can change appointment status".to_string(),
            ));
        }
        self.transition(appointment, new_status, &user.id, None).await
    }

    /// Status change on behalf of another component, without a principal check.
    pub async fn apply_status(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
        performed_by: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.transition(appointment, new_status, performed_by, None).await
    }

    pub async fn cancel(
        &self,
        user: &User,
        appointment_id: &str,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.ensure_can_access(user, &appointment)?;
        self.transition(appointment, AppointmentStatus::Cancelled, &user.id, reason).await
    }

    async fn transition(
        &self,
        current: Appointment,
        new_status: AppointmentStatus,
        performed_by: &str,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let now = self.clock.now();
        let mut next = current.clone();
        next.status = new_status;
        next.updated_at = now;
        if new_status == AppointmentStatus::Cancelled {
            next.cancelled_by = Some(performed_by.to_string());
            next.cancel_reason = reason.clone();
        }

        let mut updated = self
            .store
            .update_if_status(&next, current.status)
            .await
            .map_err(|e| self.lost_race(e, &current, new_status))?;
        let updated_status = updated.status;

        let mut entry = AuditEntry::new(AuditAction::from(new_status), performed_by, now)
            .with_change(json!(current.status), json!(updated_status));
        if let Some(reason) = reason {
            entry = entry.with_details(reason);
        }
        self.audit.record(&mut updated, entry).await;

        info!(
            "Appointment {} moved {} -> {} by {}",
            updated.id, current.status, updated.status, performed_by
        );

        let kind = match new_status {
            AppointmentStatus::Cancelled => NotificationKind::Cancelled,
            _ => NotificationKind::StatusChanged,
        };
        self.notifier.send(kind, &updated, None);

        Ok(updated)
    }

    /// A guarded write found the appointment in another state.
    pub(crate) fn lost_race(
        &self,
        error: DatabaseError,
        current: &Appointment,
        new_status: AppointmentStatus,
    ) -> AppointmentError {
        match error {
            DatabaseError::StaleWrite(msg) => {
                warn!("Concurrent change on appointment {}: {}", current.id, msg);
                AppointmentError::InvalidTransition {
                    from: current.status,
                    to: new_status,
                }
            }
            DatabaseError::NotFound(_) => AppointmentError::NotFound,
            other => AppointmentError::Store(other),
        }
    }

    pub async fn update_payment_status(
        &self,
        user: &User,
        appointment_id: &str,
        payment_status: PaymentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        if !self.can_manage(user, &current) {
            return Err(AppointmentError::Forbidden(
                "only clinic staff can change payment status".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut next = current.clone();
        next.payment_status = payment_status;
        next.updated_at = now;

        let mut updated = self
            .store
            .update_if_status(&next, current.status)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => AppointmentError::NotFound,
                other => AppointmentError::Store(other),
            })?;

        let entry = AuditEntry::new(AuditAction::Payment, &user.id, now)
            .with_change(json!(current.payment_status), json!(payment_status));
        self.audit.record(&mut updated, entry).await;

        info!(
            "Payment status of appointment {} set to {:?} by {}",
            updated.id, payment_status, user.id
        );
        Ok(updated)
    }

    // ==============================================================================
    // ACCESS RULES
    // ==============================================================================

    /// Doctors and receptionists of `clinic_id`, or any admin.
    pub(crate) fn is_clinic_staff(&self, user: &User, clinic_id: &str) -> bool {
        user.is_admin() || (user.is_staff() && user.belongs_to_clinic(clinic_id))
    }

    /// Staff who may change status or payment.
    pub(crate) fn can_manage(&self, user: &User, appointment: &Appointment) -> bool {
        user.id == appointment.doctor_id || self.is_clinic_staff(user, &appointment.clinic_id)
    }

    /// The patient themself, or staff who may manage the appointment.
    pub(crate) fn ensure_can_access(&self, user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
        if user.id == appointment.patient_id || self.can_manage(user, appointment) {
            return Ok(());
        }
        warn!("User {} denied access to appointment {}", user.id, appointment.id);
        Err(AppointmentError::Forbidden(
            "appointment belongs to another patient".to_string(),
        ))
    }
}
