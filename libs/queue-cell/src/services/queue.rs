use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use appointment_cell::models::{Appointment, AppointmentStatus};
use appointment_cell::services::{AppointmentBookingService, NotificationKind, Notifier};
use schedule_cell::models::DoctorProfile;
use shared_database::DatabaseError;
use shared_models::auth::{User, ROLE_RECEPTIONIST};
use shared_utils::Clock;

use crate::models::{CallNextOutcome, Queue, QueueEntry, QueueEntryStatus, QueueError};
use crate::store::QueueStore;

pub struct QueueService {
    booking: Arc<AppointmentBookingService>,
    store: Arc<dyn QueueStore>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    max_write_attempts: u32,
}

impl QueueService {
    pub fn new(
        booking: Arc<AppointmentBookingService>,
        store: Arc<dyn QueueStore>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        max_write_attempts: u32,
    ) -> Self {
        Self {
            booking,
            store,
            notifier,
            clock,
            max_write_attempts: max_write_attempts.max(1),
        }
    }

    // ==============================================================================
    // OPERATIONS
    // ==============================================================================

    pub async fn check_in(&self, user: &User, appointment_id: &str) -> Result<QueueEntry, QueueError> {
        debug!("Check-in of appointment {} by {}", appointment_id, user.id);

        let appointment = self.booking.load(appointment_id).await?;
        let profile = self.booking.schedule().get_profile(&appointment.doctor_id).await?;
        self.ensure_can_operate(user, &profile)?;

        if !appointment.status.is_active() {
            return Err(QueueError::AppointmentNotActive(appointment.status));
        }

        let today = profile.local_today(self.clock.now());
        if appointment.date != today {
            warn!(
                "Appointment {} is on {}, rejected check-in for {}",
                appointment.id, appointment.date, today
            );
            return Err(QueueError::NotToday {
                date: appointment.date,
                today,
            });
        }

        let queue = self.load_or_open(&profile, today).await?;
        let (queue, entry) = self
            .mutate(queue, |queue, now| {
                queue.issue_token(&appointment.id, &appointment.patient_id, now)
            })
            .await?;

        info!(
            "Patient {} checked in for doctor {} with token {} ({} waiting)",
            entry.patient_id,
            queue.doctor_id,
            entry.token_number,
            queue.waiting_count()
        );
        Ok(entry)
    }

    pub async fn call_next(&self, user: &User, doctor_id: &str) -> Result<CallNextOutcome, QueueError> {
        debug!("Call next for doctor {} by {}", doctor_id, user.id);

        let profile = self.booking.schedule().get_profile(doctor_id).await?;
        self.ensure_can_operate(user, &profile)?;

        let today = profile.local_today(self.clock.now());
        let Some(queue) = self.store.get(doctor_id, today).await? else {
            return Ok(CallNextOutcome::QueueEmpty { current_token: 0 });
        };

        let (_, outcome) = self.mutate(queue, |queue, now| queue.call_next(now)).await?;

        match &outcome {
            CallNextOutcome::Called(entry) => {
                info!("Doctor {} called token {}", doctor_id, entry.token_number);
                self.notify_turn(entry).await;
            }
            CallNextOutcome::QueueEmpty { current_token } => {
                debug!("Queue for doctor {} is empty at token {}", doctor_id, current_token);
            }
        }

        Ok(outcome)
    }

    pub async fn update_patient_status(
        &self,
        user: &User,
        appointment_id: &str,
        status: QueueEntryStatus,
    ) -> Result<QueueEntry, QueueError> {
        debug!("Queue status of {} -> {} by {}", appointment_id, status, user.id);

        let appointment = self.booking.load(appointment_id).await?;
        let profile = self.booking.schedule().get_profile(&appointment.doctor_id).await?;
        self.ensure_can_operate(user, &profile)?;

        let queue = self
            .store
            .get(&appointment.doctor_id, appointment.date)
            .await?
            .ok_or(QueueError::NotFound)?;

        let (_, entry) = self
            .mutate(queue, |queue, now| queue.update_entry_status(appointment_id, status, now))
            .await?;

        info!("Token {} of doctor {} is now {}", entry.token_number, appointment.doctor_id, status);

        if status == QueueEntryStatus::Completed {
            self.complete_appointment(&appointment, &user.id).await;
        }

        Ok(entry)
    }

    /// Today's queue, or an empty one when nobody has checked in yet.
    pub async fn get_today(&self, user: &User, doctor_id: &str) -> Result<Queue, QueueError> {
        let profile = self.booking.schedule().get_profile(doctor_id).await?;
        self.ensure_can_operate(user, &profile)?;

        let now = self.clock.now();
        let today = profile.local_today(now);
        let queue = self.store.get(doctor_id, today).await?;

        Ok(queue.unwrap_or_else(|| Queue::new(doctor_id, &profile.clinic_id, today, now)))
    }

    // ==============================================================================
    // INTERNALS
    // ==============================================================================

    async fn load_or_open(&self, profile: &DoctorProfile, date: NaiveDate) -> Result<Queue, QueueError> {
        if let Some(queue) = self.store.get(&profile.doctor_id, date).await? {
            return Ok(queue);
        }
        let fresh = Queue::new(&profile.doctor_id, &profile.clinic_id, date, self.clock.now());
        Ok(self.store.create_if_absent(&fresh).await?)
    }

    /// Apply `change` and write the queue back against the version it was read
    /// at, re-reading and re-applying after each lost race.
    async fn mutate<T, F>(&self, mut queue: Queue, mut change: F) -> Result<(Queue, T), QueueError>
    where
        F: FnMut(&mut Queue, DateTime<Utc>) -> Result<T, QueueError> + Send,
        T: Send,
    {
        for attempt in 1..=self.max_write_attempts {
            let now = self.clock.now();
            let before = queue.clone();
            let result = change(&mut queue, now)?;

            if queue == before {
                return Ok((queue, result));
            }

            let expected = queue.version;
            queue.version += 1;
            queue.updated_at = now;

            match self.store.save(&queue, expected).await {
                Ok(saved) => return Ok((saved, result)),
                Err(DatabaseError::StaleWrite(msg)) => {
                    debug!(
                        "Queue for doctor {} changed underneath (attempt {}): {}",
                        queue.doctor_id, attempt, msg
                    );
                    queue = self
                        .store
                        .get(&queue.doctor_id, queue.date)
                        .await?
                        .ok_or(QueueError::NotFound)?;
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Gave up writing queue for doctor {} on {} after {} attempts",
            queue.doctor_id, queue.date, self.max_write_attempts
        );
        Err(QueueError::Busy)
    }

    async fn notify_turn(&self, entry: &QueueEntry) {
        match self.booking.load(&entry.appointment_id).await {
            Ok(appointment) => self.notifier.send(
                NotificationKind::YourTurn,
                &appointment,
                Some(format!("Token {} may go in now", entry.token_number)),
            ),
            Err(e) => warn!(
                "No turn notification for appointment {}: {}",
                entry.appointment_id, e
            ),
        }
    }

    /// Mirror a finished consultation onto the appointment.
    async fn complete_appointment(&self, appointment: &Appointment, performed_by: &str) {
        if let Err(e) = self
            .booking
            .apply_status(&appointment.id, AppointmentStatus::Completed, performed_by)
            .await
        {
            warn!(
                "Consultation for appointment {} finished but the appointment was not completed: {}",
                appointment.id, e
            );
        }
    }

    /// The doctor, a receptionist of the doctor's clinic, or an admin.
    fn ensure_can_operate(&self, user: &User, profile: &DoctorProfile) -> Result<(), QueueError> {
        let allowed = user.is_admin()
            || user.id == profile.doctor_id
            || (user.has_role(ROLE_RECEPTIONIST) && user.belongs_to_clinic(&profile.clinic_id));

        if allowed {
            Ok(())
        } else {
            warn!("User {} denied queue access for doctor {}", user.id, profile.doctor_id);
            Err(QueueError::Forbidden(
                "only the doctor or their clinic's reception can run this queue".to_string(),
            ))
        }
    }
}
