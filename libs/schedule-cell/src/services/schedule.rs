use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{User, ROLE_DOCTOR};

use crate::models::{
    validate_weekly, CreateExceptionRequest, DayTemplate, DoctorProfile, ScheduleError,
    ScheduleException, Slot, WeeklyAvailability,
};
use crate::services::{availability::resolve_day, slots::generate_slots};
use crate::store::ScheduleStore;

pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Admins manage any schedule; doctors only their own.
    pub fn ensure_can_manage(&self, user: &User, doctor_id: &str) -> Result<(), ScheduleError> {
        if user.is_admin() || (user.has_role(ROLE_DOCTOR) && user.id == doctor_id) {
            return Ok(());
        }
        warn!("User {} may not manage schedule of doctor {}", user.id, doctor_id);
        Err(ScheduleError::Forbidden)
    }

    pub async fn get_profile(&self, doctor_id: &str) -> Result<DoctorProfile, ScheduleError> {
        let profile = self
            .store
            .get_profile(doctor_id)
            .await?
            .ok_or(ScheduleError::DoctorNotFound)?;
        profile.validate()?;
        Ok(profile)
    }

    pub async fn get_availability(&self, doctor_id: &str) -> Result<Vec<WeeklyAvailability>, ScheduleError> {
        let mut availability = self.get_profile(doctor_id).await?.availability;
        availability.sort_by_key(|day| day.day_of_week);
        Ok(availability)
    }

    pub async fn set_weekly_availability(
        &self,
        user: &User,
        doctor_id: &str,
        mut availability: Vec<WeeklyAvailability>,
    ) -> Result<Vec<WeeklyAvailability>, ScheduleError> {
        self.ensure_can_manage(user, doctor_id)?;
        validate_weekly(&availability)?;
        availability.sort_by_key(|day| day.day_of_week);

        let profile = self
            .store
            .put_weekly_availability(doctor_id, &availability)
            .await?
            .ok_or(ScheduleError::DoctorNotFound)?;

        info!("Weekly availability replaced for doctor {} by {}", doctor_id, user.id);
        Ok(profile.availability)
    }

    /// The doctor's working ranges on `date`, exceptions applied.
    pub async fn day_template(&self, profile: &DoctorProfile, date: NaiveDate) -> Result<DayTemplate, ScheduleError> {
        let exception = self.store.get_exception(&profile.doctor_id, date).await?;
        Ok(resolve_day(&profile.availability, date, exception.as_ref()))
    }

    /// Every slot the doctor offers on `date`, booked or not.
    pub async fn candidate_slots(
        &self,
        profile: &DoctorProfile,
        date: NaiveDate,
    ) -> Result<(DayTemplate, Vec<Slot>), ScheduleError> {
        let template = self.day_template(profile, date).await?;
        let slots = generate_slots(template.ranges(), profile.slot_duration, profile.buffer_time);
        debug!(
            "Doctor {} offers {} slots on {}",
            profile.doctor_id,
            slots.len(),
            date
        );
        Ok((template, slots))
    }

    pub async fn create_exception(
        &self,
        user: &User,
        doctor_id: &str,
        request: CreateExceptionRequest,
    ) -> Result<ScheduleException, ScheduleError> {
        self.ensure_can_manage(user, doctor_id)?;
        request.validate()?;

        if self.store.get_profile(doctor_id).await?.is_none() {
            return Err(ScheduleError::DoctorNotFound);
        }

        let exception = ScheduleException {
            id: Uuid::new_v4().to_string(),
            doctor_id: doctor_id.to_string(),
            date: request.date,
            exception_type: request.exception_type,
            slots: request.slots,
            reason: request.reason,
            created_at: Utc::now(),
        };

        let created = self.store.insert_exception(&exception).await.map_err(|e| {
            if e.is_conflict() {
                ScheduleError::ExceptionExists(exception.date)
            } else {
                ScheduleError::Store(e)
            }
        })?;

        info!(
            "Created {:?} exception {} for doctor {} on {}",
            created.exception_type, created.id, doctor_id, created.date
        );
        Ok(created)
    }

    pub async fn delete_exception(&self, user: &User, exception_id: &str) -> Result<(), ScheduleError> {
        let exception = self
            .store
            .get_exception_by_id(exception_id)
            .await?
            .ok_or(ScheduleError::ExceptionNotFound)?;

        self.ensure_can_manage(user, &exception.doctor_id)?;

        if !self.store.delete_exception(exception_id).await? {
            return Err(ScheduleError::ExceptionNotFound);
        }

        info!("Deleted exception {} for doctor {}", exception_id, exception.doctor_id);
        Ok(())
    }

    pub async fn list_exceptions(
        &self,
        user: &User,
        doctor_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ScheduleException>, ScheduleError> {
        self.ensure_can_manage(user, doctor_id)?;
        Ok(self.store.list_exceptions(doctor_id, from, to).await?)
    }
}
