use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use shared_database::DatabaseError;

use crate::models::{DoctorProfile, ScheduleException, WeeklyAvailability};
use crate::store::ScheduleStore;

#[derive(Default)]
struct ScheduleData {
    profiles: HashMap<String, DoctorProfile>,
    exceptions: Vec<ScheduleException>,
}

/// Process-local store. The (doctor, date) uniqueness check and the insert
/// run under the same lock.
#[derive(Default)]
pub struct InMemoryScheduleStore {
    data: Mutex<ScheduleData>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = DoctorProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.doctor_id.clone(), profile))
            .collect();
        Self {
            data: Mutex::new(ScheduleData { profiles, exceptions: Vec::new() }),
        }
    }

    pub async fn upsert_profile(&self, profile: DoctorProfile) {
        self.data.lock().await.profiles.insert(profile.doctor_id.clone(), profile);
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get_profile(&self, doctor_id: &str) -> Result<Option<DoctorProfile>, DatabaseError> {
        Ok(self.data.lock().await.profiles.get(doctor_id).cloned())
    }

    async fn put_weekly_availability(
        &self,
        doctor_id: &str,
        availability: &[WeeklyAvailability],
    ) -> Result<Option<DoctorProfile>, DatabaseError> {
        let mut data = self.data.lock().await;
        Ok(data.profiles.get_mut(doctor_id).map(|profile| {
            profile.availability = availability.to_vec();
            profile.clone()
        }))
    }

    async fn get_exception(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScheduleException>, DatabaseError> {
        let data = self.data.lock().await;
        Ok(data
            .exceptions
            .iter()
            .find(|exception| exception.doctor_id == doctor_id && exception.date == date)
            .cloned())
    }

    async fn get_exception_by_id(&self, exception_id: &str) -> Result<Option<ScheduleException>, DatabaseError> {
        let data = self.data.lock().await;
        Ok(data.exceptions.iter().find(|exception| exception.id == exception_id).cloned())
    }

    async fn insert_exception(&self, exception: &ScheduleException) -> Result<ScheduleException, DatabaseError> {
        let mut data = self.data.lock().await;
        let clash = data
            .exceptions
            .iter()
            .any(|existing| existing.doctor_id == exception.doctor_id && existing.date == exception.date);
        if clash {
            return Err(DatabaseError::Conflict(format!(
                "schedule_exceptions (doctor_id, date)=({}, {}) already exists",
                exception.doctor_id, exception.date
            )));
        }

        data.exceptions.push(exception.clone());
        Ok(exception.clone())
    }

    async fn delete_exception(&self, exception_id: &str) -> Result<bool, DatabaseError> {
        let mut data = self.data.lock().await;
        let before = data.exceptions.len();
        data.exceptions.retain(|exception| exception.id != exception_id);
        Ok(data.exceptions.len() != before)
    }

    async fn list_exceptions(
        &self,
        doctor_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ScheduleException>, DatabaseError> {
        let data = self.data.lock().await;
        let mut exceptions: Vec<ScheduleException> = data
            .exceptions
            .iter()
            .filter(|exception| exception.doctor_id == doctor_id)
            .filter(|exception| from.map_or(true, |from| exception.date >= from))
            .filter(|exception| to.map_or(true, |to| exception.date <= to))
            .cloned()
            .collect();
        exceptions.sort_by_key(|exception| exception.date);
        Ok(exceptions)
    }
}
