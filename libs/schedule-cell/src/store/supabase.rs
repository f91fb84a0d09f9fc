use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{supabase::SupabaseClient, DatabaseError};

use crate::models::{DoctorProfile, ScheduleException, WeeklyAvailability};
use crate::store::ScheduleStore;

const PROFILE_COLUMNS: &str =
    "id,clinic_id,slot_duration,buffer_time,timezone,max_reschedules,min_reschedule_hours,availability";

/// Scheduling data in the `doctors` and `schedule_exceptions` tables. The
/// (doctor_id, date) unique key on `schedule_exceptions` turns a duplicate
/// insert into a 409.
pub struct SupabaseScheduleStore {
    supabase: SupabaseClient,
}

impl SupabaseScheduleStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn get_profile(&self, doctor_id: &str) -> Result<Option<DoctorProfile>, DatabaseError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, PROFILE_COLUMNS);
        let rows: Vec<DoctorProfile> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn put_weekly_availability(
        &self,
        doctor_id: &str,
        availability: &[WeeklyAvailability],
    ) -> Result<Option<DoctorProfile>, DatabaseError> {
        debug!("Replacing weekly availability for doctor {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, PROFILE_COLUMNS);
        let rows: Vec<DoctorProfile> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "availability": availability })),
                Some(SupabaseClient::representation()),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_exception(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScheduleException>, DatabaseError> {
        let path = format!(
            "/rest/v1/schedule_exceptions?doctor_id=eq.{}&date=eq.{}",
            doctor_id, date
        );
        let rows: Vec<ScheduleException> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn get_exception_by_id(&self, exception_id: &str) -> Result<Option<ScheduleException>, DatabaseError> {
        let path = format!("/rest/v1/schedule_exceptions?id=eq.{}", exception_id);
        let rows: Vec<ScheduleException> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_exception(&self, exception: &ScheduleException) -> Result<ScheduleException, DatabaseError> {
        let rows: Vec<ScheduleException> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/schedule_exceptions",
                Some(serde_json::to_value(exception)?),
                Some(SupabaseClient::representation()),
            )
            .await?;

        rows.into_iter().next().ok_or_else(|| DatabaseError::Api {
            status: 200,
            message: "insert returned no row".to_string(),
        })
    }

    async fn delete_exception(&self, exception_id: &str) -> Result<bool, DatabaseError> {
        let path = format!("/rest/v1/schedule_exceptions?id=eq.{}", exception_id);
        let rows: Vec<ScheduleException> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, Some(SupabaseClient::representation()))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_exceptions(
        &self,
        doctor_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ScheduleException>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/schedule_exceptions?doctor_id=eq.{}&order=date.asc",
            doctor_id
        );
        if let Some(from) = from {
            path.push_str(&format!("&date=gte.{}", from));
        }
        if let Some(to) = to {
            path.push_str(&format!("&date=lte.{}", to));
        }

        self.supabase.request(Method::GET, &path, None).await
    }
}
