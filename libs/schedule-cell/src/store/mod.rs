use async_trait::async_trait;
use chrono::NaiveDate;

use shared_database::DatabaseError;

use crate::models::{DoctorProfile, ScheduleException, WeeklyAvailability};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryScheduleStore;
pub use supabase::SupabaseScheduleStore;

/// Persistence for doctor scheduling data. `insert_exception` must reject a
/// second exception for the same (doctor, date) with `DatabaseError::Conflict`.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get_profile(&self, doctor_id: &str) -> Result<Option<DoctorProfile>, DatabaseError>;

    /// Replace the weekly pattern. `None` when the doctor does not exist.
    async fn put_weekly_availability(
        &self,
        doctor_id: &str,
        availability: &[WeeklyAvailability],
    ) -> Result<Option<DoctorProfile>, DatabaseError>;

    async fn get_exception(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ScheduleException>, DatabaseError>;

    async fn get_exception_by_id(&self, exception_id: &str) -> Result<Option<ScheduleException>, DatabaseError>;

    async fn insert_exception(&self, exception: &ScheduleException) -> Result<ScheduleException, DatabaseError>;

    /// `false` when nothing was deleted.
    async fn delete_exception(&self, exception_id: &str) -> Result<bool, DatabaseError>;

    /// Ordered by date; both bounds inclusive.
    async fn list_exceptions(
        &self,
        doctor_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ScheduleException>, DatabaseError>;
}
