use async_trait::async_trait;
use chrono::NaiveDate;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentStatus, AuditEntry};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// Appointment persistence. Implementations guarantee that at most one live
/// (non-cancelled) appointment holds a (doctor, date, start time) slot: a
/// losing insert fails with `DatabaseError::Conflict`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;

    async fn get(&self, appointment_id: &str) -> Result<Option<Appointment>, DatabaseError>;

    /// Ordered by start time.
    async fn list_for_doctor_on(&self, doctor_id: &str, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError>;

    /// Write the mutable fields of `appointment` only if the stored status is
    /// still `expected`; otherwise `DatabaseError::StaleWrite`.
    async fn update_if_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError>;

    /// Cancel `cancelled` (guarded like `update_if_status`) and insert
    /// `replacement` as one unit. Nothing changes if either half fails.
    async fn reschedule(
        &self,
        cancelled: &Appointment,
        expected: AppointmentStatus,
        replacement: &Appointment,
    ) -> Result<Appointment, DatabaseError>;

    async fn append_audit(&self, appointment_id: &str, entry: &AuditEntry) -> Result<(), DatabaseError>;
}
