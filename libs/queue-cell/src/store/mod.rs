use async_trait::async_trait;
use chrono::NaiveDate;

use shared_database::DatabaseError;

use crate::models::Queue;

pub mod memory;
pub mod supabase;

pub use memory::InMemoryQueueStore;
pub use supabase::SupabaseQueueStore;

/// One queue row per (doctor, date). Writers read, change, and write back
/// with the version they read; a lost race is `DatabaseError::StaleWrite`.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn get(&self, doctor_id: &str, date: NaiveDate) -> Result<Option<Queue>, DatabaseError>;

    /// Insert `queue` unless a row for its doctor and date exists; either way
    /// return the stored row.
    async fn create_if_absent(&self, queue: &Queue) -> Result<Queue, DatabaseError>;

    /// Replace the stored row if its version is still `expected_version`.
    async fn save(&self, queue: &Queue, expected_version: i64) -> Result<Queue, DatabaseError>;
}
