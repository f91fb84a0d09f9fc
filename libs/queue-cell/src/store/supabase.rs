use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{supabase::SupabaseClient, DatabaseError};

use crate::models::Queue;
use crate::store::QueueStore;

/// `queues` table: one row per doctor-day, entries kept in a jsonb array and
/// writes guarded by the `version` column.
pub struct SupabaseQueueStore {
    supabase: SupabaseClient,
}

impl SupabaseQueueStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn path(doctor_id: &str, date: NaiveDate) -> String {
        format!("/rest/v1/queues?doctor_id=eq.{}&date=eq.{}", doctor_id, date)
    }
}

#[async_trait]
impl QueueStore for SupabaseQueueStore {
    async fn get(&self, doctor_id: &str, date: NaiveDate) -> Result<Option<Queue>, DatabaseError> {
        let rows: Vec<Queue> = self
            .supabase
            .request(Method::GET, &Self::path(doctor_id, date), None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_if_absent(&self, queue: &Queue) -> Result<Queue, DatabaseError> {
        let rows: Vec<Queue> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/queues?on_conflict=doctor_id,date",
                Some(serde_json::to_value(queue)?),
                Some(SupabaseClient::ignore_duplicates()),
            )
            .await?;

        if let Some(created) = rows.into_iter().next() {
            debug!("Opened queue for doctor {} on {}", created.doctor_id, created.date);
            return Ok(created);
        }

        // another writer opened it first
        self.get(&queue.doctor_id, queue.date).await?.ok_or_else(|| {
            DatabaseError::NotFound(format!("queue for doctor {} on {}", queue.doctor_id, queue.date))
        })
    }

    async fn save(&self, queue: &Queue, expected_version: i64) -> Result<Queue, DatabaseError> {
        let path = format!("{}&version=eq.{}", Self::path(&queue.doctor_id, queue.date), expected_version);
        let body = json!({
            "current_token": queue.current_token,
            "total_tokens_issued": queue.total_tokens_issued,
            "patients": queue.patients,
            "version": queue.version,
            "updated_at": queue.updated_at
        });

        let rows: Vec<Queue> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(body), Some(SupabaseClient::representation()))
            .await?;

        match rows.into_iter().next() {
            Some(saved) => Ok(saved),
            None => match self.get(&queue.doctor_id, queue.date).await? {
                Some(stored) => Err(DatabaseError::StaleWrite(format!(
                    "queue version is {}, expected {}",
                    stored.version, expected_version
                ))),
                None => Err(DatabaseError::NotFound(format!(
                    "queue for doctor {} on {}",
                    queue.doctor_id, queue.date
                ))),
            },
        }
    }
}
