use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use shared_database::DatabaseError;

use crate::models::Queue;
use crate::store::QueueStore;

type QueueKey = (String, NaiveDate);

#[derive(Default)]
pub struct InMemoryQueueStore {
    queues: Mutex<HashMap<QueueKey, Queue>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(doctor_id: &str, date: NaiveDate) -> QueueKey {
    (doctor_id.to_string(), date)
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn get(&self, doctor_id: &str, date: NaiveDate) -> Result<Option<Queue>, DatabaseError> {
        Ok(self.queues.lock().await.get(&key(doctor_id, date)).cloned())
    }

    async fn create_if_absent(&self, queue: &Queue) -> Result<Queue, DatabaseError> {
        let mut queues = self.queues.lock().await;
        let stored = queues
            .entry(key(&queue.doctor_id, queue.date))
            .or_insert_with(|| queue.clone());
        Ok(stored.clone())
    }

    async fn save(&self, queue: &Queue, expected_version: i64) -> Result<Queue, DatabaseError> {
        let mut queues = self.queues.lock().await;
        let stored = queues
            .get_mut(&key(&queue.doctor_id, queue.date))
            .ok_or_else(|| DatabaseError::NotFound(format!("queue for doctor {} on {}", queue.doctor_id, queue.date)))?;

        if stored.version != expected_version {
            return Err(DatabaseError::StaleWrite(format!(
                "queue version is {}, expected {}",
                stored.version, expected_version
            )));
        }

        *stored = queue.clone();
        Ok(stored.clone())
    }
}
