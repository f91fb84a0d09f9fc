use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use schedule_cell::models::ClockTime;
use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentStatus};

/// Redis list drained by the external delivery worker.
pub const NOTIFICATION_QUEUE_KEY: &str = "notifications:pending";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmation,
    StatusChanged,
    Cancelled,
    Rescheduled,
    YourTurn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub appointment_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub status: AppointmentStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn for_appointment(kind: NotificationKind, appointment: &Appointment, message: Option<String>) -> Self {
        Self {
            kind,
            appointment_id: appointment.id.clone(),
            patient_id: appointment.patient_id.clone(),
            doctor_id: appointment.doctor_id.clone(),
            date: appointment.date,
            start_time: appointment.start_time,
            status: appointment.status,
            message,
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Pushes notices onto `notifications:pending` for the delivery worker.
pub struct RedisNotificationDispatcher {
    pool: Pool,
}

impl RedisNotificationDispatcher {
    pub async fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| NotificationError::Pool(e.to_string()))?;

        let dispatcher = Self { pool };
        let mut conn = dispatcher.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification dispatcher initialized");

        Ok(dispatcher)
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| NotificationError::Pool(e.to_string()))
    }
}

#[async_trait]
impl NotificationDispatcher for RedisNotificationDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(notification)?;
        let mut conn = self.get_connection().await?;
        let _: () = conn.lpush(NOTIFICATION_QUEUE_KEY, payload).await?;
        debug!(
            "Queued {:?} notification for appointment {}",
            notification.kind, notification.appointment_id
        );
        Ok(())
    }
}

/// Used when Redis is not configured: notices only reach the log.
#[derive(Debug, Default)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            "Notification {:?} for patient {} (appointment {} on {} at {})",
            notification.kind,
            notification.patient_id,
            notification.appointment_id,
            notification.date,
            notification.start_time
        );
        Ok(())
    }
}

/// Fire-and-forget front for a dispatcher. Sends run on their own task and
/// failures are only logged.
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl Notifier {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn log_only() -> Self {
        Self::new(Arc::new(LogNotificationDispatcher))
    }

    pub fn send(&self, kind: NotificationKind, appointment: &Appointment, message: Option<String>) {
        let notification = Notification::for_appointment(kind, appointment, message);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(&notification).await {
                warn!(
                    "Failed to dispatch {:?} notification for appointment {}: {}",
                    notification.kind, notification.appointment_id, e
                );
            }
        });
    }
}
