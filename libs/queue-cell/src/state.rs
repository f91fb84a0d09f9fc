use std::sync::Arc;

use appointment_cell::services::{AppointmentBookingService, Notifier};
use shared_config::AppConfig;
use shared_utils::Clock;

use crate::services::QueueService;
use crate::store::QueueStore;

pub struct QueueCellState {
    pub config: Arc<AppConfig>,
    pub queue: Arc<QueueService>,
}

impl QueueCellState {
    pub fn new(
        config: Arc<AppConfig>,
        booking: Arc<AppointmentBookingService>,
        store: Arc<dyn QueueStore>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let retries = config.queue_write_retries;
        Self {
            config,
            queue: Arc::new(QueueService::new(booking, store, notifier, clock, retries)),
        }
    }
}
