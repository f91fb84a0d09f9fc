use std::sync::Arc;

use schedule_cell::services::ScheduleService;
use shared_config::AppConfig;
use shared_utils::Clock;

use crate::services::{AppointmentBookingService, Notifier};
use crate::store::AppointmentStore;

pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        schedule: Arc<ScheduleService>,
        store: Arc<dyn AppointmentStore>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            booking: Arc::new(AppointmentBookingService::new(schedule, store, notifier, clock)),
        }
    }
}
