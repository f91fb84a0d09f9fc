use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::ScheduleService;
use crate::store::ScheduleStore;

pub struct ScheduleCellState {
    pub config: Arc<AppConfig>,
    pub schedule: Arc<ScheduleService>,
}

impl ScheduleCellState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            config,
            schedule: Arc::new(ScheduleService::new(store)),
        }
    }
}
