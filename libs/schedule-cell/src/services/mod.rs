pub mod availability;
pub mod schedule;
pub mod slots;

pub use availability::{day_of_week, resolve_day};
pub use schedule::ScheduleService;
pub use slots::generate_slots;
