use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::models::{DayTemplate, ExceptionType, ScheduleException, WeeklyAvailability};

/// 0 = Sunday, matching `WeeklyAvailability::day_of_week`.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Work out a doctor's ranges for `date`. An exception always wins over the
/// weekly pattern; anything missing or empty means the doctor is closed.
pub fn resolve_day(
    weekly: &[WeeklyAvailability],
    date: NaiveDate,
    exception: Option<&ScheduleException>,
) -> DayTemplate {
    if let Some(exception) = exception {
        debug!("Exception {:?} applies on {}", exception.exception_type, date);
        return match exception.exception_type {
            ExceptionType::Holiday | ExceptionType::Leave => DayTemplate::Closed,
            ExceptionType::Override if exception.slots.is_empty() => DayTemplate::Closed,
            ExceptionType::Override => DayTemplate::Overridden(exception.slots.clone()),
        };
    }

    let weekday = day_of_week(date);
    match weekly.iter().find(|day| day.day_of_week == weekday) {
        Some(day) if day.is_available && !day.slots.is_empty() => DayTemplate::Normal(day.slots.clone()),
        _ => DayTemplate::Closed,
    }
}
