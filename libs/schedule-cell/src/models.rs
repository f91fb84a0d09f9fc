use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use shared_database::DatabaseError;

pub const ALLOWED_SLOT_DURATIONS: [u32; 7] = [5, 10, 15, 20, 30, 45, 60];

const MINUTES_PER_DAY: u32 = 24 * 60;

static CLOCK_TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("clock time pattern is valid"));

// ==============================================================================
// WALL-CLOCK TIME
// ==============================================================================

/// Minutes since midnight, written as "HH:mm" (24 hour) on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes as u16))
    }

    /// Truncates seconds.
    pub fn of(datetime: &NaiveDateTime) -> Self {
        Self((datetime.hour() * 60 + datetime.minute()) as u16)
    }

    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.minutes() / 60, self.minutes() % 60, 0).unwrap_or(NaiveTime::MIN)
    }

    /// This wall-clock time on `date`.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }

    pub fn parse(value: &str) -> Result<Self, ScheduleError> {
        let captures = CLOCK_TIME_PATTERN
            .captures(value)
            .ok_or_else(|| ScheduleError::Validation(format!("'{}' is not a HH:mm time", value)))?;

        let hour: u32 = captures[1].parse().unwrap_or_default();
        let minute: u32 = captures[2].parse().unwrap_or_default();

        Self::from_hm(hour, minute)
            .ok_or_else(|| ScheduleError::Validation(format!("'{}' is not a HH:mm time", value)))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl TimeRange {
    pub fn new(start_time: ClockTime, end_time: ClockTime) -> Self {
        Self { start_time, end_time }
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.end_time <= self.start_time {
            return Err(ScheduleError::Validation(format!(
                "range {}-{} must end after it starts",
                self.start_time, self.end_time
            )));
        }
        Ok(())
    }
}

/// Every range valid on its own and none overlapping another.
pub fn validate_ranges(ranges: &[TimeRange]) -> Result<(), ScheduleError> {
    for range in ranges {
        range.validate()?;
    }

    let mut sorted: Vec<&TimeRange> = ranges.iter().collect();
    sorted.sort_by_key(|range| range.start_time);
    for pair in sorted.windows(2) {
        if pair[1].start_time < pair[0].end_time {
            return Err(ScheduleError::Validation(format!(
                "ranges {}-{} and {}-{} overlap",
                pair[0].start_time, pair[0].end_time, pair[1].start_time, pair[1].end_time
            )));
        }
    }

    Ok(())
}

// ==============================================================================
// RECURRING AVAILABILITY AND EXCEPTIONS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub is_available: bool,
    #[serde(default)]
    pub slots: Vec<TimeRange>,
}

impl WeeklyAvailability {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.day_of_week > 6 {
            return Err(ScheduleError::Validation(format!(
                "day_of_week {} is outside 0-6",
                self.day_of_week
            )));
        }
        if self.is_available && self.slots.is_empty() {
            return Err(ScheduleError::Validation(format!(
                "day {} is marked available but has no slots",
                self.day_of_week
            )));
        }
        validate_ranges(&self.slots)
    }
}

/// Validate a full weekly pattern: each day well-formed, at most one entry per weekday.
pub fn validate_weekly(days: &[WeeklyAvailability]) -> Result<(), ScheduleError> {
    let mut seen = [false; 7];
    for day in days {
        day.validate()?;
        let index = usize::from(day.day_of_week);
        if seen[index] {
            return Err(ScheduleError::Validation(format!(
                "day_of_week {} appears more than once",
                day.day_of_week
            )));
        }
        seen[index] = true;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionType {
    Holiday,
    Leave,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub exception_type: ExceptionType,
    #[serde(default)]
    pub slots: Vec<TimeRange>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExceptionRequest {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub exception_type: ExceptionType,
    #[serde(default)]
    pub slots: Vec<TimeRange>,
    pub reason: Option<String>,
}

impl CreateExceptionRequest {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.exception_type != ExceptionType::Override && !self.slots.is_empty() {
            return Err(ScheduleError::Validation(
                "only override exceptions may carry slots".to_string(),
            ));
        }
        validate_ranges(&self.slots)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAvailabilityRequest {
    pub availability: Vec<WeeklyAvailability>,
}

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

fn default_slot_duration() -> u32 {
    15
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_max_reschedules() -> u32 {
    2
}

fn default_min_reschedule_hours() -> u32 {
    2
}

/// Scheduling view of a doctor, owned by profile management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    #[serde(alias = "id")]
    pub doctor_id: String,
    pub clinic_id: String,
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u32,
    #[serde(default)]
    pub buffer_time: u32,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_max_reschedules")]
    pub max_reschedules: u32,
    #[serde(default = "default_min_reschedule_hours")]
    pub min_reschedule_hours: u32,
    #[serde(default)]
    pub availability: Vec<WeeklyAvailability>,
}

impl DoctorProfile {
    pub fn new(doctor_id: impl Into<String>, clinic_id: impl Into<String>) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            clinic_id: clinic_id.into(),
            slot_duration: default_slot_duration(),
            buffer_time: 0,
            timezone: default_timezone(),
            max_reschedules: default_max_reschedules(),
            min_reschedule_hours: default_min_reschedule_hours(),
            availability: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !ALLOWED_SLOT_DURATIONS.contains(&self.slot_duration) {
            return Err(ScheduleError::InvalidProfile(format!(
                "slot duration {} is not one of {:?}",
                self.slot_duration, ALLOWED_SLOT_DURATIONS
            )));
        }
        validate_weekly(&self.availability)
            .map_err(|e| ScheduleError::InvalidProfile(e.to_string()))
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "Doctor {} has unknown timezone '{}', using UTC",
                self.doctor_id, self.timezone
            );
            Tz::UTC
        })
    }

    /// Wall-clock time at the doctor's location.
    pub fn local_now(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.tz()).naive_local()
    }

    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_now(now).date()
    }

    pub fn weekly_for(&self, day_of_week: u8) -> Option<&WeeklyAvailability> {
        self.availability.iter().find(|day| day.day_of_week == day_of_week)
    }
}

// ==============================================================================
// RESOLVED DAY AND SLOTS
// ==============================================================================

/// A doctor's working ranges for one date after exceptions are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayTemplate {
    Normal(Vec<TimeRange>),
    Closed,
    Overridden(Vec<TimeRange>),
}

impl DayTemplate {
    pub fn ranges(&self) -> &[TimeRange] {
        match self {
            DayTemplate::Normal(ranges) | DayTemplate::Overridden(ranges) => ranges,
            DayTemplate::Closed => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        !self.ranges().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveAvailability {
    pub is_available: bool,
    pub effective_slots: Vec<TimeRange>,
}

impl From<&DayTemplate> for EffectiveAvailability {
    fn from(template: &DayTemplate) -> Self {
        Self {
            is_available: template.is_available(),
            effective_slots: template.ranges().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Schedule exception not found")]
    ExceptionNotFound,

    #[error("An exception already exists for this doctor on {0}")]
    ExceptionExists(NaiveDate),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Doctor profile is unusable for scheduling: {0}")]
    InvalidProfile(String),

    #[error("Not allowed to manage this doctor's schedule")]
    Forbidden,

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn t(value: &str) -> ClockTime {
        ClockTime::parse(value).unwrap()
    }

    #[test]
    fn test_clock_time_round_trips_through_json() {
        let range: TimeRange =
            serde_json::from_str(r#"{"start_time":"09:05","end_time":"17:30"}"#).unwrap();
        assert_eq!(range.start_time.minutes(), 9 * 60 + 5);
        assert_eq!(serde_json::to_value(range).unwrap()["end_time"], "17:30");
    }

    #[test]
    fn test_clock_time_rejects_loose_formats() {
        for value in ["9:00", "24:00", "12:60", "12:00:00", "noon"] {
            assert_matches!(ClockTime::parse(value), Err(ScheduleError::Validation(_)), "{}", value);
        }
    }

    #[test]
    fn test_available_day_requires_slots() {
        let day = WeeklyAvailability { day_of_week: 1, is_available: true, slots: vec![] };
        assert_matches!(day.validate(), Err(ScheduleError::Validation(_)));

        let closed = WeeklyAvailability { day_of_week: 0, is_available: false, slots: vec![] };
        assert!(closed.validate().is_ok());
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let ranges = [
            TimeRange::new(t("09:00"), t("12:00")),
            TimeRange::new(t("11:30"), t("13:00")),
        ];
        assert_matches!(validate_ranges(&ranges), Err(ScheduleError::Validation(_)));

        let touching = [
            TimeRange::new(t("09:00"), t("12:00")),
            TimeRange::new(t("12:00"), t("13:00")),
        ];
        assert!(validate_ranges(&touching).is_ok());
    }

    #[test]
    fn test_duplicate_weekday_rejected() {
        let monday = WeeklyAvailability {
            day_of_week: 1,
            is_available: true,
            slots: vec![TimeRange::new(t("09:00"), t("10:00"))],
        };
        assert_matches!(
            validate_weekly(&[monday.clone(), monday]),
            Err(ScheduleError::Validation(_))
        );
    }

    #[test]
    fn test_holiday_cannot_carry_slots() {
        let request = CreateExceptionRequest {
            date: NaiveDate::from_ymd_opt(2030, 3, 4).unwrap(),
            exception_type: ExceptionType::Holiday,
            slots: vec![TimeRange::new(t("09:00"), t("10:00"))],
            reason: None,
        };
        assert_matches!(request.validate(), Err(ScheduleError::Validation(_)));
    }

    #[test]
    fn test_profile_defaults_from_sparse_row() {
        let profile: DoctorProfile =
            serde_json::from_str(r#"{"id":"doc-1","clinic_id":"clinic-1"}"#).unwrap();
        assert_eq!(profile.doctor_id, "doc-1");
        assert_eq!(profile.slot_duration, 15);
        assert_eq!(profile.buffer_time, 0);
        assert_eq!(profile.max_reschedules, 2);
        assert_eq!(profile.min_reschedule_hours, 2);
        assert_eq!(profile.timezone, "UTC");
    }

    #[test]
    fn test_profile_rejects_odd_slot_duration() {
        let mut profile = DoctorProfile::new("doc-1", "clinic-1");
        profile.slot_duration = 7;
        assert_matches!(profile.validate(), Err(ScheduleError::InvalidProfile(_)));
    }

    #[test]
    fn test_local_now_follows_doctor_timezone() {
        let mut profile = DoctorProfile::new("doc-1", "clinic-1");
        profile.timezone = "Asia/Kolkata".to_string();

        let now = Utc.with_ymd_and_hms(2030, 3, 4, 20, 0, 0).unwrap();
        let local = profile.local_now(now);
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2030, 3, 5).unwrap());
        assert_eq!(ClockTime::of(&local), t("01:30"));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let mut profile = DoctorProfile::new("doc-1", "clinic-1");
        profile.timezone = "Mars/Olympus".to_string();
        assert_eq!(profile.tz(), Tz::UTC);
    }
}
