#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};

use appointment_cell::models::{Appointment, AppointmentError, BookAppointmentRequest};
use appointment_cell::services::{
    AppointmentBookingService, Notification, NotificationDispatcher, NotificationError, NotificationKind, Notifier,
};
use appointment_cell::store::{AppointmentStore, InMemoryAppointmentStore};
use schedule_cell::models::{ClockTime, DoctorProfile, TimeRange, WeeklyAvailability};
use schedule_cell::services::ScheduleService;
use schedule_cell::store::InMemoryScheduleStore;
use shared_models::auth::User;
use shared_utils::test_utils::TestUser;
use shared_utils::FixedClock;

pub const DOCTOR_ID: &str = "doc-1";
pub const CLINIC_ID: &str = "clinic-1";

pub fn t(value: &str) -> ClockTime {
    ClockTime::parse(value).unwrap()
}

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 5).unwrap()
}

pub fn next_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 11).unwrap()
}

/// Weekdays 10:00-14:00 in 15 minute slots, UTC.
pub fn doctor_profile() -> DoctorProfile {
    let mut profile = DoctorProfile::new(DOCTOR_ID, CLINIC_ID);
    profile.availability = (1..=5)
        .map(|day| WeeklyAvailability {
            day_of_week: day,
            is_available: true,
            slots: vec![TimeRange::new(t("10:00"), t("14:00"))],
        })
        .collect();
    profile
}

pub fn patient() -> User {
    TestUser::patient("patient@example.com").to_user()
}

pub fn doctor() -> User {
    TestUser::doctor("doctor@example.com", CLINIC_ID).with_id(DOCTOR_ID).to_user()
}

pub fn receptionist() -> User {
    TestUser::receptionist("desk@example.com", CLINIC_ID).to_user()
}

pub fn admin() -> User {
    TestUser::admin("admin@example.com").to_user()
}

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct CapturingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl CapturingDispatcher {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    /// Notifications are sent from spawned tasks; give them a moment to land.
    pub async fn wait_for(&self, count: usize) -> Vec<NotificationKind> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.kinds()
    }
}

#[async_trait]
impl NotificationDispatcher for CapturingDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub booking: Arc<AppointmentBookingService>,
    pub schedule: Arc<ScheduleService>,
    pub schedule_store: Arc<InMemoryScheduleStore>,
    pub store: Arc<dyn AppointmentStore>,
    pub clock: Arc<FixedClock>,
    pub notifications: Arc<CapturingDispatcher>,
}

impl Harness {
    /// Monday 2030-03-04, 08:00 UTC.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryAppointmentStore::new()))
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>) -> Self {
        Self::with_profile(doctor_profile(), store)
    }

    pub fn with_profile(profile: DoctorProfile, store: Arc<dyn AppointmentStore>) -> Self {
        let schedule_store = Arc::new(InMemoryScheduleStore::with_profiles([profile]));
        let schedule = Arc::new(ScheduleService::new(schedule_store.clone()));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2030, 3, 4, 8, 0, 0).unwrap()));
        let notifications = Arc::new(CapturingDispatcher::default());

        let booking = Arc::new(AppointmentBookingService::new(
            schedule.clone(),
            store.clone(),
            Notifier::new(notifications.clone()),
            clock.clone(),
        ));

        Self { booking, schedule, schedule_store, store, clock, notifications }
    }

    pub fn set_time(&self, hour: u32, minute: u32) {
        self.clock.set(Utc.with_ymd_and_hms(2030, 3, 4, hour, minute, 0).unwrap());
    }

    pub async fn book(&self, user: &User, date: NaiveDate, start: &str) -> Result<Appointment, AppointmentError> {
        self.booking
            .request_booking(
                user,
                BookAppointmentRequest {
                    patient_id: None,
                    doctor_id: DOCTOR_ID.to_string(),
                    date,
                    start_time: t(start),
                },
            )
            .await
    }

    pub async fn book_walk_in(
        &self,
        staff: &User,
        patient_id: &str,
        date: NaiveDate,
        start: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.booking
            .request_booking(
                staff,
                BookAppointmentRequest {
                    patient_id: Some(patient_id.to_string()),
                    doctor_id: DOCTOR_ID.to_string(),
                    date,
                    start_time: t(start),
                },
            )
            .await
    }
}
