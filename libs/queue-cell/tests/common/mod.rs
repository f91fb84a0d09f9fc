#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};

use appointment_cell::models::{Appointment, BookAppointmentRequest};
use appointment_cell::services::{
    AppointmentBookingService, Notification, NotificationDispatcher, NotificationError, NotificationKind, Notifier,
};
use appointment_cell::store::InMemoryAppointmentStore;
use queue_cell::services::QueueService;
use queue_cell::store::{InMemoryQueueStore, QueueStore};
use schedule_cell::models::{ClockTime, DoctorProfile, TimeRange, WeeklyAvailability};
use schedule_cell::services::ScheduleService;
use schedule_cell::store::InMemoryScheduleStore;
use shared_models::auth::User;
use shared_utils::test_utils::TestUser;
use shared_utils::FixedClock;

pub const DOCTOR_ID: &str = "doc-1";
pub const CLINIC_ID: &str = "clinic-1";

/// Generous enough that a burst of concurrent check-ins never runs out.
pub const WRITE_ATTEMPTS: u32 = 64;

pub fn t(value: &str) -> ClockTime {
    ClockTime::parse(value).unwrap()
}

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 5).unwrap()
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

pub fn doctor() -> User {
    TestUser::doctor("doctor@example.com", CLINIC_ID).with_id(DOCTOR_ID).to_user()
}

pub fn receptionist() -> User {
    TestUser::receptionist("desk@example.com", CLINIC_ID).to_user()
}

/// Every quarter hour from 10:00 to 13:45.
pub fn slot_starts() -> Vec<String> {
    (0..16)
        .map(|i| {
            let minutes = 10 * 60 + i * 15;
            format!("{:02}:{:02}", minutes / 60, minutes % 60)
        })
        .collect()
}

#[derive(Default)]
pub struct CapturingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl CapturingDispatcher {
    pub async fn wait_for(&self, kind: NotificationKind) -> Option<Notification> {
        for _ in 0..100 {
            let found = self.sent.lock().unwrap().iter().find(|n| n.kind == kind).cloned();
            if found.is_some() {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
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
    pub queue: Arc<QueueService>,
    pub queue_store: Arc<dyn QueueStore>,
    pub clock: Arc<FixedClock>,
    pub notifications: Arc<CapturingDispatcher>,
}

impl Harness {
    /// Monday 2030-03-04, 08:00 UTC.
    pub fn new() -> Self {
        let schedule_store = Arc::new(InMemoryScheduleStore::with_profiles([doctor_profile()]));
        let schedule = Arc::new(ScheduleService::new(schedule_store));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2030, 3, 4, 8, 0, 0).unwrap()));
        let notifications = Arc::new(CapturingDispatcher::default());
        let notifier = Notifier::new(notifications.clone());

        let booking = Arc::new(AppointmentBookingService::new(
            schedule,
            Arc::new(InMemoryAppointmentStore::new()),
            notifier.clone(),
            clock.clone(),
        ));
        let queue_store: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new());
        let queue = Arc::new(QueueService::new(
            booking.clone(),
            queue_store.clone(),
            notifier,
            clock.clone(),
            WRITE_ATTEMPTS,
        ));

        Self { booking, queue, queue_store, clock, notifications }
    }

    /// Confirmed walk-in booked at the desk.
    pub async fn appointment(&self, date: NaiveDate, start: &str) -> Appointment {
        let patient = TestUser::patient("patient@example.com");
        self.booking
            .request_booking(
                &receptionist(),
                BookAppointmentRequest {
                    patient_id: Some(patient.id.clone()),
                    doctor_id: DOCTOR_ID.to_string(),
                    date,
                    start_time: t(start),
                },
            )
            .await
            .unwrap()
    }
}
