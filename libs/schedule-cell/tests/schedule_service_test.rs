use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;

use schedule_cell::models::*;
use schedule_cell::services::ScheduleService;
use schedule_cell::store::InMemoryScheduleStore;
use shared_utils::test_utils::TestUser;

const DOCTOR_ID: &str = "doc-1";
const CLINIC_ID: &str = "clinic-1";

fn t(value: &str) -> ClockTime {
    ClockTime::parse(value).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
}

fn profile() -> DoctorProfile {
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

fn service() -> ScheduleService {
    ScheduleService::new(Arc::new(InMemoryScheduleStore::with_profiles([profile()])))
}

fn doctor() -> TestUser {
    TestUser::doctor("doc@example.com", CLINIC_ID).with_id(DOCTOR_ID)
}

fn closure(date: NaiveDate, exception_type: ExceptionType) -> CreateExceptionRequest {
    CreateExceptionRequest { date, exception_type, slots: vec![], reason: Some("conference".to_string()) }
}

#[tokio::test]
async fn test_candidate_slots_follow_weekly_pattern() {
    let service = service();
    let profile = service.get_profile(DOCTOR_ID).await.unwrap();

    let (template, slots) = service.candidate_slots(&profile, monday()).await.unwrap();

    assert!(template.is_available());
    assert_eq!(slots.len(), 16);
    assert_eq!(slots.last().unwrap().end_time, t("14:00"));
}

#[tokio::test]
async fn test_empty_override_closes_the_day() {
    let service = service();
    let user = doctor().to_user();

    service
        .create_exception(&user, DOCTOR_ID, closure(monday(), ExceptionType::Override))
        .await
        .unwrap();

    let profile = service.get_profile(DOCTOR_ID).await.unwrap();
    let (template, slots) = service.candidate_slots(&profile, monday()).await.unwrap();
    assert_eq!(template, DayTemplate::Closed);
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_second_exception_on_same_date_is_rejected() {
    let service = service();
    let user = doctor().to_user();

    service
        .create_exception(&user, DOCTOR_ID, closure(monday(), ExceptionType::Holiday))
        .await
        .unwrap();
    let second = service
        .create_exception(&user, DOCTOR_ID, closure(monday(), ExceptionType::Leave))
        .await;

    assert_matches!(second, Err(ScheduleError::ExceptionExists(date)) if date == monday());
}

#[tokio::test]
async fn test_deleting_exception_restores_weekly_slots() {
    let service = service();
    let user = doctor().to_user();

    let exception = service
        .create_exception(&user, DOCTOR_ID, closure(monday(), ExceptionType::Leave))
        .await
        .unwrap();
    service.delete_exception(&user, &exception.id).await.unwrap();

    let profile = service.get_profile(DOCTOR_ID).await.unwrap();
    let (_, slots) = service.candidate_slots(&profile, monday()).await.unwrap();
    assert_eq!(slots.len(), 16);

    assert_matches!(
        service.delete_exception(&user, &exception.id).await,
        Err(ScheduleError::ExceptionNotFound)
    );
}

#[tokio::test]
async fn test_other_doctor_cannot_manage_schedule() {
    let service = service();
    let intruder = TestUser::doctor("other@example.com", CLINIC_ID).to_user();

    let result = service
        .create_exception(&intruder, DOCTOR_ID, closure(monday(), ExceptionType::Holiday))
        .await;
    assert_matches!(result, Err(ScheduleError::Forbidden));

    let patient = TestUser::patient("p@example.com").to_user();
    assert_matches!(
        service.set_weekly_availability(&patient, DOCTOR_ID, vec![]).await,
        Err(ScheduleError::Forbidden)
    );
}

#[tokio::test]
async fn test_admin_replaces_weekly_availability() {
    let service = service();
    let admin = TestUser::admin("admin@example.com").to_user();

    let saturday_only = vec![WeeklyAvailability {
        day_of_week: 6,
        is_available: true,
        slots: vec![TimeRange::new(t("09:00"), t("12:00"))],
    }];
    let stored = service
        .set_weekly_availability(&admin, DOCTOR_ID, saturday_only.clone())
        .await
        .unwrap();
    assert_eq!(stored, saturday_only);

    let profile = service.get_profile(DOCTOR_ID).await.unwrap();
    let (template, _) = service.candidate_slots(&profile, monday()).await.unwrap();
    assert_eq!(template, DayTemplate::Closed);
}

#[tokio::test]
async fn test_invalid_weekly_availability_is_rejected() {
    let service = service();
    let user = doctor().to_user();

    let inverted = vec![WeeklyAvailability {
        day_of_week: 1,
        is_available: true,
        slots: vec![TimeRange::new(t("14:00"), t("10:00"))],
    }];
    assert_matches!(
        service.set_weekly_availability(&user, DOCTOR_ID, inverted).await,
        Err(ScheduleError::Validation(_))
    );
}

#[tokio::test]
async fn test_list_exceptions_in_range() {
    let service = service();
    let user = doctor().to_user();

    for day in [4, 11, 18] {
        let date = NaiveDate::from_ymd_opt(2030, 3, day).unwrap();
        service
            .create_exception(&user, DOCTOR_ID, closure(date, ExceptionType::Holiday))
            .await
            .unwrap();
    }

    let listed = service
        .list_exceptions(
            &user,
            DOCTOR_ID,
            NaiveDate::from_ymd_opt(2030, 3, 5),
            NaiveDate::from_ymd_opt(2030, 3, 18),
        )
        .await
        .unwrap();

    let dates: Vec<u32> = listed.iter().map(|e| chrono::Datelike::day(&e.date)).collect();
    assert_eq!(dates, vec![11, 18]);
}

#[tokio::test]
async fn test_unknown_doctor() {
    let service = service();
    assert_matches!(service.get_availability("nobody").await, Err(ScheduleError::DoctorNotFound));
}
