mod common;

use assert_matches::assert_matches;

use appointment_cell::models::*;
use appointment_cell::services::NotificationKind;

use common::*;

async fn move_to(
    harness: &Harness,
    user: &shared_models::auth::User,
    appointment_id: &str,
    date: chrono::NaiveDate,
    start: &str,
) -> Result<Appointment, AppointmentError> {
    harness
        .booking
        .reschedule(
            user,
            appointment_id,
            RescheduleAppointmentRequest { new_date: date, new_start_time: t(start) },
        )
        .await
}

#[tokio::test]
async fn test_reschedule_cancels_old_and_links_new() {
    let harness = Harness::new();
    let owner = patient();
    let original = harness.book(&owner, monday(), "12:00").await.unwrap();

    let moved = move_to(&harness, &owner, &original.id, next_monday(), "10:30").await.unwrap();

    assert_ne!(moved.id, original.id);
    assert_eq!(moved.date, next_monday());
    assert_eq!(moved.start_time, t("10:30"));
    assert_eq!(moved.end_time, t("10:45"));
    assert_eq!(moved.reschedule_count, 1);
    assert_eq!(moved.previous_appointment_id.as_deref(), Some(original.id.as_str()));
    assert_eq!(moved.patient_id, owner.id);
    assert_eq!(moved.status, AppointmentStatus::Pending);
    assert_eq!(moved.audit_log.len(), 1);
    assert_eq!(moved.audit_log[0].action, AuditAction::Rescheduled);

    let old = harness.booking.get_appointment(&owner, &original.id).await.unwrap();
    assert_eq!(old.status, AppointmentStatus::Cancelled);
    assert_eq!(old.cancel_reason.as_deref(), Some("rescheduled"));
    assert_eq!(old.cancelled_by.as_deref(), Some(owner.id.as_str()));
    let last = old.audit_log.last().unwrap();
    assert_eq!(last.action, AuditAction::Cancelled);
    assert_eq!(last.details.as_deref(), Some("rescheduled"));

    // the old slot is free again
    assert!(harness.book(&patient(), monday(), "12:00").await.is_ok());

    let kinds = harness.notifications.wait_for(3).await;
    assert!(kinds.contains(&NotificationKind::Rescheduled));
}

#[tokio::test]
async fn test_confirmed_and_paid_state_carries_over() {
    let harness = Harness::new();
    let original = harness
        .book_walk_in(&receptionist(), "pat-walk-in", monday(), "13:00")
        .await
        .unwrap();
    harness
        .booking
        .update_payment_status(&receptionist(), &original.id, PaymentStatus::Paid)
        .await
        .unwrap();

    let moved = move_to(&harness, &receptionist(), &original.id, tuesday(), "13:00").await.unwrap();

    assert_eq!(moved.status, AppointmentStatus::Confirmed);
    assert_eq!(moved.payment_status, PaymentStatus::Paid);
    assert_eq!(moved.channel, BookingChannel::WalkIn);
    assert_eq!(moved.patient_id, "pat-walk-in");
}

#[tokio::test]
async fn test_third_reschedule_exceeds_limit() {
    let harness = Harness::new();
    let owner = patient();
    let original = harness.book(&owner, monday(), "13:00").await.unwrap();

    let first = move_to(&harness, &owner, &original.id, next_monday(), "10:00").await.unwrap();
    let second = move_to(&harness, &owner, &first.id, next_monday(), "10:15").await.unwrap();
    assert_eq!(second.reschedule_count, 2);
    assert_eq!(second.previous_appointment_id.as_deref(), Some(first.id.as_str()));

    assert_matches!(
        move_to(&harness, &owner, &second.id, next_monday(), "10:30").await,
        Err(AppointmentError::RescheduleLimitExceeded { max: 2 })
    );

    let still = harness.booking.get_appointment(&owner, &second.id).await.unwrap();
    assert_eq!(still.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn test_too_close_to_start() {
    let harness = Harness::new();
    let owner = patient();
    let original = harness.book(&owner, monday(), "10:00").await.unwrap();

    harness.set_time(8, 30);
    assert_matches!(
        move_to(&harness, &owner, &original.id, next_monday(), "10:00").await,
        Err(AppointmentError::TooLateToReschedule { min_hours: 2 })
    );
}

#[tokio::test]
async fn test_finished_appointments_cannot_move() {
    let harness = Harness::new();
    let owner = patient();
    let original = harness.book(&owner, monday(), "12:00").await.unwrap();
    harness.booking.cancel(&owner, &original.id, None).await.unwrap();

    assert_matches!(
        move_to(&harness, &owner, &original.id, next_monday(), "10:00").await,
        Err(AppointmentError::NotReschedulable(AppointmentStatus::Cancelled))
    );
}

#[tokio::test]
async fn test_target_slot_taken() {
    let harness = Harness::new();
    let owner = patient();
    let original = harness.book(&owner, monday(), "12:00").await.unwrap();
    harness.book(&patient(), next_monday(), "11:00").await.unwrap();

    assert_matches!(
        move_to(&harness, &owner, &original.id, next_monday(), "11:00").await,
        Err(AppointmentError::SlotAlreadyBooked)
    );

    let unchanged = harness.booking.get_appointment(&owner, &original.id).await.unwrap();
    assert_eq!(unchanged.status, AppointmentStatus::Pending);
    assert_eq!(unchanged.audit_log.len(), 1);
}

#[tokio::test]
async fn test_target_must_be_a_real_slot() {
    let harness = Harness::new();
    let owner = patient();
    let original = harness.book(&owner, monday(), "12:00").await.unwrap();

    assert_matches!(
        move_to(&harness, &owner, &original.id, next_monday(), "09:00").await,
        Err(AppointmentError::InvalidSlot(_))
    );
}

#[tokio::test]
async fn test_other_patient_cannot_reschedule() {
    let harness = Harness::new();
    let original = harness.book(&patient(), monday(), "12:00").await.unwrap();

    assert_matches!(
        move_to(&harness, &patient(), &original.id, next_monday(), "10:00").await,
        Err(AppointmentError::Forbidden(_))
    );
}
