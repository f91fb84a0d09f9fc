use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use schedule_cell::models::ScheduleError;
use shared_database::DatabaseError;

// ==============================================================================
// QUEUE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QueueEntryStatus {
    Waiting,
    InConsultation,
    Completed,
    Skipped,
}

impl QueueEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEntryStatus::Waiting => "waiting",
            QueueEntryStatus::InConsultation => "in-consultation",
            QueueEntryStatus::Completed => "completed",
            QueueEntryStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub appointment_id: String,
    pub patient_id: String,
    pub token_number: u32,
    pub status: QueueEntryStatus,
    pub check_in_time: DateTime<Utc>,
    #[serde(default)]
    pub called_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_out_time: Option<DateTime<Utc>>,
}

/// One doctor's walk-through order for one day. Every change goes through
/// the methods below and is then written back with a version check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Queue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub doctor_id: String,
    pub clinic_id: String,
    pub date: NaiveDate,
    pub current_token: u32,
    pub total_tokens_issued: u32,
    #[serde(default)]
    pub patients: Vec<QueueEntry>,
    #[serde(default)]
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallNextOutcome {
    Called(QueueEntry),
    /// Nobody is waiting; the current token is left where it was.
    QueueEmpty { current_token: u32 },
}

impl Queue {
    pub fn new(doctor_id: &str, clinic_id: &str, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            doctor_id: doctor_id.to_string(),
            clinic_id: clinic_id.to_string(),
            date,
            current_token: 0,
            total_tokens_issued: 0,
            patients: Vec::new(),
            version: 0,
            updated_at: now,
        }
    }

    /// Most recent entry for an appointment; a skipped patient may have several.
    pub fn latest_entry(&self, appointment_id: &str) -> Option<&QueueEntry> {
        self.patients
            .iter()
            .rev()
            .find(|entry| entry.appointment_id == appointment_id)
    }

    pub fn in_consultation(&self) -> Option<&QueueEntry> {
        self.patients
            .iter()
            .find(|entry| entry.status == QueueEntryStatus::InConsultation)
    }

    pub fn waiting_count(&self) -> usize {
        self.patients
            .iter()
            .filter(|entry| entry.status == QueueEntryStatus::Waiting)
            .count()
    }

    pub fn issue_token(
        &mut self,
        appointment_id: &str,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, QueueError> {
        if let Some(existing) = self.latest_entry(appointment_id) {
            if existing.status != QueueEntryStatus::Skipped {
                return Err(QueueError::AlreadyCheckedIn(existing.token_number));
            }
        }

        self.total_tokens_issued += 1;
        let entry = QueueEntry {
            appointment_id: appointment_id.to_string(),
            patient_id: patient_id.to_string(),
            token_number: self.total_tokens_issued,
            status: QueueEntryStatus::Waiting,
            check_in_time: now,
            called_time: None,
            check_out_time: None,
        };
        self.patients.push(entry.clone());

        Ok(entry)
    }

    pub fn call_next(&mut self, now: DateTime<Utc>) -> Result<CallNextOutcome, QueueError> {
        if let Some(active) = self.in_consultation() {
            return Err(QueueError::ConsultationInProgress(active.token_number));
        }

        let next = self
            .patients
            .iter_mut()
            .filter(|entry| entry.status == QueueEntryStatus::Waiting)
            .min_by_key(|entry| entry.token_number);

        let called = match next {
            Some(entry) => {
                entry.status = QueueEntryStatus::InConsultation;
                entry.called_time = Some(now);
                entry.clone()
            }
            None => {
                return Ok(CallNextOutcome::QueueEmpty {
                    current_token: self.current_token,
                })
            }
        };

        self.current_token = called.token_number;
        Ok(CallNextOutcome::Called(called))
    }

    /// `completed` only from `in-consultation`, `skipped` only from `waiting`.
    pub fn update_entry_status(
        &mut self,
        appointment_id: &str,
        status: QueueEntryStatus,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, QueueError> {
        let entry = self
            .patients
            .iter_mut()
            .rev()
            .find(|entry| entry.appointment_id == appointment_id)
            .ok_or_else(|| QueueError::EntryNotFound(appointment_id.to_string()))?;

        match (entry.status, status) {
            (QueueEntryStatus::InConsultation, QueueEntryStatus::Completed) => {
                entry.status = status;
                entry.check_out_time = Some(now);
            }
            (QueueEntryStatus::Waiting, QueueEntryStatus::Skipped) => {
                entry.status = status;
            }
            (from, to) => return Err(QueueError::InvalidTransition { from, to }),
        }

        Ok(entry.clone())
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateQueueStatusRequest {
    pub status: QueueEntryStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("No queue for this doctor today")]
    NotFound,

    #[error("Appointment {0} is not in today's queue")]
    EntryNotFound(String),

    #[error("Patient already checked in with token {0}")]
    AlreadyCheckedIn(u32),

    #[error("Token {0} is still in consultation")]
    ConsultationInProgress(u32),

    #[error("Queue entry cannot move from {from} to {to}")]
    InvalidTransition {
        from: QueueEntryStatus,
        to: QueueEntryStatus,
    },

    #[error("Appointment is on {date}, not today ({today})")]
    NotToday { date: NaiveDate, today: NaiveDate },

    #[error("Appointment is {0} and cannot be checked in")]
    AppointmentNotActive(AppointmentStatus),

    #[error("Queue is busy, try again")]
    Busy,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error("Storage error: {0}")]
    Store(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, 9, 0, 0).unwrap()
    }

    fn queue() -> Queue {
        Queue::new("doc-1", "clinic-1", NaiveDate::from_ymd_opt(2030, 3, 4).unwrap(), now())
    }

    #[test]
    fn test_tokens_are_sequential() {
        let mut queue = queue();
        let tokens: Vec<u32> = ["a", "b", "c"]
            .iter()
            .map(|id| queue.issue_token(id, "p", now()).unwrap().token_number)
            .collect();

        assert_eq!(tokens, vec![1, 2, 3]);
        assert_eq!(queue.total_tokens_issued, 3);
        assert_eq!(queue.waiting_count(), 3);
    }

    #[test]
    fn test_second_check_in_rejected() {
        let mut queue = queue();
        queue.issue_token("a", "p", now()).unwrap();
        assert_matches!(queue.issue_token("a", "p", now()), Err(QueueError::AlreadyCheckedIn(1)));
    }

    #[test]
    fn test_skipped_patient_gets_new_token() {
        let mut queue = queue();
        queue.issue_token("a", "p", now()).unwrap();
        queue.issue_token("b", "p", now()).unwrap();
        queue.update_entry_status("a", QueueEntryStatus::Skipped, now()).unwrap();

        let again = queue.issue_token("a", "p", now()).unwrap();
        assert_eq!(again.token_number, 3);
        assert_eq!(queue.latest_entry("a").unwrap().status, QueueEntryStatus::Waiting);
    }

    #[test]
    fn test_call_next_on_empty_queue() {
        let mut queue = queue();
        assert_eq!(
            queue.call_next(now()).unwrap(),
            CallNextOutcome::QueueEmpty { current_token: 0 }
        );
        assert_eq!(queue.current_token, 0);
    }

    #[test]
    fn test_call_next_takes_lowest_waiting_token() {
        let mut queue = queue();
        queue.issue_token("a", "p", now()).unwrap();
        queue.issue_token("b", "p", now()).unwrap();
        queue.update_entry_status("a", QueueEntryStatus::Skipped, now()).unwrap();

        assert_matches!(queue.call_next(now()), Ok(CallNextOutcome::Called(entry)) if entry.token_number == 2);
        assert_eq!(queue.current_token, 2);
    }

    #[test]
    fn test_call_next_blocked_during_consultation() {
        let mut queue = queue();
        queue.issue_token("a", "p", now()).unwrap();
        queue.issue_token("b", "p", now()).unwrap();
        queue.call_next(now()).unwrap();

        assert_matches!(queue.call_next(now()), Err(QueueError::ConsultationInProgress(1)));

        queue.update_entry_status("a", QueueEntryStatus::Completed, now()).unwrap();
        assert_matches!(queue.call_next(now()), Ok(CallNextOutcome::Called(entry)) if entry.token_number == 2);
    }

    #[test]
    fn test_entry_transitions() {
        let mut queue = queue();
        queue.issue_token("a", "p", now()).unwrap();

        assert_matches!(
            queue.update_entry_status("a", QueueEntryStatus::Completed, now()),
            Err(QueueError::InvalidTransition {
                from: QueueEntryStatus::Waiting,
                to: QueueEntryStatus::Completed
            })
        );

        queue.call_next(now()).unwrap();
        assert_matches!(
            queue.update_entry_status("a", QueueEntryStatus::Skipped, now()),
            Err(QueueError::InvalidTransition { .. })
        );

        let done = queue.update_entry_status("a", QueueEntryStatus::Completed, now()).unwrap();
        assert_eq!(done.check_out_time, Some(now()));
        assert_matches!(
            queue.update_entry_status("missing", QueueEntryStatus::Skipped, now()),
            Err(QueueError::EntryNotFound(_))
        );
    }
}
