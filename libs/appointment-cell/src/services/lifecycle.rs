use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Appointment status state machine:
/// pending -> confirmed, and pending | confirmed -> completed | cancelled | no-show.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use AppointmentStatus::*;

    #[test]
    fn test_permitted_transitions() {
        let lifecycle = AppointmentLifecycleService::new();
        for (from, to) in [
            (Pending, Confirmed),
            (Pending, Completed),
            (Pending, Cancelled),
            (Pending, NoShow),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
            (Confirmed, NoShow),
        ] {
            assert!(lifecycle.validate_status_transition(from, to).is_ok(), "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let lifecycle = AppointmentLifecycleService::new();
        for from in [Completed, Cancelled, NoShow] {
            for to in [Pending, Confirmed, Completed, Cancelled, NoShow] {
                assert_matches!(
                    lifecycle.validate_status_transition(from, to),
                    Err(AppointmentError::InvalidTransition { .. })
                );
            }
        }
    }

    #[test]
    fn test_no_way_back_to_pending() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_matches!(
            lifecycle.validate_status_transition(Confirmed, Pending),
            Err(AppointmentError::InvalidTransition { from: Confirmed, to: Pending })
        );
        assert_matches!(
            lifecycle.validate_status_transition(Pending, Pending),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }
}
