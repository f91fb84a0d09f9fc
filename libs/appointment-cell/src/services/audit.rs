use std::sync::Arc;

use tracing::{debug, error};

use crate::models::{Appointment, AuditEntry};
use crate::store::AppointmentStore;

/// Appends history entries. A failed append is logged and never undoes the
/// mutation it describes.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AppointmentStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Persist `entry` and mirror it onto `appointment` once stored.
    pub async fn record(&self, appointment: &mut Appointment, entry: AuditEntry) {
        match self.store.append_audit(&appointment.id, &entry).await {
            Ok(()) => {
                debug!("Audit {:?} recorded for appointment {}", entry.action, appointment.id);
                appointment.audit_log.push(entry);
            }
            Err(e) => {
                error!(
                    "Failed to record {:?} audit entry for appointment {}: {}",
                    entry.action, appointment.id, e
                );
            }
        }
    }
}
