pub mod audit;
pub mod booking;
pub mod lifecycle;
pub mod notification;
pub mod reschedule;

pub use audit::AuditTrail;
pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use notification::{
    LogNotificationDispatcher, Notification, NotificationDispatcher, NotificationError, NotificationKind,
    Notifier, RedisNotificationDispatcher,
};
pub use reschedule::check_reschedule_policy;
