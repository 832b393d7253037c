//! Host notification capability.
//!
//! The driver asks for permission once at start and delivers through the
//! same handle afterwards. Without permission, reminders are still decided
//! and recorded, just never shown.

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::reminder::ReminderNotification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// The host has not answered yet; treated like `Denied` for delivery.
    Default,
}

impl Permission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Every way of showing a reminder to the user implements this trait.
pub trait Notifier: Send + Sync {
    /// Ask the host for permission to show notifications.
    fn request_permission(&self) -> Permission;

    /// Show one reminder. Only called when permission was granted.
    fn deliver(&self, notification: &ReminderNotification) -> Result<(), NotifyError>;
}

/// Notifier for hosts without any notification surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn deliver(&self, _notification: &ReminderNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits reminders as `tracing` events at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn deliver(&self, notification: &ReminderNotification) -> Result<(), NotifyError> {
        tracing::info!(
            tag = %notification.tag,
            scheduled_for = %notification.scheduled_for,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn request_permission(&self) -> Permission {
        (**self).request_permission()
    }

    fn deliver(&self, notification: &ReminderNotification) -> Result<(), NotifyError> {
        (**self).deliver(notification)
    }
}
