//! Applicant-facing notifications raised by lifecycle transitions.

pub mod worker;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::application::model::Application;
use crate::position::model::Position;

pub use worker::start_notification_worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Accepted,
    Rejected,
    Rescinded,
    Committed,
    Withdrew,
}

/// Everything a delivery channel needs to tell someone what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub pid: Uuid,
    pub uid: String,
    pub email: Option<String>,
    pub full_name: String,
    pub position_title: String,
    pub organization_name: String,
    pub organization_email: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, position: &Position, application: &Application) -> Self {
        Self {
            kind,
            pid: position.pid,
            uid: application.uid.clone(),
            email: application.email.clone(),
            full_name: application.full_name.clone(),
            position_title: position.title.clone(),
            organization_name: position.organization_name.clone(),
            organization_email: position.organization_email.clone(),
        }
    }

    /// Applicant-side events are addressed to the organization.
    pub fn recipient(&self) -> Option<&str> {
        match self.kind {
            NotificationKind::Committed | NotificationKind::Withdrew => {
                Some(self.organization_email.as_str()).filter(|e| !e.is_empty())
            }
            _ => self.email.as_deref(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), String>;
}

/// Writes notifications to the log. Used when no mail transport is wired in.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        log::info!(
            "Notify {:?} for '{}' at {} ({}): {:?}",
            notification.recipient().unwrap_or("<no address>"),
            notification.position_title,
            notification.organization_name,
            notification.full_name,
            notification.kind
        );
        Ok(())
    }
}
