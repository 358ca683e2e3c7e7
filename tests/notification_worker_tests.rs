//! Tests for the background notification worker.
//!
//! These tests verify:
//! 1. Queued notifications reach the notifier
//! 2. Duplicates inside one burst are delivered once
//! 3. Delivery failures do not stop the worker
//! 4. The worker exits when every sender is gone

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use mira_server::notify::{start_notification_worker, Notification, NotificationKind, Notifier};

/// Mock notifier that tracks delivery calls
struct MockNotifier {
    attempts: AtomicUsize,
    delivered: Arc<Mutex<Vec<Notification>>>,
    should_fail: bool,
}

impl MockNotifier {
    fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            delivered: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err("Mock mail transport failure".to_string());
        }
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }
}

fn notification(kind: NotificationKind, uid: &str) -> Notification {
    Notification {
        kind,
        pid: Uuid::nil(),
        uid: uid.to_string(),
        email: Some(format!("{}@example.com", uid)),
        full_name: format!("Volunteer {}", uid),
        position_title: "Weekend Pantry Helper".to_string(),
        organization_name: "Riverside Food Bank".to_string(),
        organization_email: "team@riverside.org".to_string(),
    }
}

#[tokio::test]
async fn test_worker_delivers_queued_notifications() {
    let notifier = Arc::new(MockNotifier::new());
    let (sender, receiver) = mpsc::channel(10);
    tokio::spawn(start_notification_worker(receiver, notifier.clone()));

    sender
        .send(notification(NotificationKind::Accepted, "ada"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let delivered = notifier.delivered.lock().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Accepted);
    assert_eq!(delivered[0].recipient(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_worker_collapses_duplicates_in_a_burst() {
    let notifier = Arc::new(MockNotifier::new());
    let (sender, receiver) = mpsc::channel(10);
    tokio::spawn(start_notification_worker(receiver, notifier.clone()));

    for _ in 0..3 {
        sender
            .send(notification(NotificationKind::Rescinded, "ada"))
            .await
            .unwrap();
    }
    sender
        .send(notification(NotificationKind::Rescinded, "bob"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(notifier.attempts(), 2);
}

#[tokio::test]
async fn test_worker_survives_delivery_failures() {
    let notifier = Arc::new(MockNotifier::new_failing());
    let (sender, receiver) = mpsc::channel(10);
    tokio::spawn(start_notification_worker(receiver, notifier.clone()));

    sender
        .send(notification(NotificationKind::Rejected, "ada"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    sender
        .send(notification(NotificationKind::Rejected, "bob"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(notifier.attempts(), 2);
    assert!(notifier.delivered.lock().await.is_empty());
}

#[tokio::test]
async fn test_worker_stops_when_senders_drop() {
    let notifier = Arc::new(MockNotifier::new());
    let (sender, receiver) = mpsc::channel::<Notification>(10);
    let handle = tokio::spawn(start_notification_worker(receiver, notifier));

    drop(sender);
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker exits")
        .unwrap();
}

#[test]
fn test_applicant_responses_go_to_the_organization() {
    let committed = notification(NotificationKind::Committed, "ada");
    assert_eq!(committed.recipient(), Some("team@riverside.org"));

    let accepted = notification(NotificationKind::Accepted, "ada");
    assert_eq!(accepted.recipient(), Some("ada@example.com"));
}
