//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use mira_server::application::model::{Application, SubmitApplicationRequest};
use mira_server::auth::jwt::generate_session_token;
use mira_server::auth::model::ActorContext;
use mira_server::clock::ManualClock;
use mira_server::notify::{Notification, Notifier};
use mira_server::position::model::{CreatePositionRequest, LocationType, Position};
use mira_server::store::{
    ApplicationQuery, DocumentStore, MemoryStore, PositionQuery, StoreError, Write,
};
use mira_server::AppState;

/// Notifier that remembers everything it was asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}

/// Store whose backend is permanently unreachable.
pub struct FailingStore;

fn unreachable_backend() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get_position(&self, _pid: &Uuid) -> Result<Option<Position>, StoreError> {
        Err(unreachable_backend())
    }

    async fn list_positions(&self, _query: &PositionQuery) -> Result<Vec<Position>, StoreError> {
        Err(unreachable_backend())
    }

    async fn get_application(
        &self,
        _pid: &Uuid,
        _uid: &str,
    ) -> Result<Option<Application>, StoreError> {
        Err(unreachable_backend())
    }

    async fn list_applications(
        &self,
        _query: &ApplicationQuery,
    ) -> Result<Vec<Application>, StoreError> {
        Err(unreachable_backend())
    }

    async fn commit(&self, _writes: Vec<Write>) -> Result<(), StoreError> {
        Err(unreachable_backend())
    }
}

/// In-memory store with switches for slow reads and for reads that start
/// failing once a commit has gone through.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    list_delay_ms: AtomicU64,
    application_read_delay_ms: AtomicU64,
    fail_reads_after_commit: AtomicBool,
    reads_failing: AtomicBool,
}

impl ScriptedStore {
    /// Position listings return what they read only after `delay`.
    pub fn slow_listings(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Application lookups return what they read only after `delay`.
    pub fn slow_application_reads(&self, delay: Duration) {
        self.application_read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_reads_after_next_commit(&self) {
        self.fail_reads_after_commit.store(true, Ordering::SeqCst);
    }

    pub fn restore_reads(&self) {
        self.reads_failing.store(false, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.reads_failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("read timed out".to_string()))
        } else {
            Ok(())
        }
    }

    async fn pause(delay_ms: &AtomicU64) {
        let ms = delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn get_position(&self, pid: &Uuid) -> Result<Option<Position>, StoreError> {
        self.check_reads()?;
        self.inner.get_position(pid).await
    }

    async fn list_positions(&self, query: &PositionQuery) -> Result<Vec<Position>, StoreError> {
        self.check_reads()?;
        let positions = self.inner.list_positions(query).await?;
        Self::pause(&self.list_delay_ms).await;
        Ok(positions)
    }

    async fn get_application(
        &self,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Option<Application>, StoreError> {
        self.check_reads()?;
        let application = self.inner.get_application(pid, uid).await?;
        Self::pause(&self.application_read_delay_ms).await;
        Ok(application)
    }

    async fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, StoreError> {
        self.check_reads()?;
        self.inner.list_applications(query).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        self.inner.commit(writes).await?;
        if self.fail_reads_after_commit.swap(false, Ordering::SeqCst) {
            self.reads_failing.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub struct TestContext {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// In-memory state with a manual clock. Needs a running Tokio runtime.
pub fn test_context() -> TestContext {
    context_with(Arc::new(MemoryStore::new()))
}

/// Like [`test_context`], with a handle on the store's switches.
pub fn scripted_context() -> (TestContext, Arc<ScriptedStore>) {
    let store = Arc::new(ScriptedStore::default());
    (context_with(store.clone()), store)
}

fn context_with(store: Arc<dyn DocumentStore>) -> TestContext {
    let clock = Arc::new(ManualClock::new(start_time()));
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::with_store(
        store,
        clock.clone(),
        notifier.clone(),
        Duration::from_secs(60),
    );
    TestContext {
        state,
        clock,
        notifier,
    }
}

pub fn failing_state() -> AppState {
    AppState::with_store(
        Arc::new(FailingStore),
        Arc::new(ManualClock::new(start_time())),
        Arc::new(RecordingNotifier::default()),
        Duration::from_secs(60),
    )
}

pub fn organization(uid: &str) -> ActorContext {
    ActorContext::organization(uid)
        .with_name("Riverside Food Bank")
        .with_email("team@riverside.org")
}

pub fn applicant(uid: &str) -> ActorContext {
    ActorContext::individual(uid)
        .with_name(format!("Volunteer {}", uid))
        .with_email(format!("{}@example.com", uid))
}

pub fn bearer(actor: &ActorContext) -> (&'static str, String) {
    let token = generate_session_token(actor).expect("Failed to generate token");
    ("Authorization", format!("Bearer {}", token))
}

pub fn position_draft(total_slots: u32) -> CreatePositionRequest {
    CreatePositionRequest {
        title: "Weekend Pantry Helper".to_string(),
        description: "Sort and shelve donations".to_string(),
        requirements: "Able to lift 10kg".to_string(),
        position_type: "community service".to_string(),
        location: Some("12 River Rd".to_string()),
        location_type: LocationType::OnSite,
        questions: vec!["Why do you want to help?".to_string()],
        require_resume: false,
        total_slots,
    }
}

pub fn application_draft() -> SubmitApplicationRequest {
    SubmitApplicationRequest {
        education: "BSc Nutrition".to_string(),
        answers: vec!["I volunteer every summer".to_string()],
        ..Default::default()
    }
}

/// Gives the notification worker time to drain its channel.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(400)).await;
}
