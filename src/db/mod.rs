//! Application state and the service operations built on it.
//!
//! This module is split into submodules by the record they drive:
//! - `position` - position management and the organization dashboard
//! - `application` - submissions, review, commitment and rescind
//!
//! Every mutating operation reads the latest persisted records, runs the
//! matching `lifecycle` function, and commits the result conditionally on the
//! revisions it read.

mod application;
mod position;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::model::Application;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::notify::{start_notification_worker, LogNotifier, Notification, Notifier};
use crate::position::model::Position;
use crate::store::{DocumentStore, MemoryStore, PgStore, StoreError, Write};
use crate::subscription::{Change, ChangeHub};

const ACTIVE_POSITIONS_KEY: &str = "positions:active";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub position_cache: Cache<String, Vec<Position>>,
    /// Bumped after every committed batch. Listing cache keys carry it, so a
    /// fill that started before a write can never be served after it.
    write_generation: Arc<AtomicU64>,
    pub changes: ChangeHub,
    pub clock: Arc<dyn Clock>,
    pub notification_sender: mpsc::Sender<Notification>,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url, config.db_max_connections).await?),
            None => Arc::new(MemoryStore::new()),
        };

        Ok(Self::with_store(
            store,
            Arc::new(SystemClock),
            Arc::new(LogNotifier),
            config.position_cache_ttl,
        ))
    }

    /// Builds state around an existing store and spawns the notification worker.
    /// Must be called from within a Tokio runtime.
    pub fn with_store(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        cache_ttl: Duration,
    ) -> Self {
        let position_cache = Cache::builder()
            .time_to_live(cache_ttl)
            .max_capacity(100)
            .build();

        let (notification_sender, receiver) = mpsc::channel(100);
        tokio::spawn(async move {
            start_notification_worker(receiver, notifier).await;
        });

        AppState {
            store,
            position_cache,
            write_generation: Arc::new(AtomicU64::new(0)),
            changes: ChangeHub::new(),
            clock,
            notification_sender,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cache key for the active listing as of the latest committed write.
    pub(crate) fn active_positions_key(&self) -> String {
        format!(
            "{}:{}",
            ACTIVE_POSITIONS_KEY,
            self.write_generation.load(Ordering::SeqCst)
        )
    }

    pub(crate) async fn load_position(&self, pid: &Uuid) -> Result<Position, CoreError> {
        self.store
            .get_position(pid)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("Position {} not found", pid)))
    }

    pub(crate) async fn load_application(
        &self,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Application, CoreError> {
        self.store.get_application(pid, uid).await?.ok_or_else(|| {
            CoreError::not_found(format!("No application from {} for position {}", uid, pid))
        })
    }

    /// Commits `writes` atomically, then drops cached listings and tells watchers.
    pub(crate) async fn commit(
        &self,
        writes: Vec<Write>,
        changes: Vec<Change>,
    ) -> Result<(), CoreError> {
        self.store.commit(writes).await?;

        self.write_generation.fetch_add(1, Ordering::SeqCst);
        self.position_cache.invalidate_all();
        for change in changes {
            self.changes.publish(change);
        }
        Ok(())
    }

    /// Records the outcome of `operation` and logs refusals.
    pub(crate) fn observe<T>(
        &self,
        operation: &str,
        result: Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        crate::metrics::record(operation, &result);
        match &result {
            Ok(_) => log::info!("{} succeeded", operation),
            Err(e @ CoreError::CollaboratorUnavailable(_)) => {
                log::error!("{} failed: {}", operation, e)
            }
            Err(e) => log::warn!("{} refused: {}", operation, e),
        }
        result
    }

    pub(crate) async fn queue_notification(&self, notification: Notification) {
        if let Err(e) = self.notification_sender.send(notification).await {
            log::error!("Failed to queue notification: {}", e);
        } else {
            log::debug!("Notification queued for background delivery");
        }
    }
}
