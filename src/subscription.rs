//! Change notification and live queries.
//!
//! Writers publish a [`Change`] on the [`ChangeHub`] after every committed
//! batch. A watcher reloads its query from the store whenever a relevant
//! change arrives and hands the full result set to its callback.

use std::future::Future;
use std::sync::Arc;

use actix_web::web::Bytes;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use uuid::Uuid;

use crate::application::model::Application;
use crate::position::model::Position;
use crate::store::{ApplicationQuery, DocumentStore, PositionQuery, StoreError};

const HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Position { pid: Uuid, oid: String },
    PositionDeleted { pid: Uuid, oid: String },
    Application { pid: Uuid, uid: String },
}

impl Change {
    pub fn touches_positions(&self, query: &PositionQuery) -> bool {
        match (self, query) {
            (Change::Application { .. }, _) => false,
            (_, PositionQuery::All) => true,
            (Change::Position { oid, .. }, PositionQuery::ByOrganization(owner))
            | (Change::PositionDeleted { oid, .. }, PositionQuery::ByOrganization(owner)) => {
                oid == owner
            }
        }
    }

    pub fn touches_applications(&self, query: &ApplicationQuery) -> bool {
        match (self, query) {
            (Change::Position { .. }, _) => false,
            (Change::Application { pid, .. }, ApplicationQuery::ByPosition(wanted))
            | (Change::PositionDeleted { pid, .. }, ApplicationQuery::ByPosition(wanted)) => {
                pid == wanted
            }
            (Change::Application { uid, .. }, ApplicationQuery::ByApplicant(wanted)) => {
                uid == wanted
            }
            // Deleting a position removes its applications, whoever filed them.
            (Change::PositionDeleted { .. }, ApplicationQuery::ByApplicant(_)) => true,
        }
    }
}

#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<Change>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, change: Change) {
        // No receivers simply means nobody is watching.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }
}

/// Handle to a running watch. Delivery stops on `unsubscribe` or drop.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop aborts the task.
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn deliver<T, L, Fut, C>(load: &L, callback: &C)
where
    L: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<T>, StoreError>>,
    C: Fn(Vec<T>),
{
    match load().await {
        Ok(items) => callback(items),
        Err(e) => log::warn!("Failed to reload watched query: {}", e),
    }
}

fn spawn_watch<T, R, L, Fut, C>(hub: &ChangeHub, relevant: R, load: L, callback: C) -> Subscription
where
    T: Send + 'static,
    R: Fn(&Change) -> bool + Send + 'static,
    L: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, StoreError>> + Send,
    C: Fn(Vec<T>) + Send + Sync + 'static,
{
    // Subscribe before the first load so no change slips between the two.
    let mut changes = BroadcastStream::new(hub.subscribe());

    let handle = tokio::spawn(async move {
        deliver(&load, &callback).await;
        while let Some(event) = changes.next().await {
            match event {
                Ok(change) if relevant(&change) => deliver(&load, &callback).await,
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    log::warn!("Watcher lagged by {} changes, reloading", skipped);
                    deliver(&load, &callback).await;
                }
            }
        }
    });

    Subscription { handle }
}

pub fn watch_positions<C>(
    store: Arc<dyn DocumentStore>,
    hub: &ChangeHub,
    query: PositionQuery,
    callback: C,
) -> Subscription
where
    C: Fn(Vec<Position>) + Send + Sync + 'static,
{
    let filter = query.clone();
    spawn_watch(
        hub,
        move |change: &Change| change.touches_positions(&filter),
        move || {
            let store = store.clone();
            let query = query.clone();
            async move { store.list_positions(&query).await }
        },
        callback,
    )
}

pub fn watch_applications<C>(
    store: Arc<dyn DocumentStore>,
    hub: &ChangeHub,
    query: ApplicationQuery,
    callback: C,
) -> Subscription
where
    C: Fn(Vec<Application>) + Send + Sync + 'static,
{
    let filter = query.clone();
    spawn_watch(
        hub,
        move |change: &Change| change.touches_applications(&filter),
        move || {
            let store = store.clone();
            let query = query.clone();
            async move { store.list_applications(&query).await }
        },
        callback,
    )
}

/// Turns the snapshots published on `receiver` into a Server-Sent-Events body.
/// Only the newest snapshot is kept, so a slow client skips the ones it missed.
/// The subscription lives as long as the stream does.
pub fn event_stream<T>(
    subscription: Subscription,
    receiver: watch::Receiver<Option<T>>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    WatchStream::new(receiver).filter_map(move |snapshot| {
        let _alive = &subscription;
        let frame: Option<Result<Bytes, std::io::Error>> =
            snapshot.map(|snapshot| match serde_json::to_string(&snapshot) {
                Ok(data) => Ok(Bytes::from(format!("event: snapshot\ndata: {}\n\n", data))),
                Err(e) => {
                    log::error!("Failed to encode snapshot: {}", e);
                    Ok(Bytes::from("event: error\ndata: encoding failed\n\n"))
                }
            });
        futures::future::ready(frame)
    })
}
