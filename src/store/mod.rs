//! Document store abstraction.
//!
//! Two collections are kept: positions keyed by `pid`, and applications keyed
//! by `(pid, uid)`. Every record carries a `revision`. Writes are submitted as
//! a batch through [`DocumentStore::commit`] and either all apply or none do.
//!
//! Revision rules for a batch entry:
//! - revision `0` means the record must not exist yet
//! - any other revision must equal the stored one
//!
//! The store persists `revision + 1`. A mismatch fails the whole batch with
//! [`StoreError::Conflict`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::model::Application;
use crate::position::model::Position;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stale write: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionQuery {
    All,
    ByOrganization(String),
}

impl PositionQuery {
    pub fn matches(&self, position: &Position) -> bool {
        match self {
            PositionQuery::All => true,
            PositionQuery::ByOrganization(oid) => &position.oid == oid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationQuery {
    ByPosition(Uuid),
    ByApplicant(String),
}

impl ApplicationQuery {
    pub fn matches(&self, application: &Application) -> bool {
        match self {
            ApplicationQuery::ByPosition(pid) => &application.pid == pid,
            ApplicationQuery::ByApplicant(uid) => &application.uid == uid,
        }
    }
}

/// One entry of an atomic batch.
#[derive(Debug, Clone)]
pub enum Write {
    PutPosition(Position),
    /// Removes the position and every application filed against it.
    DeletePosition { pid: Uuid, revision: u64 },
    PutApplication(Application),
}

impl Write {
    pub fn describe(&self) -> String {
        match self {
            Write::PutPosition(p) => format!("position {}", p.pid),
            Write::DeletePosition { pid, .. } => format!("position {}", pid),
            Write::PutApplication(a) => format!("application {}/{}", a.pid, a.uid),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_position(&self, pid: &Uuid) -> Result<Option<Position>, StoreError>;

    /// Ordered by creation time, oldest first.
    async fn list_positions(&self, query: &PositionQuery) -> Result<Vec<Position>, StoreError>;

    async fn get_application(
        &self,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Option<Application>, StoreError>;

    /// Ordered by creation time, oldest first.
    async fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, StoreError>;

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}
