//! In-process document store, used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ApplicationQuery, DocumentStore, PositionQuery, StoreError, Write};
use crate::application::model::Application;
use crate::position::model::Position;

#[derive(Default)]
struct Collections {
    positions: HashMap<Uuid, Position>,
    applications: HashMap<(Uuid, String), Application>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_revision(label: String, stored: Option<u64>, expected: u64) -> Result<(), StoreError> {
    match (stored, expected) {
        (None, 0) => Ok(()),
        (Some(current), expected) if expected != 0 && current == expected => Ok(()),
        (None, _) => Err(StoreError::Conflict(format!("{} no longer exists", label))),
        (Some(current), 0) => Err(StoreError::Conflict(format!(
            "{} already exists at revision {}",
            label, current
        ))),
        (Some(current), expected) => Err(StoreError::Conflict(format!(
            "{} is at revision {}, expected {}",
            label, current, expected
        ))),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_position(&self, pid: &Uuid) -> Result<Option<Position>, StoreError> {
        Ok(self.inner.read().positions.get(pid).cloned())
    }

    async fn list_positions(&self, query: &PositionQuery) -> Result<Vec<Position>, StoreError> {
        let guard = self.inner.read();
        let mut positions: Vec<Position> = guard
            .positions
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.pid.cmp(&b.pid)));
        Ok(positions)
    }

    async fn get_application(
        &self,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .inner
            .read()
            .applications
            .get(&(*pid, uid.to_string()))
            .cloned())
    }

    async fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, StoreError> {
        let guard = self.inner.read();
        let mut applications: Vec<Application> = guard
            .applications
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        applications.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.uid.cmp(&b.uid))
        });
        Ok(applications)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut guard = self.inner.write();

        // Validate the whole batch before touching anything.
        for write in &writes {
            match write {
                Write::PutPosition(p) => check_revision(
                    write.describe(),
                    guard.positions.get(&p.pid).map(|s| s.revision),
                    p.revision,
                )?,
                Write::DeletePosition { pid, revision } => {
                    if *revision == 0 {
                        return Err(StoreError::Conflict(format!(
                            "{} was never persisted",
                            write.describe()
                        )));
                    }
                    check_revision(
                        write.describe(),
                        guard.positions.get(pid).map(|s| s.revision),
                        *revision,
                    )?
                }
                Write::PutApplication(a) => check_revision(
                    write.describe(),
                    guard
                        .applications
                        .get(&(a.pid, a.uid.clone()))
                        .map(|s| s.revision),
                    a.revision,
                )?,
            }
        }

        log::debug!("Applying batch of {} write(s)", writes.len());
        for write in writes {
            match write {
                Write::PutPosition(mut p) => {
                    p.revision += 1;
                    guard.positions.insert(p.pid, p);
                }
                Write::DeletePosition { pid, .. } => {
                    guard.positions.remove(&pid);
                    guard.applications.retain(|(app_pid, _), _| *app_pid != pid);
                }
                Write::PutApplication(mut a) => {
                    a.revision += 1;
                    guard.applications.insert((a.pid, a.uid.clone()), a);
                }
            }
        }
        Ok(())
    }
}
