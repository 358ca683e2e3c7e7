//! Postgres-backed document store.
//!
//! Each record is kept as a JSONB body next to the columns needed for lookup
//! and for the revision check. Batch writes run in one transaction and every
//! statement is conditional on the expected revision.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{ApplicationQuery, DocumentStore, PositionQuery, StoreError, Write};
use crate::application::model::Application;
use crate::position::model::Position;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;

        log::info!("Connected to Postgres document store");
        Ok(Self { pool })
    }
}

fn position_from_row(row: PgRow) -> Result<Position, StoreError> {
    let Json(mut position): Json<Position> = row.try_get("body")?;
    let revision: i64 = row.try_get("revision")?;
    position.revision = revision as u64;
    Ok(position)
}

fn application_from_row(row: PgRow) -> Result<Application, StoreError> {
    let Json(mut application): Json<Application> = row.try_get("body")?;
    let revision: i64 = row.try_get("revision")?;
    application.revision = revision as u64;
    Ok(application)
}

fn stale(label: String, expected: u64) -> StoreError {
    if expected == 0 {
        StoreError::Conflict(format!("{} already exists", label))
    } else {
        StoreError::Conflict(format!("{} changed since revision {}", label, expected))
    }
}

async fn put_position(
    tx: &mut Transaction<'_, Postgres>,
    position: &Position,
) -> Result<u64, sqlx::Error> {
    let expected = position.revision;
    let mut body = position.clone();
    body.revision = expected + 1;

    let result = if expected == 0 {
        sqlx::query(
            r#"
            INSERT INTO positions (pid, oid, created_at, revision, body)
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (pid) DO NOTHING
            "#,
        )
        .bind(position.pid)
        .bind(&position.oid)
        .bind(position.created_at)
        .bind(Json(&body))
        .execute(&mut **tx)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE positions
            SET body = $2, revision = revision + 1
            WHERE pid = $1 AND revision = $3
            "#,
        )
        .bind(position.pid)
        .bind(Json(&body))
        .bind(expected as i64)
        .execute(&mut **tx)
        .await?
    };
    Ok(result.rows_affected())
}

async fn put_application(
    tx: &mut Transaction<'_, Postgres>,
    application: &Application,
) -> Result<u64, sqlx::Error> {
    let expected = application.revision;
    let mut body = application.clone();
    body.revision = expected + 1;

    let result = if expected == 0 {
        sqlx::query(
            r#"
            INSERT INTO applications (pid, uid, created_at, revision, body)
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (pid, uid) DO NOTHING
            "#,
        )
        .bind(application.pid)
        .bind(&application.uid)
        .bind(application.created_at)
        .bind(Json(&body))
        .execute(&mut **tx)
        .await?
    } else {
        sqlx::query(
            r#"
            UPDATE applications
            SET body = $3, revision = revision + 1
            WHERE pid = $1 AND uid = $2 AND revision = $4
            "#,
        )
        .bind(application.pid)
        .bind(&application.uid)
        .bind(Json(&body))
        .bind(expected as i64)
        .execute(&mut **tx)
        .await?
    };
    Ok(result.rows_affected())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get_position(&self, pid: &Uuid) -> Result<Option<Position>, StoreError> {
        sqlx::query("SELECT body, revision FROM positions WHERE pid = $1")
            .bind(pid)
            .fetch_optional(&self.pool)
            .await?
            .map(position_from_row)
            .transpose()
    }

    async fn list_positions(&self, query: &PositionQuery) -> Result<Vec<Position>, StoreError> {
        let rows = match query {
            PositionQuery::All => {
                sqlx::query("SELECT body, revision FROM positions ORDER BY created_at, pid")
                    .fetch_all(&self.pool)
                    .await?
            }
            PositionQuery::ByOrganization(oid) => {
                sqlx::query(
                    "SELECT body, revision FROM positions WHERE oid = $1 ORDER BY created_at, pid",
                )
                .bind(oid)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(position_from_row).collect()
    }

    async fn get_application(
        &self,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Option<Application>, StoreError> {
        sqlx::query("SELECT body, revision FROM applications WHERE pid = $1 AND uid = $2")
            .bind(pid)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?
            .map(application_from_row)
            .transpose()
    }

    async fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, StoreError> {
        let rows = match query {
            ApplicationQuery::ByPosition(pid) => {
                sqlx::query(
                    "SELECT body, revision FROM applications WHERE pid = $1 ORDER BY created_at, uid",
                )
                .bind(pid)
                .fetch_all(&self.pool)
                .await?
            }
            ApplicationQuery::ByApplicant(uid) => {
                sqlx::query(
                    "SELECT body, revision FROM applications WHERE uid = $1 ORDER BY created_at, pid",
                )
                .bind(uid)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(application_from_row).collect()
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for write in &writes {
            let (affected, expected) = match write {
                Write::PutPosition(p) => (put_position(&mut tx, p).await?, p.revision),
                Write::PutApplication(a) => (put_application(&mut tx, a).await?, a.revision),
                Write::DeletePosition { pid, revision } => {
                    let result =
                        sqlx::query("DELETE FROM positions WHERE pid = $1 AND revision = $2")
                            .bind(pid)
                            .bind(*revision as i64)
                            .execute(&mut *tx)
                            .await?;
                    (result.rows_affected(), *revision)
                }
            };
            if affected == 0 {
                // Dropping the transaction rolls back earlier statements.
                return Err(stale(write.describe(), expected));
            }
        }

        tx.commit().await?;
        log::debug!("Committed batch of {} write(s)", writes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::model::ApplicationStatus;
    use crate::position::model::LocationType;
    use chrono::Utc;

    async fn connect() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        PgStore::connect(&url, 2).await.expect("connect")
    }

    fn position() -> Position {
        let now = Utc::now();
        Position {
            pid: Uuid::new_v4(),
            oid: format!("org-{}", Uuid::new_v4()),
            organization_name: "Org".to_string(),
            organization_email: String::new(),
            title: "Helper".to_string(),
            description: String::new(),
            requirements: String::new(),
            position_type: "event".to_string(),
            location: None,
            location_type: LocationType::Remote,
            questions: vec![],
            require_resume: false,
            visible: true,
            locked: false,
            total_slots: 1,
            open_slots: 1,
            committed_applicants: 0,
            total_applicants: 0,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    #[tokio::test]
    #[ignore = "requires database connection"]
    async fn test_pg_stale_update_conflicts() {
        let store = connect().await;
        let p = position();
        store.commit(vec![Write::PutPosition(p.clone())]).await.unwrap();

        let current = store.get_position(&p.pid).await.unwrap().unwrap();
        assert_eq!(current.revision, 1);

        store
            .commit(vec![Write::PutPosition(current.clone())])
            .await
            .unwrap();
        let err = store
            .commit(vec![Write::PutPosition(current)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "requires database connection"]
    async fn test_pg_delete_cascades() {
        let store = connect().await;
        let p = position();
        let now = Utc::now();
        let app = Application {
            pid: p.pid,
            uid: "a-1".to_string(),
            full_name: "Ada".to_string(),
            email: None,
            education: String::new(),
            current_employment: None,
            resume: None,
            resume_link: None,
            portfolio_link: None,
            answers: vec![],
            status: ApplicationStatus::Pending,
            committed: None,
            bookmarked: false,
            rescinded: false,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        store
            .commit(vec![Write::PutPosition(p.clone()), Write::PutApplication(app)])
            .await
            .unwrap();
        store
            .commit(vec![Write::DeletePosition {
                pid: p.pid,
                revision: 1,
            }])
            .await
            .unwrap();

        assert!(store.get_application(&p.pid, "a-1").await.unwrap().is_none());
    }
}
