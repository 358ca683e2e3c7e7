//! Position operations

use uuid::Uuid;

use super::AppState;
use crate::auth::model::ActorContext;
use crate::error::CoreError;
use crate::lifecycle;
use crate::listing::{self, DashboardMetrics, PositionFilter, PositionOverview};
use crate::position::model::{CreatePositionRequest, Position, UpdatePositionRequest};
use crate::store::{ApplicationQuery, PositionQuery, Write};
use crate::subscription::Change;

fn position_changed(position: &Position) -> Change {
    Change::Position {
        pid: position.pid,
        oid: position.oid.clone(),
    }
}

/// The position as the store holds it once its write has committed.
fn persisted_position(mut position: Position) -> Position {
    position.revision += 1;
    position
}

fn require_organization(actor: &ActorContext) -> Result<(), CoreError> {
    if actor.is_organization() {
        Ok(())
    } else {
        Err(CoreError::authorization(
            "only organization accounts have a position dashboard",
        ))
    }
}

impl AppState {
    /// Visible, unlocked positions. Served from the listing cache when warm.
    pub async fn list_active_positions(&self) -> Result<Vec<Position>, CoreError> {
        // Taken before the load: if a write lands meanwhile, this fill goes
        // under a key no later reader asks for.
        let key = self.active_positions_key();
        if let Some(cached) = self.position_cache.get(&key).await {
            log::debug!("Serving {} active positions from cache", cached.len());
            return Ok(cached);
        }

        let positions: Vec<Position> = self
            .store
            .list_positions(&PositionQuery::All)
            .await?
            .into_iter()
            .filter(Position::is_active)
            .collect();

        self.position_cache.insert(key, positions.clone()).await;
        Ok(positions)
    }

    pub async fn browse_positions(
        &self,
        filter: &PositionFilter,
    ) -> Result<Vec<Position>, CoreError> {
        let active = self.list_active_positions().await?;
        Ok(listing::filter_positions(&active, filter))
    }

    /// The owner sees any of its positions. Anyone else sees visible ones, or
    /// ones they have applied to.
    pub async fn get_position(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
    ) -> Result<Position, CoreError> {
        let position = self.load_position(pid).await?;
        if position.visible || position.oid == actor.uid {
            return Ok(position);
        }
        if self.store.get_application(pid, &actor.uid).await?.is_some() {
            return Ok(position);
        }
        Err(CoreError::not_found(format!("Position {} not found", pid)))
    }

    pub async fn create_position(
        &self,
        actor: &ActorContext,
        draft: CreatePositionRequest,
    ) -> Result<Position, CoreError> {
        let result: Result<Position, CoreError> = async {
            let position = lifecycle::create_position(actor, draft, self.now())?;
            let change = position_changed(&position);
            self.commit(vec![Write::PutPosition(position.clone())], vec![change])
                .await?;
            Ok(persisted_position(position))
        }
        .await;
        self.observe("create_position", result)
    }

    pub async fn edit_position(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        changes: UpdatePositionRequest,
    ) -> Result<Position, CoreError> {
        let result: Result<Position, CoreError> = async {
            let current = self.load_position(pid).await?;
            let next = lifecycle::edit_position(actor, &current, changes, self.now())?;
            self.commit(
                vec![Write::PutPosition(next.clone())],
                vec![position_changed(&next)],
            )
            .await?;
            Ok(persisted_position(next))
        }
        .await;
        self.observe("edit_position", result)
    }

    pub async fn set_visibility(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        visible: bool,
    ) -> Result<Position, CoreError> {
        let result: Result<Position, CoreError> = async {
            let current = self.load_position(pid).await?;
            let next = lifecycle::update_visibility(actor, &current, visible, self.now())?;
            self.commit(
                vec![Write::PutPosition(next.clone())],
                vec![position_changed(&next)],
            )
            .await?;
            Ok(persisted_position(next))
        }
        .await;
        self.observe("update_visibility", result)
    }

    pub async fn complete_position(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
    ) -> Result<Position, CoreError> {
        let result: Result<Position, CoreError> = async {
            let current = self.load_position(pid).await?;
            let next = lifecycle::complete_position(actor, &current, self.now())?;
            self.commit(
                vec![Write::PutPosition(next.clone())],
                vec![position_changed(&next)],
            )
            .await?;
            Ok(persisted_position(next))
        }
        .await;
        self.observe("complete_position", result)
    }

    pub async fn delete_position(&self, actor: &ActorContext, pid: &Uuid) -> Result<(), CoreError> {
        let result: Result<(), CoreError> = async {
            let current = self.load_position(pid).await?;
            lifecycle::delete_position(actor, &current)?;
            self.commit(
                vec![Write::DeletePosition {
                    pid: current.pid,
                    revision: current.revision,
                }],
                vec![Change::PositionDeleted {
                    pid: current.pid,
                    oid: current.oid.clone(),
                }],
            )
            .await
        }
        .await;
        self.observe("delete_position", result)
    }

    pub async fn organization_positions(
        &self,
        actor: &ActorContext,
        filter: &PositionFilter,
    ) -> Result<Vec<Position>, CoreError> {
        require_organization(actor)?;
        let positions = self
            .store
            .list_positions(&PositionQuery::ByOrganization(actor.uid.clone()))
            .await?;
        Ok(listing::filter_positions(&positions, filter))
    }

    pub async fn organization_metrics(
        &self,
        actor: &ActorContext,
    ) -> Result<DashboardMetrics, CoreError> {
        require_organization(actor)?;
        let positions = self
            .store
            .list_positions(&PositionQuery::ByOrganization(actor.uid.clone()))
            .await?;

        let mut applications = Vec::new();
        for position in &positions {
            applications.extend(
                self.store
                    .list_applications(&ApplicationQuery::ByPosition(position.pid))
                    .await?,
            );
        }
        Ok(listing::dashboard_metrics(&positions, &applications))
    }

    pub async fn position_overview(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
    ) -> Result<PositionOverview, CoreError> {
        let position = self.load_position(pid).await?;
        lifecycle::ensure_owner(actor, &position)?;
        let applications = self
            .store
            .list_applications(&ApplicationQuery::ByPosition(*pid))
            .await?;
        Ok(listing::position_overview(
            &position,
            &applications,
            self.now(),
        ))
    }
}
