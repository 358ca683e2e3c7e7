//! Application operations

use uuid::Uuid;

use super::AppState;
use crate::application::model::{Application, ApplicationStatus, SubmitApplicationRequest};
use crate::auth::model::ActorContext;
use crate::error::CoreError;
use crate::lifecycle;
use crate::listing::{self, ApplicationFilter};
use crate::notify::{Notification, NotificationKind};
use crate::store::{ApplicationQuery, Write};
use crate::subscription::Change;

/// The application as the store holds it once its write has committed.
fn persisted(mut application: Application) -> Application {
    application.revision += 1;
    application
}

fn application_changed(application: &Application) -> Change {
    Change::Application {
        pid: application.pid,
        uid: application.uid.clone(),
    }
}

impl AppState {
    pub async fn submit_application(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        draft: SubmitApplicationRequest,
    ) -> Result<Application, CoreError> {
        let result: Result<Application, CoreError> = async {
            let position = self.load_position(pid).await?;
            let existing = self.store.get_application(pid, &actor.uid).await?;
            let submission = lifecycle::submit_application(
                actor,
                &position,
                existing.as_ref(),
                draft,
                self.now(),
            )?;

            let changes = vec![
                Change::Position {
                    pid: position.pid,
                    oid: position.oid.clone(),
                },
                application_changed(&submission.application),
            ];
            self.commit(
                vec![
                    Write::PutPosition(submission.position),
                    Write::PutApplication(submission.application.clone()),
                ],
                changes,
            )
            .await?;
            Ok(persisted(submission.application))
        }
        .await;
        self.observe("submit_application", result)
    }

    /// Applicants to one position, for its owner.
    pub async fn position_applications(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, CoreError> {
        let position = self.load_position(pid).await?;
        lifecycle::ensure_owner(actor, &position)?;
        let applications = self
            .store
            .list_applications(&ApplicationQuery::ByPosition(*pid))
            .await?;
        Ok(listing::filter_applications(&applications, filter))
    }

    pub async fn my_applications(
        &self,
        actor: &ActorContext,
    ) -> Result<Vec<Application>, CoreError> {
        Ok(self
            .store
            .list_applications(&ApplicationQuery::ByApplicant(actor.uid.clone()))
            .await?)
    }

    pub async fn set_application_status(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        uid: &str,
        status: ApplicationStatus,
    ) -> Result<Application, CoreError> {
        let result: Result<Application, CoreError> = async {
            let position = self.load_position(pid).await?;
            let current = self.load_application(pid, uid).await?;
            let next = lifecycle::set_status(actor, &position, &current, status, self.now())?;

            self.commit(
                vec![Write::PutApplication(next.clone())],
                vec![application_changed(&next)],
            )
            .await?;

            let kind = match status {
                ApplicationStatus::Rejected => NotificationKind::Rejected,
                _ => NotificationKind::Accepted,
            };
            self.queue_notification(Notification::new(kind, &position, &next))
                .await;
            Ok(persisted(next))
        }
        .await;
        self.observe("set_status", result)
    }

    pub async fn toggle_bookmark(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Application, CoreError> {
        let result: Result<Application, CoreError> = async {
            let position = self.load_position(pid).await?;
            let current = self.load_application(pid, uid).await?;
            let next = lifecycle::toggle_bookmark(actor, &position, &current)?;

            self.commit(
                vec![Write::PutApplication(next.clone())],
                vec![application_changed(&next)],
            )
            .await?;
            Ok(persisted(next))
        }
        .await;
        self.observe("toggle_bookmark", result)
    }

    /// The caller responds to their own acceptance.
    pub async fn set_commitment(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        committed: bool,
    ) -> Result<Application, CoreError> {
        let result: Result<Application, CoreError> = async {
            let position = self.load_position(pid).await?;
            let current = self.load_application(pid, &actor.uid).await?;
            let outcome =
                lifecycle::set_commitment(actor, &position, &current, committed, self.now())?;

            let mut writes = vec![Write::PutApplication(outcome.application.clone())];
            let mut changes = vec![application_changed(&outcome.application)];
            if let Some(next_position) = outcome.position {
                changes.push(Change::Position {
                    pid: next_position.pid,
                    oid: next_position.oid.clone(),
                });
                writes.push(Write::PutPosition(next_position));
            }
            self.commit(writes, changes).await?;

            let kind = if committed {
                NotificationKind::Committed
            } else {
                NotificationKind::Withdrew
            };
            self.queue_notification(Notification::new(kind, &position, &outcome.application))
                .await;
            Ok(persisted(outcome.application))
        }
        .await;
        self.observe("set_commitment", result)
    }

    pub async fn rescind_application(
        &self,
        actor: &ActorContext,
        pid: &Uuid,
        uid: &str,
    ) -> Result<Application, CoreError> {
        let result: Result<Application, CoreError> = async {
            let position = self.load_position(pid).await?;
            let current = self.load_application(pid, uid).await?;
            let next = lifecycle::rescind(actor, &position, &current, self.now())?;

            self.commit(
                vec![Write::PutApplication(next.clone())],
                vec![application_changed(&next)],
            )
            .await?;
            self.queue_notification(Notification::new(
                NotificationKind::Rescinded,
                &position,
                &next,
            ))
            .await;
            Ok(persisted(next))
        }
        .await;
        self.observe("rescind", result)
    }
}
