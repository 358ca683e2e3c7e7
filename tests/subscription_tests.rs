//! Live query behaviour: initial snapshot, refresh on change, silence after unsubscribe.

mod common;

use std::time::Duration;

use tokio::sync::mpsc;

use common::{applicant, application_draft, organization, position_draft, test_context};
use mira_server::application::model::Application;
use mira_server::position::model::Position;
use mira_server::store::{ApplicationQuery, PositionQuery};
use mira_server::subscription::{watch_applications, watch_positions};

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("snapshot within timeout")
        .expect("watcher still running")
}

#[tokio::test]
async fn test_position_watch_refreshes_and_stops() {
    let ctx = test_context();
    let org = organization("org-1");
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Position>>();

    let subscription = watch_positions(
        ctx.state.store.clone(),
        &ctx.state.changes,
        PositionQuery::ByOrganization("org-1".to_string()),
        move |positions| {
            let _ = tx.send(positions);
        },
    );

    assert!(next(&mut rx).await.is_empty());

    let created = ctx.state.create_position(&org, position_draft(1)).await.unwrap();
    let snapshot = next(&mut rx).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].pid, created.pid);

    // Another organization's writes are not relevant.
    ctx.state
        .create_position(&organization("org-2"), position_draft(1))
        .await
        .unwrap();
    ctx.state
        .set_visibility(&org, &created.pid, false)
        .await
        .unwrap();
    let snapshot = next(&mut rx).await;
    assert!(!snapshot[0].visible);

    subscription.unsubscribe();
    ctx.state
        .create_position(&org, position_draft(2))
        .await
        .unwrap();

    let silent = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(matches!(silent, Err(_) | Ok(None)));
}

#[tokio::test]
async fn test_application_watch_sees_reviews() {
    let ctx = test_context();
    let org = organization("org-1");
    let position = ctx.state.create_position(&org, position_draft(1)).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Application>>();
    let subscription = watch_applications(
        ctx.state.store.clone(),
        &ctx.state.changes,
        ApplicationQuery::ByPosition(position.pid),
        move |applications| {
            let _ = tx.send(applications);
        },
    );
    assert!(subscription.is_active());
    assert!(next(&mut rx).await.is_empty());

    ctx.state
        .submit_application(&applicant("ada"), &position.pid, application_draft())
        .await
        .unwrap();
    let snapshot = next(&mut rx).await;
    assert_eq!(snapshot.len(), 1);
    assert!(!snapshot[0].bookmarked);

    ctx.state
        .toggle_bookmark(&org, &position.pid, "ada")
        .await
        .unwrap();
    let snapshot = next(&mut rx).await;
    assert!(snapshot[0].bookmarked);

    ctx.state.delete_position(&org, &position.pid).await.unwrap();
    assert!(next(&mut rx).await.is_empty());
}

#[tokio::test]
async fn test_dropping_the_handle_stops_delivery() {
    let ctx = test_context();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Position>>();

    {
        let _subscription = watch_positions(
            ctx.state.store.clone(),
            &ctx.state.changes,
            PositionQuery::All,
            move |positions| {
                let _ = tx.send(positions);
            },
        );
        next(&mut rx).await;
    }

    ctx.state
        .create_position(&organization("org-1"), position_draft(1))
        .await
        .unwrap();
    let silent = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(matches!(silent, Err(_) | Ok(None)));
}
