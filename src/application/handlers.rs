use actix_web::{web, HttpResponse};
use tokio::sync::watch;
use uuid::Uuid;

use crate::application::model::{
    Application, CommitmentRequest, StatusRequest, SubmitApplicationRequest,
};
use crate::auth::model::ActorContext;
use crate::error::CoreError;
use crate::lifecycle;
use crate::listing::{self, ApplicationFilter};
use crate::store::ApplicationQuery;
use crate::subscription::{event_stream, watch_applications};
use crate::{AppState, ErrorResponse};

#[utoipa::path(
    post,
    path = "/api/positions/{pid}/applications",
    tag = "Applications",
    request_body = SubmitApplicationRequest,
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 400, description = "Position closed, duplicate, or invalid form", body = ErrorResponse),
        (status = 403, description = "Organization accounts cannot apply", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_application(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SubmitApplicationRequest>,
) -> Result<HttpResponse, CoreError> {
    let pid = path.into_inner();
    log::info!("Applicant {} applying to position {}", actor.uid, pid);
    let application = state
        .submit_application(&actor, &pid, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(application))
}

#[utoipa::path(
    get,
    path = "/api/positions/{pid}/applications",
    tag = "Applications",
    params(("pid" = Uuid, Path, description = "Position id"), ApplicationFilter),
    responses(
        (status = 200, description = "Applicants, accepted first and rejected last", body = Vec<Application>),
        (status = 403, description = "Caller does not own the position", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_applications(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    filter: web::Query<ApplicationFilter>,
) -> Result<HttpResponse, CoreError> {
    let applications = state
        .position_applications(&actor, &path.into_inner(), &filter)
        .await?;
    Ok(HttpResponse::Ok().json(applications))
}

#[utoipa::path(
    get,
    path = "/api/positions/{pid}/applications/watch",
    tag = "Applications",
    params(("pid" = Uuid, Path, description = "Position id"), ApplicationFilter),
    responses(
        (status = 200, description = "Server-Sent-Events stream of applicants", content_type = "text/event-stream"),
        (status = 403, description = "Caller does not own the position", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn watch_position_applications(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    filter: web::Query<ApplicationFilter>,
) -> Result<HttpResponse, CoreError> {
    let pid = path.into_inner();
    let position = state.load_position(&pid).await?;
    lifecycle::ensure_owner(&actor, &position)?;

    let filter = filter.into_inner();
    let (tx, rx) = watch::channel(None);
    let subscription = watch_applications(
        state.store.clone(),
        &state.changes,
        ApplicationQuery::ByPosition(pid),
        move |applications: Vec<Application>| {
            tx.send_replace(Some(listing::filter_applications(&applications, &filter)));
        },
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(event_stream(subscription, rx)))
}

#[utoipa::path(
    put,
    path = "/api/positions/{pid}/applications/{uid}/status",
    tag = "Applications",
    request_body = StatusRequest,
    params(
        ("pid" = Uuid, Path, description = "Position id"),
        ("uid" = String, Path, description = "Applicant uid")
    ),
    responses(
        (status = 200, description = "Application accepted or rejected", body = Application),
        (status = 409, description = "Application was already reviewed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_status(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, CoreError> {
    let (pid, uid) = path.into_inner();
    let application = state
        .set_application_status(&actor, &pid, &uid, body.status)
        .await?;
    Ok(HttpResponse::Ok().json(application))
}

#[utoipa::path(
    post,
    path = "/api/positions/{pid}/applications/{uid}/bookmark",
    tag = "Applications",
    params(
        ("pid" = Uuid, Path, description = "Position id"),
        ("uid" = String, Path, description = "Applicant uid")
    ),
    responses(
        (status = 200, description = "Bookmark toggled", body = Application),
        (status = 409, description = "Only pending applications can be bookmarked", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_bookmark(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, CoreError> {
    let (pid, uid) = path.into_inner();
    let application = state.toggle_bookmark(&actor, &pid, &uid).await?;
    Ok(HttpResponse::Ok().json(application))
}

#[utoipa::path(
    post,
    path = "/api/positions/{pid}/applications/{uid}/rescind",
    tag = "Applications",
    params(
        ("pid" = Uuid, Path, description = "Position id"),
        ("uid" = String, Path, description = "Applicant uid")
    ),
    responses(
        (status = 200, description = "Offer rescinded", body = Application),
        (status = 422, description = "Offer cannot be rescinded yet or any more", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn rescind(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, CoreError> {
    let (pid, uid) = path.into_inner();
    let application = state.rescind_application(&actor, &pid, &uid).await?;
    Ok(HttpResponse::Ok().json(application))
}

#[utoipa::path(
    put,
    path = "/api/positions/{pid}/commitment",
    tag = "Applications",
    request_body = CommitmentRequest,
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Response recorded", body = Application),
        (status = 409, description = "Not accepted, or already responded", body = ErrorResponse),
        (status = 422, description = "Offer rescinded or no open slots remain", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_commitment(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CommitmentRequest>,
) -> Result<HttpResponse, CoreError> {
    let application = state
        .set_commitment(&actor, &path.into_inner(), body.committed)
        .await?;
    Ok(HttpResponse::Ok().json(application))
}

#[utoipa::path(
    get,
    path = "/api/applications/me",
    tag = "Applications",
    responses(
        (status = 200, description = "The caller's applications", body = Vec<Application>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_applications(
    actor: ActorContext,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CoreError> {
    let applications = state.my_applications(&actor).await?;
    Ok(HttpResponse::Ok().json(applications))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/positions/{pid}/applications")
            .route(web::get().to(list_applications))
            .route(web::post().to(submit_application)),
    )
    .service(
        web::resource("/positions/{pid}/applications/watch")
            .route(web::get().to(watch_position_applications)),
    )
    .service(
        web::resource("/positions/{pid}/applications/{uid}/status")
            .route(web::put().to(set_status)),
    )
    .service(
        web::resource("/positions/{pid}/applications/{uid}/bookmark")
            .route(web::post().to(toggle_bookmark)),
    )
    .service(
        web::resource("/positions/{pid}/applications/{uid}/rescind")
            .route(web::post().to(rescind)),
    )
    .service(web::resource("/positions/{pid}/commitment").route(web::put().to(set_commitment)))
    .service(web::resource("/applications/me").route(web::get().to(my_applications)));
}
