use actix_web::{web, HttpResponse};
use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::model::ActorContext;
use crate::error::CoreError;
use crate::listing::{self, DashboardMetrics, PositionFilter, PositionOverview};
use crate::position::model::{
    CreatePositionRequest, Position, UpdatePositionRequest, VisibilityRequest,
};
use crate::store::PositionQuery;
use crate::subscription::{event_stream, watch_positions};
use crate::{AppState, ErrorResponse};

#[utoipa::path(
    get,
    path = "/api/positions",
    tag = "Positions",
    params(PositionFilter),
    responses(
        (status = 200, description = "Active positions matching the filter", body = Vec<Position>)
    )
)]
pub async fn list_positions(
    state: web::Data<AppState>,
    filter: web::Query<PositionFilter>,
) -> Result<HttpResponse, CoreError> {
    let positions = state.browse_positions(&filter).await?;
    Ok(HttpResponse::Ok().json(positions))
}

#[utoipa::path(
    post,
    path = "/api/positions",
    tag = "Positions",
    request_body = CreatePositionRequest,
    responses(
        (status = 201, description = "Position created", body = Position),
        (status = 400, description = "Invalid position", body = ErrorResponse),
        (status = 403, description = "Caller is not an organization", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_position(
    actor: ActorContext,
    state: web::Data<AppState>,
    body: web::Json<CreatePositionRequest>,
) -> Result<HttpResponse, CoreError> {
    log::info!("Creating position for organization {}", actor.uid);
    let position = state.create_position(&actor, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(position))
}

#[utoipa::path(
    get,
    path = "/api/positions/watch",
    tag = "Positions",
    params(PositionFilter),
    responses(
        (status = 200, description = "Server-Sent-Events stream of active positions", content_type = "text/event-stream")
    )
)]
pub async fn watch_active_positions(
    state: web::Data<AppState>,
    filter: web::Query<PositionFilter>,
) -> HttpResponse {
    let filter = filter.into_inner();
    let (tx, rx) = watch::channel(None);
    let subscription = watch_positions(
        state.store.clone(),
        &state.changes,
        PositionQuery::All,
        move |positions: Vec<Position>| {
            let active: Vec<Position> = positions.into_iter().filter(Position::is_active).collect();
            tx.send_replace(Some(listing::filter_positions(&active, &filter)));
        },
    );

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(event_stream(subscription, rx))
}

#[utoipa::path(
    get,
    path = "/api/positions/{pid}",
    tag = "Positions",
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Position found", body = Position),
        (status = 404, description = "Position not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_position(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let position = state.get_position(&actor, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(position))
}

#[utoipa::path(
    put,
    path = "/api/positions/{pid}",
    tag = "Positions",
    request_body = UpdatePositionRequest,
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Position updated", body = Position),
        (status = 400, description = "Invalid change", body = ErrorResponse),
        (status = 403, description = "Caller does not own the position", body = ErrorResponse),
        (status = 423, description = "Position is locked", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_position(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePositionRequest>,
) -> Result<HttpResponse, CoreError> {
    let position = state
        .edit_position(&actor, &path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(position))
}

#[utoipa::path(
    delete,
    path = "/api/positions/{pid}",
    tag = "Positions",
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 204, description = "Position and its applications deleted"),
        (status = 403, description = "Caller does not own the position", body = ErrorResponse),
        (status = 423, description = "Position is locked", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_position(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let pid = path.into_inner();
    state.delete_position(&actor, &pid).await?;
    log::info!("Position {} deleted by {}", pid, actor.uid);
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/positions/{pid}/visibility",
    tag = "Positions",
    request_body = VisibilityRequest,
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Visibility changed", body = Position),
        (status = 423, description = "Position is locked", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_visibility(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<VisibilityRequest>,
) -> Result<HttpResponse, CoreError> {
    let position = state
        .set_visibility(&actor, &path.into_inner(), body.visible)
        .await?;
    Ok(HttpResponse::Ok().json(position))
}

#[utoipa::path(
    post,
    path = "/api/positions/{pid}/complete",
    tag = "Positions",
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Position completed and locked", body = Position),
        (status = 423, description = "Position was already locked", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn complete_position(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let position = state.complete_position(&actor, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(position))
}

#[utoipa::path(
    get,
    path = "/api/positions/{pid}/overview",
    tag = "Positions",
    params(("pid" = Uuid, Path, description = "Position id")),
    responses(
        (status = 200, description = "Accepted applicants and slot counts", body = PositionOverview),
        (status = 403, description = "Caller does not own the position", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn position_overview(
    actor: ActorContext,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, CoreError> {
    let overview = state.position_overview(&actor, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(overview))
}

#[utoipa::path(
    get,
    path = "/api/organizations/me/positions",
    tag = "Organizations",
    params(PositionFilter),
    responses(
        (status = 200, description = "The caller's positions", body = Vec<Position>),
        (status = 403, description = "Caller is not an organization", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn organization_positions(
    actor: ActorContext,
    state: web::Data<AppState>,
    filter: web::Query<PositionFilter>,
) -> Result<HttpResponse, CoreError> {
    let positions = state.organization_positions(&actor, &filter).await?;
    Ok(HttpResponse::Ok().json(positions))
}

#[utoipa::path(
    get,
    path = "/api/organizations/me/metrics",
    tag = "Organizations",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardMetrics),
        (status = 403, description = "Caller is not an organization", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn organization_metrics(
    actor: ActorContext,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CoreError> {
    let metrics = state.organization_metrics(&actor).await?;
    Ok(HttpResponse::Ok().json(metrics))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/positions")
            .route(web::get().to(list_positions))
            .route(web::post().to(create_position)),
    )
    // Must precede `/positions/{pid}`.
    .service(web::resource("/positions/watch").route(web::get().to(watch_active_positions)))
    .service(
        web::resource("/positions/{pid}")
            .route(web::get().to(get_position))
            .route(web::put().to(update_position))
            .route(web::delete().to(delete_position)),
    )
    .service(web::resource("/positions/{pid}/visibility").route(web::put().to(set_visibility)))
    .service(web::resource("/positions/{pid}/complete").route(web::post().to(complete_position)))
    .service(web::resource("/positions/{pid}/overview").route(web::get().to(position_overview)))
    .service(
        web::resource("/organizations/me/positions")
            .route(web::get().to(organization_positions)),
    )
    .service(
        web::resource("/organizations/me/metrics").route(web::get().to(organization_metrics)),
    );
}
