use actix_cors::Cors;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpRequest, HttpResponse, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod application;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod listing;
pub mod metrics;
pub mod notify;
pub mod position;
pub mod store;
pub mod subscription;

pub use crate::db::AppState;
use crate::config::AppConfig;
use crate::error::CoreError;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        position::handlers::list_positions,
        position::handlers::create_position,
        position::handlers::watch_active_positions,
        position::handlers::get_position,
        position::handlers::update_position,
        position::handlers::delete_position,
        position::handlers::set_visibility,
        position::handlers::complete_position,
        position::handlers::position_overview,
        position::handlers::organization_positions,
        position::handlers::organization_metrics,
        application::handlers::submit_application,
        application::handlers::list_applications,
        application::handlers::watch_position_applications,
        application::handlers::set_status,
        application::handlers::toggle_bookmark,
        application::handlers::rescind,
        application::handlers::set_commitment,
        application::handlers::my_applications
    ),
    components(
        schemas(
            position::model::Position,
            position::model::LocationType,
            position::model::CreatePositionRequest,
            position::model::UpdatePositionRequest,
            position::model::VisibilityRequest,
            application::model::Application,
            application::model::ApplicationStatus,
            application::model::DisplayStatus,
            application::model::CommitmentState,
            application::model::SubmitApplicationRequest,
            application::model::StatusRequest,
            application::model::CommitmentRequest,
            listing::DashboardMetrics,
            listing::PositionOverview,
            listing::OverviewEntry,
            listing::PositionStatusFilter,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Positions", description = "Position management and browsing."),
        (name = "Applications", description = "Submission, review, commitment and rescind."),
        (name = "Organizations", description = "Organization dashboard endpoints.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost")
    )
)]
pub struct ApiDoc;

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::warn!("Rejected request body: {}", err);
    CoreError::validation(format!("Invalid request body: {}", err)).into()
}

fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    CoreError::validation(format!("Invalid query string: {}", err)).into()
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
        "No route for {} {}",
        req.method(),
        req.path()
    )))
}

/// Registers every `/api` route together with the body and query extractors'
/// error handling.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .configure(position::handlers::config)
            .configure(application::handlers::config),
    )
    .service(web::resource("/metrics/lifecycle").route(web::get().to(metrics::lifecycle_metrics)));
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let app_state = web::Data::new(
        AppState::new(&config)
            .await
            .context("failed to initialize the document store, check DATABASE_URL")?,
    );

    let prometheus = PrometheusMetricsBuilder::new("mira_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    let allowed_origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(configure_api)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .default_service(web::to(not_found))
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
