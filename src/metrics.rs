//! Lifecycle counters.
//!
//! HTTP request metrics come from the middleware on `/metrics`. The counters
//! here live in the process-wide default registry and are exposed on
//! `/metrics/lifecycle`.

use actix_web::{HttpResponse, Responder};
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

use crate::error::CoreError;
use crate::ErrorResponse;

lazy_static! {
    pub static ref LIFECYCLE_TRANSITIONS: IntCounterVec = register_int_counter_vec!(
        "mira_lifecycle_transitions_total",
        "Lifecycle operations by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("lifecycle counter registers once");
}

/// Counts one attempt of `operation`. Failures are labelled with the error kind.
pub fn record<T>(operation: &str, result: &Result<T, CoreError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    LIFECYCLE_TRANSITIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub async fn lifecycle_metrics() -> impl Responder {
    match render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            log::error!("Failed to encode lifecycle metrics: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("failed to encode metrics"))
        }
    }
}
