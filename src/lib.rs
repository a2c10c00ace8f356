//! eventsieve -- classification, deduplication, severity escalation and
//! correlation of Kubernetes incident streams.
//!
//! The core stages are pure functions over read-only records. The `pipeline`
//! module chains them; `api` hosts the pipeline over HTTP.

pub mod api;
pub mod classify;
pub mod config;
pub mod correlate;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod model;
pub mod pipeline;
pub mod severity;
pub mod summary;

use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::config::SieveConfig;
use crate::error::SieveError;
use crate::model::IncidentRecord;

/// Start the HTTP service hosting the pipeline.
pub async fn serve(bind: &str, config: SieveConfig) -> Result<()> {
    let addr: std::net::SocketAddr = bind.parse()?;
    let state = api::state::AppState::new(pipeline::Pipeline::new(config));
    let app = api::router(state);

    tracing::info!(%addr, "eventsieve listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Read incident records from a JSON file.
///
/// Accepts a bare array of records or an object wrapping one under
/// `events` or `incidents`.
pub fn load_records(path: &Path) -> Result<Vec<IncidentRecord>, SieveError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| SieveError::ReadInput {
        path: display.clone(),
        source,
    })?;
    parse_records(&content).map_err(|e| match e {
        ParseFailure::Json(source) => SieveError::ParseInput { path: display.clone(), source },
        ParseFailure::Shape => SieveError::UnrecognizedInput { path: display },
    })
}

enum ParseFailure {
    Json(serde_json::Error),
    Shape,
}

fn parse_records(content: &str) -> Result<Vec<IncidentRecord>, ParseFailure> {
    let value: Value = serde_json::from_str(content).map_err(ParseFailure::Json)?;
    let list = match value {
        Value::Array(list) => Value::Array(list),
        Value::Object(mut map) => match map.remove("events").or_else(|| map.remove("incidents")) {
            Some(list @ Value::Array(_)) => list,
            _ => return Err(ParseFailure::Shape),
        },
        _ => return Err(ParseFailure::Shape),
    };
    serde_json::from_value(list).map_err(ParseFailure::Json)
}
