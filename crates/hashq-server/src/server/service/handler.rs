//! HTTP handlers for dispatch, lookup, statistics and shutdown.
//!
//! ## Routes
//!
//! | Method      | Path          | Success                        | Errors        |
//! |-------------|---------------|--------------------------------|---------------|
//! | `POST`      | `/hash`       | `200` id as `text/plain`       | `400`, `503`  |
//! | `GET`       | `/hash/{id}`  | `200` output as a JSON string  | `400`, `404`  |
//! | `GET`       | `/stats`      | `200` `{"total", "average"}`   |               |
//! | `POST`/`GET`| `/shutdown`   | `200` immediately              |               |
//!
//! `POST /hash` expects an `application/x-www-form-urlencoded` body with a
//! `password` field.

use super::error::ApiError;
use axum::{
    Form, Json, Router,
    extract::{Path, State, rejection::FormRejection},
    http::StatusCode,
    routing::{get, post},
};
use hashq::{Error, HashId, Snapshot, WorkCoordinator};
use serde::Deserialize;
use std::sync::Arc;

const MISSING_PASSWORD: &str = "Please populate a x-www-form-urlencoded field with a key of \
                                \"password\" and a value of the password to be hashed";

const MISSING_ID: &str =
    "No index could be found in the URL. Please use a URL of the form /hash/<index> (e.g. /hash/1)";

/// Shared handler state. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct AppState {
    coordinator: Arc<WorkCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<WorkCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<WorkCoordinator> {
        &self.coordinator
    }

    /// Stops admission and drains outstanding units in the background.
    ///
    /// Draining begins synchronously, so requests arriving after this call are
    /// refused. The wait for outstanding units runs on its own task; the
    /// caller never blocks on it. Repeated calls are no-ops.
    pub fn trigger_shutdown(&self) {
        if !self.coordinator.drain().begin_drain() {
            return;
        }

        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            coordinator.shutdown().await;
        });
    }
}

#[derive(Debug, Deserialize)]
pub struct HashForm {
    password: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hash", post(hash_post).get(hash_missing_id))
        .route("/hash/{id}", get(hash_get))
        .route("/stats", get(stats))
        .route("/shutdown", post(shutdown).get(shutdown))
        .with_state(state)
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn hash_post(
    State(state): State<AppState>,
    form: Result<Form<HashForm>, FormRejection>,
) -> Result<String, ApiError> {
    if state.coordinator.is_draining() {
        return Err(Error::ServiceShutdown.into());
    }

    let password = form
        .ok()
        .and_then(|Form(form)| form.password)
        .filter(|password| !password.is_empty())
        .ok_or_else(|| Error::InvalidInput {
            reason: MISSING_PASSWORD.to_string(),
        })?;

    let id = state.coordinator.dispatch(password)?;

    #[cfg(feature = "tracing")]
    tracing::info!(%id, "Accepted password for hashing");

    Ok(id.to_string())
}

async fn hash_missing_id() -> Result<String, ApiError> {
    Err(Error::InvalidInput {
        reason: MISSING_ID.to_string(),
    }
    .into())
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn hash_get(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<String>, ApiError> {
    let id: HashId = raw.parse()?;
    Ok(Json(state.coordinator.fetch(id)?))
}

async fn stats(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.coordinator.stats())
}

async fn shutdown(State(state): State<AppState>) -> StatusCode {
    #[cfg(feature = "tracing")]
    tracing::info!(
        "Shutdown requested with {} outstanding units",
        state.coordinator.outstanding()
    );

    state.trigger_shutdown();
    StatusCode::OK
}
