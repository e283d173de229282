use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use lockmint_core::{AppState, Command};
use serde::Serialize;

use crate::state::ServerState;

#[derive(Debug, Serialize)]
pub(crate) struct DispatchData {
    pub(crate) changed: bool,
    pub(crate) error: Option<String>,
}

#[axum::debug_handler]
pub(crate) async fn state(State(state): State<Arc<ServerState>>) -> Json<AppState> {
    Json(AppState::clone(&state.store.snapshot()))
}

#[axum::debug_handler]
pub(crate) async fn dispatch(
    State(state): State<Arc<ServerState>>,
    Json(command): Json<Command>,
) -> (StatusCode, Json<DispatchData>) {
    let changed = state.store.dispatch(command);
    let error = state.store.snapshot().error.clone();

    (StatusCode::ACCEPTED, Json(DispatchData { changed, error }))
}
