use std::sync::Arc;

use chrono::{DateTime, Utc};
use lockmint_core::{AppState, Command};
use serde::Serialize;
use socketioxide::{
    extract::{SocketRef, State as SocketState, TryData},
    socket::Sid as SocketSid,
};
use tokio::sync::watch;
use tracing::debug;

use crate::state::ServerState;

#[derive(Debug, Serialize)]
pub(crate) struct StateData<'a> {
    pub(crate) id: SocketSid,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) state: &'a AppState,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorData {
    pub(crate) id: SocketSid,
    pub(crate) message: String,
}

fn emit_state(socket: &SocketRef, state: &AppState) {
    let data = StateData {
        id: socket.id,
        timestamp: Utc::now(),
        state,
    };
    socket.emit("state", &data).ok();
}

pub(crate) async fn ws(socket: SocketRef, state: SocketState<Arc<ServerState>>) {
    debug!(ns = socket.ns(), ?socket.id, "Socket.IO connected");

    let store = state.store.clone();
    let mut updates = store.subscribe();
    emit_state(&socket, &updates.borrow_and_update());

    {
        let store = store.clone();
        socket.on(
            "command",
            move |socket: SocketRef, TryData::<Command>(command)| {
                match command {
                    Ok(command) => {
                        debug!(?socket.id, ?command, "Received command");
                        store.dispatch(command);
                    }
                    Err(err) => {
                        let message = format!("Invalid command: {err}");

                        debug!(?socket.id, ?message);

                        let response_data = ErrorData {
                            id: socket.id,
                            message,
                        };
                        socket.emit("error", &response_data).ok();
                    }
                }
            },
        );
    }

    // Use a watch channel for graceful task cancellation
    let (tx, mut rx) = watch::channel(());

    // Send disconnect event when the task is cancelled
    socket.on_disconnect(move || {
        debug!("Socket disconnected");

        tx.send(()).ok();
    });

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased; // Check for task cancellation first

                _ = rx.changed() => {
                    debug!(?socket.id, "Task cancelled");

                    break;
                },
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = Arc::clone(&updates.borrow_and_update());
                    emit_state(&socket, &state);
                },
            }
        }
    });
}
