use std::sync::Arc;

use lockmint_core::{reduce_command, reduce_response, AppState, Command, Ecosystem, QueryResponse};
use tokio::sync::watch;
use tracing::{debug, info};

/// Process-wide holder of the current [`AppState`].
///
/// Reducers run inside `send_if_modified`, so at most one transition is in
/// progress at a time and subscribers only wake up for a new state value.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    tx: Arc<watch::Sender<Arc<AppState>>>,
}

fn replace(current: &mut Arc<AppState>, next: Arc<AppState>) -> bool {
    if Arc::ptr_eq(current, &next) {
        false
    } else {
        *current = next;
        true
    }
}

impl Store {
    pub(crate) fn new(state: AppState) -> Self {
        let (tx, _) = watch::channel(Arc::new(state));
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.tx.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.tx.subscribe()
    }

    /// Returns whether the command changed the state.
    pub(crate) fn dispatch(&self, command: Command) -> bool {
        debug!(?command, "Dispatching command");
        self.tx.send_if_modified(|state| {
            let next = reduce_command(state, command);
            replace(state, next)
        })
    }

    pub(crate) fn apply_response(&self, response: QueryResponse) -> bool {
        self.tx.send_if_modified(|state| {
            let next = reduce_response(state, response);
            replace(state, next)
        })
    }

    /// Start over in `ecosystem`, as a page reload would.
    pub(crate) fn reload(&self, ecosystem: Ecosystem) {
        info!(?ecosystem, "Reloading into ecosystem");
        self.tx.send_modify(|state| {
            *state = Arc::new(state.reloaded(ecosystem));
        });
    }
}
