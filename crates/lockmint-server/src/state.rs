use crate::store::Store;

/// Shared by the HTTP routes and the Socket.IO namespace.
#[derive(Debug, Clone)]
pub(crate) struct ServerState {
    pub(crate) store: Store,
}
