use std::{collections::HashSet, sync::Arc};

use lockmint_core::{query::execute, ChainClient};
use tracing::{debug, info};

use crate::store::Store;

/// Execute pending queries as they show up in the store, one task per
/// query, and fold each response back in. Also performs deferred
/// cross-layer ecosystem switches.
pub(crate) async fn run(store: Store, client: Arc<dyn ChainClient>) {
    let mut rx = store.subscribe();
    let mut started = HashSet::new();

    loop {
        let state = Arc::clone(&rx.borrow_and_update());

        if let Some(ecosystem) = state.target_ecosystem {
            store.reload(ecosystem);
            continue;
        }

        for pending in &state.pending_queries {
            if !started.insert(pending.id) {
                continue;
            }
            debug!(id = pending.id, kind = pending.query.kind(), "Starting query");

            let store = store.clone();
            let client = Arc::clone(&client);
            let state = Arc::clone(&state);
            let pending = pending.clone();
            tokio::spawn(async move {
                let response = execute(client.as_ref(), &state, pending).await;
                store.apply_response(response);
            });
        }
        started.retain(|id| state.pending_queries.iter().any(|pending| pending.id == *id));

        if rx.changed().await.is_err() {
            info!("Store closed, stopping query runner");
            break;
        }
    }
}
