use std::{fmt::Display, future::Future, time::Duration};

use tokio_retry::Retry;
use tracing::warn;

/// Back-off between attempts: one initial call plus three retries.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(1000),
    Duration::from_millis(2500),
    Duration::from_millis(5000),
];

/// Run `action`, retrying on any error with [`RETRY_DELAYS`]. The last
/// error is returned once the schedule is exhausted.
pub async fn with_retries<T, E, F, Fut>(label: &'static str, mut action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0u32;

    Retry::spawn(RETRY_DELAYS, || {
        attempt += 1;
        let attempt = attempt;
        let fut = action();

        async move {
            fut.await.inspect_err(|err| {
                warn!(label, attempt, %err, "Attempt failed");
            })
        }
    })
    .await
}
