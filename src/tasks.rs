//! Scheduled maintenance: revocation store purging, limiter pruning and
//! reaction counts.

use crate::db::Database;
use crate::rate_limit::{UserLimiter, prune_limiter};
use crate::revocation::RevocationStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Run all maintenance tasks once.
pub async fn run_tasks(db: &Database, revocations: &RevocationStore, limiter: &UserLimiter) {
    let purged = revocations.purge_expired();
    if purged > 0 {
        info!("Purged {} expired revocation entries", purged);
    }

    let live = prune_limiter(limiter);
    debug!("{} throttle keys still live", live);

    match db.movies().recompute_reaction_counts().await {
        Ok(count) => debug!("Recomputed reaction counts for {} movies", count),
        Err(e) => error!("Failed to recompute reaction counts: {}", e),
    }
}

/// Spawn a background task that runs maintenance every `period`.
/// Returns a handle that can be used to abort the task.
pub fn spawn_task_scheduler(
    db: Database,
    revocations: Arc<RevocationStore>,
    limiter: Arc<UserLimiter>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            run_tasks(&db, &revocations, &limiter).await;
        }
    })
}
