use std::sync::Arc;

use tracing::{debug, info};

use crate::scheduler::Scheduler;
use crate::session::SessionStore;

/// Register built-in background tasks
pub async fn register_builtin_tasks(
    scheduler: &mut Scheduler,
    sessions: Arc<SessionStore>,
    sweep_cron: &str,
) -> anyhow::Result<()> {
    scheduler
        .add_cron_job("0 0 * * * *", "heartbeat", || {
            Box::pin(async {
                info!("Heartbeat: relay is alive");
            })
        })
        .await?;

    scheduler
        .add_cron_job(sweep_cron, "session-sweep", move || {
            let sessions = sessions.clone();
            Box::pin(async move {
                let evicted = sessions.evict_idle().await;
                if evicted > 0 {
                    info!(
                        "Evicted {} idle session(s), {} remaining",
                        evicted,
                        sessions.len().await
                    );
                } else {
                    debug!("No idle sessions to evict");
                }
            })
        })
        .await?;

    Ok(())
}
