//! Background expiry of abandoned upload sessions

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::UploadOrchestrator;

/// Configuration for the idle session sweeper
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. Zero disables the sweeper.
    pub interval: Duration,
    /// Sessions untouched for this long are aborted
    pub max_idle: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_idle: Duration::from_secs(60 * 60),
        }
    }
}

/// Spawn the sweeper task. Returns `None` when the interval is zero.
///
/// Abort the returned handle to stop sweeping.
pub fn spawn_idle_sweeper(
    orchestrator: Arc<UploadOrchestrator>,
    config: SweepConfig,
) -> Option<JoinHandle<()>> {
    // tokio::time::interval panics on a zero period
    if config.interval.is_zero() {
        info!("Idle session sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = config.interval.as_secs(),
            max_idle_secs = config.max_idle.as_secs(),
            "Idle session sweeper started"
        );

        loop {
            ticker.tick().await;
            let expired = orchestrator.sweep_idle(config.max_idle);
            if expired > 0 {
                info!(expired, "Idle session sweeper expired abandoned uploads");
            } else {
                debug!(
                    active = orchestrator.active_sessions(),
                    "Idle session sweep found nothing to expire"
                );
            }
        }
    }))
}
