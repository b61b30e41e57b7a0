//! Scheduled expiration sweep.
//!
//! The sweep is a single background task owned by the process: the caller
//! keeps the returned handle and aborts it on shutdown. Ticks are awaited
//! inline, so a slow sweep can never overlap the next one; a tick that
//! comes due mid-sweep is delayed, not stacked.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::services::PollService;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between expiration sweeps (default: 1 hour).
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

/// Spawn the expiration sweep loop.
///
/// The first tick fires immediately, so one sweep always runs eagerly at
/// startup. Sweep failures are logged and retried at the next tick only.
pub fn spawn_expiration_sweep(
    poll_service: PollService,
    config: SchedulerConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = config.sweep_interval.as_secs(),
            "Expiration sweep scheduler started"
        );

        loop {
            ticker.tick().await;
            match poll_service.sweep_expired().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Deactivated expired polls");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Expiration sweep failed");
                }
            }
        }
    })
}
