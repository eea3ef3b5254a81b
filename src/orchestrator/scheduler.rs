//! Fixed-interval tick scheduler.
//!
//! Runs [`Orchestrator::tick`] every `tick_interval_ms` until cancelled,
//! until `max_ticks` is reached, or until the kernel halts on an integrity
//! fault.

use crate::orchestrator::{Orchestrator, TickReport};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Totals over a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub applied: usize,
    pub rejected: usize,
    pub failed_activations: usize,
    pub timed_out_activations: usize,
    pub liquidated: usize,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.applied += report.applied();
        self.rejected += report.rejected();
        self.failed_activations += report.failed.len();
        self.timed_out_activations += report.timed_out.len();
        self.liquidated += report.liquidated.len();
    }
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    max_ticks: u64,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let interval = orchestrator.config().tick_interval();
        let max_ticks = orchestrator.config().max_ticks;
        Self {
            orchestrator,
            interval,
            max_ticks,
        }
    }

    /// Override the configured tick limit (0 = unlimited).
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Run the tick loop. Exits cooperatively when `cancel` is triggered and
    /// with an error when the kernel halts.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        info!(
            "Scheduler started (interval {:?}, max ticks {})",
            self.interval,
            if self.max_ticks == 0 {
                "unlimited".to_string()
            } else {
                self.max_ticks.to_string()
            }
        );

        let mut summary = RunSummary::default();
        loop {
            if self.max_ticks > 0 && summary.ticks >= self.max_ticks {
                info!("Reached {} ticks, stopping", summary.ticks);
                return Ok(summary);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    summary.ticks += 1;
                    match self.orchestrator.tick().await {
                        Ok(report) => summary.record(&report),
                        Err(e) if e.is_fatal() => {
                            error!("Kernel halted: {e}");
                            return Err(anyhow::Error::new(e).context("kernel halted"));
                        }
                        Err(e) => warn!("Tick failed: {e}"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Scheduler shutting down after {} ticks", summary.ticks);
                    return Ok(summary);
                }
            }
        }
    }
}
