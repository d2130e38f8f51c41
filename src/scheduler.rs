//! The scheduled trigger: a long-lived task that, when enabled, submits
//! each configured playlist to the tagging orchestrator on a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::models::{ProgressEvent, TagPlaylistRequest};
use crate::orchestrator::TaggingOrchestrator;

pub struct Scheduler {
    orchestrator: Arc<TaggingOrchestrator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<TaggingOrchestrator>, config: SchedulerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Runs until cancelled. No-op if the scheduler is disabled.
    pub async fn run(&self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("scheduler disabled, not starting");
            return;
        }

        let playlist_ids = self.config.playlist_id_list();
        if playlist_ids.is_empty() {
            info!("scheduler enabled but no playlist ids configured, not starting");
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.initial_delay) => {}
            _ = cancel.cancelled() => return,
        }

        loop {
            self.run_once(&playlist_ids, &cancel).await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.fixed_delay) => {}
                _ = cancel.cancelled() => {
                    info!("scheduler received cancellation, shutting down");
                    return;
                }
            }
        }
    }

    async fn run_once(&self, playlist_ids: &[String], cancel: &CancellationToken) {
        let mut succeeded = 0u64;
        let mut failed = 0u64;

        for playlist_id in playlist_ids {
            if cancel.is_cancelled() {
                break;
            }

            let request = TagPlaylistRequest {
                playlist_input_raw: playlist_id.clone(),
                filters: None,
                strategy: None,
                verbosity: None,
            };
            let (sink, mut drain) = mpsc::channel::<ProgressEvent>(32);
            let drain_task = tokio::spawn(async move { while drain.recv().await.is_some() {} });

            let summary = self
                .orchestrator
                .run(request, sink, cancel.clone())
                .await;
            let _ = drain_task.await;

            if summary.failed == 0 {
                succeeded += 1;
            } else {
                failed += 1;
                error!(playlist_id, failed = summary.failed, "scheduled run had per-video failures");
            }
        }

        info!(total = playlist_ids.len(), succeeded, failed, "scheduler run complete");
    }
}
