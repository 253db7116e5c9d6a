use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::{ConversationConfig, WatcherConfig};
use crate::conversation::ConversationStore;
use crate::watcher::{DiffEvent, RunStats, Watcher};

/// Repeating background jobs: the watcher run and the idle-conversation
/// sweep.
pub struct WatchScheduler {
    scheduler: JobScheduler,
    watcher: Arc<Watcher>,
    store: ConversationStore,
    events: mpsc::Sender<DiffEvent>,
    watch_interval: Duration,
    sweep_interval: Duration,
    inactivity: chrono::Duration,
    jobs: Vec<Uuid>,
}

impl WatchScheduler {
    pub async fn new(
        watcher: Arc<Watcher>,
        store: ConversationStore,
        events: mpsc::Sender<DiffEvent>,
        watcher_config: &WatcherConfig,
        conversation_config: &ConversationConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            watcher,
            store,
            events,
            watch_interval: Duration::from_secs(watcher_config.interval_minutes * 60),
            sweep_interval: Duration::from_secs(conversation_config.sweep_interval_minutes * 60),
            inactivity: chrono::Duration::minutes(conversation_config.inactivity_minutes),
            jobs: Vec::new(),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let watcher = Arc::clone(&self.watcher);
        let events = self.events.clone();
        let watch_job = Job::new_repeated_async(self.watch_interval, move |_uuid, _l| {
            let watcher = Arc::clone(&watcher);
            let events = events.clone();
            Box::pin(async move {
                Self::execute_watch_run(&watcher, &events).await;
            })
        })?;

        let store = self.store.clone();
        let inactivity = self.inactivity;
        let sweep_job = Job::new_repeated_async(self.sweep_interval, move |_uuid, _l| {
            let store = store.clone();
            Box::pin(async move {
                let removed = store.sweep(inactivity).await;
                if removed > 0 {
                    tracing::info!(removed, "Reclaimed idle conversations");
                }
            })
        })?;

        self.jobs.push(self.scheduler.add(watch_job).await?);
        self.jobs.push(self.scheduler.add(sweep_job).await?);
        self.scheduler.start().await?;

        tracing::info!(
            watch_interval_secs = self.watch_interval.as_secs(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Scheduler started"
        );
        Ok(())
    }

    /// Starts a watcher run right away, outside of the schedule.
    pub fn spawn_run_now(&self) -> JoinHandle<Option<RunStats>> {
        let watcher = Arc::clone(&self.watcher);
        let events = self.events.clone();
        tokio::spawn(async move { Self::execute_watch_run(&watcher, &events).await })
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        for job in self.jobs.drain(..) {
            self.scheduler.remove(&job).await?;
        }
        self.scheduler.shutdown().await?;
        tracing::info!("Scheduler shutdown");
        Ok(())
    }

    async fn execute_watch_run(watcher: &Watcher, events: &mpsc::Sender<DiffEvent>) -> Option<RunStats> {
        match watcher.run_once(events).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!(error = %e, "Watcher run aborted");
                metrics::counter!("watcher_runs_failed_total").increment(1);
                None
            }
        }
    }
}
