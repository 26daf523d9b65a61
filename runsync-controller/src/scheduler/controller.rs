//! Sync controller
//!
//! Periodically lists every pipeline carrying the sync request marker and
//! feeds the keys to a pool of workers. Each worker runs one sync pass at a
//! time; a failed pass is re-queued with per-key backoff, a successful one is
//! not re-queued at all until the marker is set again.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::repository::PipelineStore;
use crate::scheduler::queue::WorkQueue;
use crate::service::synchronizer::{PipelineRunSynchronizer, SyncOutcome};

/// Drives sync passes for every marked pipeline
pub struct Controller {
    synchronizer: Arc<PipelineRunSynchronizer>,
    pipelines: Arc<dyn PipelineStore>,
    queue: Arc<WorkQueue>,
    resync_interval: Duration,
    workers: usize,
}

impl Controller {
    pub fn new(
        synchronizer: Arc<PipelineRunSynchronizer>,
        pipelines: Arc<dyn PipelineStore>,
        queue: Arc<WorkQueue>,
        resync_interval: Duration,
        workers: usize,
    ) -> Self {
        Self {
            synchronizer,
            pipelines,
            queue,
            resync_interval,
            workers: workers.max(1),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Runs until `shutdown` flips to `true`
    ///
    /// In-flight passes finish before this returns; queued keys are dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Starting controller (resync interval: {:?}, workers: {})",
            self.resync_interval, self.workers
        );

        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let controller = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                controller.run_worker(worker).await;
            }));
        }

        let mut ticker = time::interval(self.resync_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.resync().await {
                        error!("Error during resync: {:#}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Shutting down controller");
        self.queue.shutdown();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task panicked: {}", e);
            }
        }

        Ok(())
    }

    /// Enqueues every pipeline currently carrying the marker
    pub async fn resync(&self) -> Result<usize> {
        let keys = self.pipelines.list_sync_requested().await?;
        if !keys.is_empty() {
            debug!("Enqueueing {} pipeline(s) with a sync request", keys.len());
        }

        let count = keys.len();
        for key in keys {
            self.queue.add(key);
        }
        Ok(count)
    }

    async fn run_worker(&self, worker: usize) {
        debug!("Worker {} started", worker);
        while self.process_next().await {}
        debug!("Worker {} stopped", worker);
    }

    /// Takes one key off the queue and runs a pass for it
    ///
    /// Returns `false` once the queue has shut down.
    pub async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        match self.synchronizer.reconcile(&key).await {
            Ok(outcome) => {
                if let SyncOutcome::Synced(summary) = &outcome {
                    if summary.failures() > 0 {
                        warn!(
                            "Pipeline {} synced with {} failed change(s)",
                            key,
                            summary.failures()
                        );
                    }
                }
                self.queue.forget(&key);
            }
            Err(e) => {
                let delay = self.queue.add_rate_limited(key.clone());
                warn!("Sync of {} failed, retrying in {:?}: {}", key, delay, e);
            }
        }

        self.queue.done(&key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;
    use crate::service::retry::Backoff;
    use crate::source::fake::ScriptedRunSource;
    use runsync_core::domain::meta::{ObjectKey, ObjectMeta};
    use runsync_core::domain::pipeline::{PipelineDefinition, PipelineSpec};
    use runsync_core::domain::run::ExternalRun;

    fn setup(runs: Vec<ExternalRun>) -> (Arc<InMemoryStore>, Arc<ScriptedRunSource>, Arc<Controller>, ObjectKey) {
        let store = Arc::new(InMemoryStore::new());
        let source = Arc::new(ScriptedRunSource::new(runs));

        let mut pipeline =
            PipelineDefinition::new(ObjectMeta::new("devops", "build-app"), PipelineSpec::default());
        pipeline.request_sync("now");
        let key = store.insert_pipeline(pipeline).metadata.key();

        let synchronizer = PipelineRunSynchronizer::new(
            store.clone(),
            store.clone(),
            source.clone(),
            store.clone(),
        )
        .with_backoff(Backoff {
            steps: 2,
            duration: Duration::from_millis(1),
            ..Default::default()
        });

        let controller = Arc::new(Controller::new(
            Arc::new(synchronizer),
            store.clone(),
            Arc::new(WorkQueue::default()),
            Duration::from_secs(30),
            2,
        ));

        (store, source, controller, key)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_then_process_clears_marker() {
        let (store, _source, controller, key) = setup(vec![ExternalRun::new("1")]);

        assert_eq!(controller.resync().await.unwrap(), 1);
        assert!(controller.process_next().await);

        assert!(!store.pipeline(&key).unwrap().has_sync_request());
        assert_eq!(store.records().len(), 1);

        // Nothing is marked any more
        assert_eq!(controller.resync().await.unwrap(), 0);
        assert!(controller.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pass_is_requeued_with_backoff() {
        let (store, source, controller, key) = setup(vec![ExternalRun::new("1")]);
        source.set_failing(true);

        controller.resync().await.unwrap();
        assert!(controller.process_next().await);
        assert_eq!(controller.queue().num_requeues(&key), 1);
        assert!(store.pipeline(&key).unwrap().has_sync_request());

        // The retry lands after the backoff and succeeds once the source recovers
        source.set_failing(false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.queue().len(), 1);
        assert!(controller.process_next().await);

        assert_eq!(controller.queue().num_requeues(&key), 0);
        assert!(!store.pipeline(&key).unwrap().has_sync_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let (store, _source, controller, key) =
            setup(vec![ExternalRun::new("1"), ExternalRun::new("2")]);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Arc::clone(&controller).run(rx));

        for _ in 0..100 {
            if !store.pipeline(&key).unwrap().has_sync_request() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!store.pipeline(&key).unwrap().has_sync_request());
        assert_eq!(store.records().len(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert!(controller.queue().is_shutting_down());
    }
}
