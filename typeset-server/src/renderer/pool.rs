//! Render pool
//!
//! Accepted jobs are queued on a bounded channel. A single dispatcher task
//! takes a semaphore permit before pulling the next job, then spawns one
//! task per job that holds the permit until the engine has exited. The
//! permit count is the upper bound on concurrently running engines.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use typeset_core::domain::job::JobId;

use super::invoker::RenderInvoker;

/// Scheduling error type
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("render queue is closed, job {0} was not scheduled")]
    Closed(JobId),
}

/// Handle used to queue jobs for rendering
///
/// Cloning shares the same queue. The dispatcher stops once every handle
/// has been dropped and the queue is empty.
#[derive(Clone)]
pub struct RenderPool {
    sender: mpsc::Sender<JobId>,
}

impl RenderPool {
    /// Start the dispatcher
    ///
    /// Returns the queue handle and the dispatcher task. Awaiting the task
    /// after dropping every handle waits for all queued and running renders.
    pub fn start(
        invoker: Arc<RenderInvoker>,
        max_parallel: usize,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let semaphore = Arc::new(Semaphore::new(max_parallel));

        info!(
            "Starting render pool (max parallel: {}, queue capacity: {})",
            max_parallel, queue_capacity
        );

        let handle = tokio::spawn(dispatch(receiver, invoker, semaphore));
        (Self { sender }, handle)
    }

    /// Queue a job, waiting for room when the queue is full
    ///
    /// Never waits for the render itself.
    pub async fn schedule(&self, id: JobId) -> Result<(), ScheduleError> {
        self.sender
            .send(id)
            .await
            .map_err(|mpsc::error::SendError(id)| ScheduleError::Closed(id))?;
        debug!("Job {} queued for rendering", id);
        Ok(())
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<JobId>,
    invoker: Arc<RenderInvoker>,
    semaphore: Arc<Semaphore>,
) {
    let mut tasks = JoinSet::new();

    loop {
        // Hold a slot before taking a job so queued jobs stay in the channel
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let Some(id) = receiver.recv().await else {
            break;
        };

        tasks.spawn(render_job(Arc::clone(&invoker), id, permit));

        while let Some(finished) = tasks.try_join_next() {
            report_join(finished);
        }
    }

    if !tasks.is_empty() {
        info!("Render queue closed, waiting for {} render(s)", tasks.len());
    }
    while let Some(finished) = tasks.join_next().await {
        report_join(finished);
    }
    info!("Render pool stopped");
}

async fn render_job(invoker: Arc<RenderInvoker>, id: JobId, _permit: OwnedSemaphorePermit) {
    match invoker.render(id).await {
        Ok(status) => debug!("Render task for job {} ended with {}", id, status),
        Err(e) => error!("Failed to render job {}: {}", id, e),
    }
    // Permit is released when dropped
}

fn report_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!("Render task panicked: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::renderer::fake_engine;
    use crate::repository::{MemoryStatusStore, StatusStore};
    use crate::storage::JobDirectoryStore;
    use tempfile::TempDir;
    use typeset_core::domain::job::JobStatus;

    struct Fixture {
        statuses: Arc<MemoryStatusStore>,
        directories: JobDirectoryStore,
        _tmp: TempDir,
        invoker: Arc<RenderInvoker>,
    }

    fn fixture(engine_body: &str) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let directories = JobDirectoryStore::new(tmp.path().join("jobs")).unwrap();
        let statuses = Arc::new(MemoryStatusStore::new());
        let program = fake_engine(tmp.path(), "engine.sh", engine_body);
        let invoker = Arc::new(RenderInvoker::new(
            statuses.clone(),
            directories.clone(),
            RendererConfig {
                program,
                ..RendererConfig::default()
            },
        ));
        Fixture {
            statuses,
            directories,
            _tmp: tmp,
            invoker,
        }
    }

    async fn accept(fixture: &Fixture) -> JobId {
        let id = JobId::generate();
        fixture.statuses.set(id, JobStatus::Pending).await.unwrap();
        let dir = fixture.directories.ensure(id).await.unwrap();
        std::fs::write(dir.join("main.tex"), id.to_string()).unwrap();
        id
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let fixture = fixture("sleep 0.05; cp \"$1\" main.pdf");
        let (pool, handle) = RenderPool::start(fixture.invoker.clone(), 2, 8);

        let mut ids = Vec::new();
        for _ in 0..5 {
            let id = accept(&fixture).await;
            pool.schedule(id).await.unwrap();
            ids.push(id);
        }

        drop(pool);
        handle.await.unwrap();

        for id in ids {
            assert_eq!(
                fixture.statuses.get(id).await.unwrap(),
                Some(JobStatus::Success)
            );
            let artifact = fixture.directories.resolve(id).join("main.pdf");
            assert_eq!(std::fs::read_to_string(artifact).unwrap(), id.to_string());
        }
    }

    #[tokio::test]
    async fn test_single_slot_never_overlaps_engines() {
        // The engine takes a lock shared by every job; a second concurrent
        // engine fails to take it and exits nonzero.
        let lock = std::env::temp_dir().join(format!("typeset-lock-{}", JobId::generate()));
        let fixture = fixture(&format!(
            "mkdir '{lock}' || exit 9\nsleep 0.05\ncp \"$1\" main.pdf\nrmdir '{lock}'",
            lock = lock.display()
        ));
        let (pool, handle) = RenderPool::start(fixture.invoker.clone(), 1, 8);

        let mut ids = Vec::new();
        for _ in 0..4 {
            let id = accept(&fixture).await;
            pool.schedule(id).await.unwrap();
            ids.push(id);
        }
        drop(pool);
        handle.await.unwrap();

        for id in ids {
            assert_eq!(
                fixture.statuses.get(id).await.unwrap(),
                Some(JobStatus::Success)
            );
        }
        assert!(!lock.exists());
    }

    #[tokio::test]
    async fn test_failed_jobs_do_not_stop_the_pool() {
        let fixture = fixture("exit 1");
        let (pool, handle) = RenderPool::start(fixture.invoker.clone(), 2, 4);

        let failing = accept(&fixture).await;
        let no_source = JobId::generate();
        fixture
            .statuses
            .set(no_source, JobStatus::Pending)
            .await
            .unwrap();

        pool.schedule(failing).await.unwrap();
        pool.schedule(no_source).await.unwrap();
        drop(pool);
        handle.await.unwrap();

        assert_eq!(
            fixture.statuses.get(failing).await.unwrap(),
            Some(JobStatus::FailedRenderError)
        );
        assert_eq!(
            fixture.statuses.get(no_source).await.unwrap(),
            Some(JobStatus::FailedNoSource)
        );
    }

    #[tokio::test]
    async fn test_schedule_after_dispatcher_stopped() {
        let fixture = fixture("exit 0");
        let (pool, handle) = RenderPool::start(fixture.invoker.clone(), 1, 1);

        handle.abort();
        let _ = handle.await;

        let id = JobId::generate();
        let err = pool.schedule(id).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Closed(rejected) if rejected == id));
    }
}
