//! PersistenceQueue - deferred, ordered state writes
//!
//! Jobs run one at a time on a background task in enqueue order, so writes
//! for one session land in the order they were produced. Failed jobs are
//! retried with exponential backoff; appends carry entry IDs, so a retried
//! job never duplicates history.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::PersistenceConfig;
use crate::core::{SwitchboardError, SwitchboardResult};

use super::manager::{StateContext, StateManager};
use super::session::SessionUpdate;

/// A unit of deferred work
#[derive(Debug, Clone)]
pub enum PersistenceJob {
    /// Merge an update into a session
    Update {
        session_id: String,
        update: SessionUpdate,
        ctx: StateContext,
    },
    /// Rebuild the owner's cross-session memory from this session
    ShareMemory {
        session_id: String,
        ctx: StateContext,
    },
}

impl PersistenceJob {
    pub fn update(session_id: impl Into<String>, update: SessionUpdate, ctx: StateContext) -> Self {
        PersistenceJob::Update {
            session_id: session_id.into(),
            update,
            ctx,
        }
    }

    pub fn share_memory(session_id: impl Into<String>, ctx: StateContext) -> Self {
        PersistenceJob::ShareMemory {
            session_id: session_id.into(),
            ctx,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            PersistenceJob::Update { session_id, .. } => session_id,
            PersistenceJob::ShareMemory { session_id, .. } => session_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PersistenceJob::Update { .. } => "update",
            PersistenceJob::ShareMemory { .. } => "share_memory",
        }
    }

    async fn run(&self, manager: &StateManager) -> SwitchboardResult<()> {
        match self {
            PersistenceJob::Update {
                session_id,
                update,
                ctx,
            } => manager
                .update_session_state(session_id, update.clone(), ctx)
                .await
                .map(|_| ()),
            PersistenceJob::ShareMemory { session_id, ctx } => manager
                .share_session_memory(session_id, ctx)
                .await
                .map(|_| ()),
        }
    }
}

enum Command {
    Job(PersistenceJob),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Counters for queue outcomes
#[derive(Debug, Default)]
pub struct QueueStats {
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl QueueStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }
}

/// Errors worth another attempt
fn is_transient(error: &SwitchboardError) -> bool {
    matches!(
        error,
        SwitchboardError::Io(_) | SwitchboardError::ChannelClosed | SwitchboardError::Other(_)
    )
}

/// Background writer for session state
pub struct PersistenceQueue {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<QueueStats>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceQueue {
    /// Start the worker task
    pub fn spawn(manager: Arc<StateManager>, config: PersistenceConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());

        let worker = tokio::spawn(Self::run_worker(manager, config, rx, stats.clone()));

        Self {
            tx,
            stats,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn run_worker(
        manager: Arc<StateManager>,
        config: PersistenceConfig,
        mut rx: mpsc::UnboundedReceiver<Command>,
        stats: Arc<QueueStats>,
    ) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Job(job) => Self::run_job(&manager, &config, &stats, job).await,
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown(ack) => {
                    let _ = ack.send(());
                    break;
                }
            }
        }
        tracing::debug!("[PersistenceQueue] Worker stopped");
    }

    async fn run_job(
        manager: &StateManager,
        config: &PersistenceConfig,
        stats: &QueueStats,
        job: PersistenceJob,
    ) {
        let max_attempts = config.max_attempts.max(1);
        let mut delay = config.retry_delay();

        for attempt in 1..=max_attempts {
            match job.run(manager).await {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) if attempt < max_attempts && is_transient(&e) => {
                    tracing::warn!(
                        session_id = job.session_id(),
                        job = job.kind(),
                        attempt,
                        error = %e,
                        "[PersistenceQueue] Write failed, retrying"
                    );
                    stats.retried.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        session_id = job.session_id(),
                        job = job.kind(),
                        attempt,
                        error = %e,
                        "[PersistenceQueue] Write failed"
                    );
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }
    }

    /// Queue a job; returns immediately
    pub fn enqueue(&self, job: PersistenceJob) -> SwitchboardResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SwitchboardError::ChannelClosed);
        }
        self.tx
            .send(Command::Job(job))
            .map_err(|_| SwitchboardError::ChannelClosed)
    }

    /// Wait until every job queued before this call has finished
    pub async fn flush(&self) -> SwitchboardResult<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack))
            .map_err(|_| SwitchboardError::ChannelClosed)?;
        done.await.map_err(|_| SwitchboardError::ChannelClosed)
    }

    /// Drain pending jobs and stop the worker
    ///
    /// Later `enqueue` calls fail with `ChannelClosed`. Calling twice is a no-op.
    pub async fn shutdown(&self) -> SwitchboardResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }

        if let Some(worker) = self.worker.lock().await.take() {
            worker
                .await
                .map_err(|e| SwitchboardError::other(format!("Persistence worker failed: {}", e)))?;
        }

        tracing::info!(
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            "[PersistenceQueue] Shut down"
        );
        Ok(())
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl std::fmt::Debug for PersistenceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceQueue")
            .field("stats", &self.stats)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::backend::{MemoryBackend, StateBackend};
    use crate::state::session::{MessageEntry, SessionState};
    use crate::state::shared::SharedStateEntry;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    fn manager() -> Arc<StateManager> {
        Arc::new(StateManager::new(Arc::new(MemoryBackend::new())))
    }

    #[tokio::test]
    async fn test_jobs_apply_in_order() {
        let manager = manager();
        let queue = PersistenceQueue::spawn(manager.clone(), PersistenceConfig::default());
        let ctx = StateContext::new("alice").creating();

        for i in 0..10 {
            let update = SessionUpdate::new().append_message(MessageEntry::user(format!("m{}", i)));
            queue.enqueue(PersistenceJob::update("s1", update, ctx.clone())).unwrap();
        }
        queue.flush().await.unwrap();

        let state = manager.get_session_state("s1", &ctx).await.unwrap();
        let contents: Vec<_> = state.message_history.iter().map(|m| m.content.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("m{}", i)).collect();
        assert_eq!(contents, expected);
        assert_eq!(queue.stats().completed(), 10);
    }

    #[tokio::test]
    async fn test_replayed_job_is_idempotent() {
        let manager = manager();
        let queue = PersistenceQueue::spawn(manager.clone(), PersistenceConfig::default());
        let ctx = StateContext::new("alice").creating();

        let update = SessionUpdate::new().append_message(MessageEntry::user("once"));
        queue.enqueue(PersistenceJob::update("s1", update.clone(), ctx.clone())).unwrap();
        queue.enqueue(PersistenceJob::update("s1", update, ctx.clone())).unwrap();
        queue.flush().await.unwrap();

        let state = manager.get_session_state("s1", &ctx).await.unwrap();
        assert_eq!(state.message_history.len(), 1);
    }

    /// Backend whose first N session writes fail
    struct FlakyBackend {
        inner: MemoryBackend,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl StateBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn load_session(&self, id: &str) -> SwitchboardResult<Option<SessionState>> {
            self.inner.load_session(id).await
        }
        async fn save_session(&self, state: &SessionState) -> SwitchboardResult<()> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(SwitchboardError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk unavailable",
                )));
            }
            self.inner.save_session(state).await
        }
        async fn delete_session(&self, id: &str) -> SwitchboardResult<()> {
            self.inner.delete_session(id).await
        }
        async fn list_sessions(&self) -> SwitchboardResult<Vec<String>> {
            self.inner.list_sessions().await
        }
        async fn load_shared(&self, key: &str) -> SwitchboardResult<Option<SharedStateEntry>> {
            self.inner.load_shared(key).await
        }
        async fn save_shared(&self, entry: &SharedStateEntry) -> SwitchboardResult<()> {
            self.inner.save_shared(entry).await
        }
        async fn delete_shared(&self, key: &str) -> SwitchboardResult<()> {
            self.inner.delete_shared(key).await
        }
    }

    fn fast_retries(max_attempts: u32) -> PersistenceConfig {
        PersistenceConfig {
            max_attempts,
            retry_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let backend = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicU32::new(2),
        });
        let manager = Arc::new(StateManager::new(backend.clone()));
        let queue = PersistenceQueue::spawn(manager.clone(), fast_retries(3));
        let ctx = StateContext::new("alice").creating();

        let update = SessionUpdate::new().append_message(MessageEntry::user("hi"));
        queue.enqueue(PersistenceJob::update("s1", update, ctx.clone())).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(queue.stats().retried(), 2);
        assert_eq!(queue.stats().completed(), 1);
        assert_eq!(queue.stats().failed(), 0);
        assert!(backend.inner.load_session("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_reported() {
        let backend = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicU32::new(10),
        });
        let manager = Arc::new(StateManager::new(backend));
        let queue = PersistenceQueue::spawn(manager, fast_retries(2));

        let update = SessionUpdate::new().append_message(MessageEntry::user("hi"));
        queue
            .enqueue(PersistenceJob::update("s1", update, StateContext::new("alice").creating()))
            .unwrap();
        queue.flush().await.unwrap();

        assert_eq!(queue.stats().failed(), 1);
        assert_eq!(queue.stats().completed(), 0);
    }

    #[tokio::test]
    async fn test_permission_errors_not_retried() {
        let manager = manager();
        manager.create_session("s1", Some("alice")).await.unwrap();
        let queue = PersistenceQueue::spawn(manager, fast_retries(5));

        let update = SessionUpdate::new().append_message(MessageEntry::user("intrusion"));
        queue
            .enqueue(PersistenceJob::update("s1", update, StateContext::new("bob")))
            .unwrap();
        queue.flush().await.unwrap();

        assert_eq!(queue.stats().retried(), 0);
        assert_eq!(queue.stats().failed(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let manager = manager();
        let queue = PersistenceQueue::spawn(manager.clone(), PersistenceConfig::default());
        let ctx = StateContext::new("alice").creating();

        let update = SessionUpdate::new().append_message(MessageEntry::user("last words"));
        queue.enqueue(PersistenceJob::update("s1", update, ctx.clone())).unwrap();
        queue.shutdown().await.unwrap();

        let state = manager.get_session_state("s1", &ctx).await.unwrap();
        assert_eq!(state.message_history.len(), 1);

        let err = queue
            .enqueue(PersistenceJob::share_memory("s1", ctx))
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::ChannelClosed));
        queue.shutdown().await.unwrap();
    }
}
