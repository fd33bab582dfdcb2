use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::codec::TaskCodec;
use crate::config::ManagerConfig;
use crate::runtime::client::{CompletionClient, CompletionRequest};
use crate::runtime::fallback::{FallbackSequencer, Sequenced};
use crate::runtime::storage::{KvStore, TaskMap, TaskStore};
use crate::runtime::types::{
    CANCELLED, ManagerError, SequenceError, TaskEvent, TaskId, TaskRecord, TaskStatus,
};

/// Capacity of the status-event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Record type produced by a manager over codec `C`.
pub type CodecRecord<C> = TaskRecord<<C as TaskCodec>::Request, <C as TaskCodec>::Output>;

/// A run that has been started and not yet finished.
struct Inflight {
    /// Distinguishes this run from earlier runs of a reused id.
    epoch: u64,
    cancel_tx: watch::Sender<bool>,
}

struct Inner<C: TaskCodec> {
    config: ManagerConfig,
    codec: C,
    sequencer: FallbackSequencer,
    store: TaskStore<C::Request, C::Output>,
    /// Authoritative records. The write lock is held across every
    /// mutate-and-persist, which serializes saves to the store.
    records: RwLock<TaskMap<C::Request, C::Output>>,
    /// Never held across an await.
    inflight: Mutex<HashMap<TaskId, Inflight>>,
    next_epoch: AtomicU64,
    events: broadcast::Sender<TaskEvent>,
}

/// Owns task records, runs each task through the fallback sequencer and
/// persists every transition.
///
/// Constructed explicitly by the application and shared by cloning; clones
/// are cheap handles to the same state.
///
/// # Usage
///
/// ```rust,ignore
/// let manager = TaskManager::new(config, client, NamingCodec, kv);
/// manager.resume_interrupted().await;
/// manager.start("t1", request, "qwen3:32b", config.model_names()).await?;
/// let record = manager.wait("t1", Duration::from_secs(600)).await?;
/// ```
pub struct TaskManager<C: TaskCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: TaskCodec> Clone for TaskManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: TaskCodec> std::fmt::Debug for TaskManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl<C: TaskCodec> TaskManager<C> {
    /// Build a manager and load persisted records from `kv`.
    ///
    /// Records found `running` are loaded as-is; call
    /// [`resume_interrupted`](Self::resume_interrupted) to restart them.
    pub fn new(
        config: ManagerConfig,
        client: Arc<dyn CompletionClient>,
        codec: C,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        let store = TaskStore::new(kv, config.store_key.clone());
        let records = store.load();
        info!(tasks = records.len(), key = %store.key(), "task manager ready");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                codec,
                sequencer: FallbackSequencer::new(client),
                store,
                records: RwLock::new(records),
                inflight: Mutex::new(HashMap::new()),
                next_epoch: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Start a task. Models are tried as `preferred_model` followed by
    /// `candidate_models` without it.
    ///
    /// Rejects an id that already has a running record; a terminal record
    /// under the same id is replaced.
    pub async fn start(
        &self,
        id: impl Into<TaskId>,
        request: C::Request,
        preferred_model: impl Into<String>,
        candidate_models: Vec<String>,
    ) -> Result<CodecRecord<C>, ManagerError> {
        let id = id.into();
        let record = TaskRecord::running(id.clone(), request, preferred_model, candidate_models);

        let (epoch, cancel_rx) = {
            let mut records = self.inner.records.write().await;
            if records.get(&id).is_some_and(|r| !r.is_terminal()) {
                warn!(task_id = %id, "start rejected: task already running");
                return Err(ManagerError::AlreadyRunning { task_id: id });
            }
            records.insert(id.clone(), record.clone());
            self.persist(&records);
            self.register(&id)
        };

        info!(
            task_id = %id,
            preferred_model = %record.preferred_model,
            "task started"
        );
        self.emit(&id, TaskStatus::Running);
        self.spawn_run(id, epoch, cancel_rx, record.request.clone(), record.model_order());
        Ok(record)
    }

    /// Current record for `id`.
    pub async fn status(&self, id: &str) -> Result<CodecRecord<C>, ManagerError> {
        self.inner
            .records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// All records, most recently started first.
    pub async fn list(&self) -> Vec<CodecRecord<C>> {
        let mut all: Vec<_> = self.inner.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    }

    /// Request cancellation of a running task.
    ///
    /// The in-flight completion call is aborted and the record moves to
    /// `failed` with error [`CANCELLED`]. On a terminal task this is a
    /// no-op returning the record unchanged.
    pub async fn cancel(&self, id: &str) -> Result<CodecRecord<C>, ManagerError> {
        let mut records = self.inner.records.write().await;
        let record = records.get_mut(id).ok_or_else(|| not_found(id))?;
        if record.is_terminal() {
            debug!(task_id = %id, status = %record.status, "cancel ignored: task already terminal");
            return Ok(record.clone());
        }

        if let Some(run) = self.inflight().get(id) {
            let _ = run.cancel_tx.send(true);
        }
        record.fail(CANCELLED);
        let snapshot = record.clone();
        self.persist(&records);
        drop(records);

        info!(task_id = %id, "task cancelled");
        self.emit(id, TaskStatus::Failed);
        Ok(snapshot)
    }

    /// Remove a record regardless of its status.
    ///
    /// A running task is not stopped: its call runs to completion and the
    /// outcome is discarded.
    pub async fn clear(&self, id: &str) -> Result<CodecRecord<C>, ManagerError> {
        let mut records = self.inner.records.write().await;
        let removed = records.remove(id).ok_or_else(|| not_found(id))?;
        self.inflight().remove(id);
        self.persist(&records);
        drop(records);

        if removed.is_terminal() {
            debug!(task_id = %id, "task cleared");
        } else {
            warn!(task_id = %id, "running task cleared; its in-flight call is orphaned");
        }
        Ok(removed)
    }

    /// Restart every record persisted as `running`, e.g. after a crash.
    ///
    /// The previous attempt may still be outstanding elsewhere, so a task can
    /// execute more than once. Returns the number of tasks resumed.
    pub async fn resume_interrupted(&self) -> usize {
        let resumed: Vec<_> = {
            let records = self.inner.records.read().await;
            TaskStore::interrupted(&records)
                .into_iter()
                .filter(|id| !self.inflight().contains_key(id))
                .filter_map(|id| records.get(&id).cloned())
                .map(|record| {
                    let (epoch, cancel_rx) = self.register(&record.id);
                    (record, epoch, cancel_rx)
                })
                .collect()
        };

        let count = resumed.len();
        for (record, epoch, cancel_rx) in resumed {
            info!(task_id = %record.id, "resuming interrupted task");
            let order = record.model_order();
            self.spawn_run(record.id, epoch, cancel_rx, record.request, order);
        }
        if count > 0 {
            info!(count, "interrupted tasks resumed");
        }
        count
    }

    /// Wait until `id` reaches a terminal state, re-reading it every
    /// `poll_interval`. Gives up after `ceiling`; the task itself keeps
    /// running.
    pub async fn wait(&self, id: &str, ceiling: Duration) -> Result<CodecRecord<C>, ManagerError> {
        let poll = async {
            let mut ticker = tokio::time::interval(self.inner.config.poll_interval);
            loop {
                ticker.tick().await;
                let record = self.status(id).await?;
                if record.is_terminal() {
                    return Ok::<_, ManagerError>(record);
                }
            }
        };

        match tokio::time::timeout(ceiling, poll).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ManagerError::WaitTimeout {
                task_id: id.to_owned(),
                waited_ms: ceiling.as_millis() as u64,
            }),
        }
    }

    /// Status changes as they happen. Lagging receivers lose events; this is
    /// a hint to re-check `status`, not a delivery guarantee.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn inflight(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, Inflight>> {
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an epoch and cancel channel for a new run of `id`.
    fn register(&self, id: &str) -> (u64, watch::Receiver<bool>) {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.inflight()
            .insert(id.to_owned(), Inflight { epoch, cancel_tx });
        (epoch, cancel_rx)
    }

    /// Blocking write under the records lock; the blob holds a handful of
    /// small records.
    fn persist(&self, records: &TaskMap<C::Request, C::Output>) {
        if let Err(e) = self.inner.store.save(records) {
            error!(error = %e, key = %self.inner.store.key(), "failed to persist tasks");
        }
    }

    fn emit(&self, id: &str, status: TaskStatus) {
        let _ = self.inner.events.send(TaskEvent {
            task_id: id.to_owned(),
            status,
        });
    }

    fn spawn_run(
        &self,
        id: TaskId,
        epoch: u64,
        cancel_rx: watch::Receiver<bool>,
        request: C::Request,
        order: Vec<String>,
    ) {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.execute(id, epoch, cancel_rx, request, order).await;
        });
    }

    /// Drive one run through the sequencer and record its outcome.
    async fn execute(
        self,
        id: TaskId,
        epoch: u64,
        cancel_rx: watch::Receiver<bool>,
        request: C::Request,
        order: Vec<String>,
    ) {
        let inner = &self.inner;
        let models = inner.config.resolve(&order);
        let prompt = CompletionRequest::new(
            inner.codec.render_prompt(&request),
            inner.codec.options().unwrap_or(inner.config.options),
        );

        let outcome = inner
            .sequencer
            .run(&models, &prompt, cancel_rx, |text| inner.codec.decode(text))
            .await;

        self.finish(&id, epoch, outcome).await;
    }

    async fn finish(
        &self,
        id: &str,
        epoch: u64,
        outcome: Result<Sequenced<C::Output>, SequenceError>,
    ) {
        let mut records = self.inner.records.write().await;

        let owned = {
            let mut inflight = self.inflight();
            let owned = inflight.get(id).is_some_and(|run| run.epoch == epoch);
            if owned {
                inflight.remove(id);
            }
            owned
        };

        let Some(record) = records.get_mut(id).filter(|_| owned) else {
            debug!(task_id = %id, epoch, "run outcome discarded: task cleared or restarted");
            return;
        };
        if record.is_terminal() {
            debug!(task_id = %id, status = %record.status, "run outcome discarded: task already terminal");
            return;
        }

        let status = match outcome {
            Ok(done) => {
                info!(task_id = %id, model = %done.model, failed_models = done.failures.len(), "task completed");
                record.complete(done.output);
                TaskStatus::Completed
            }
            Err(err) => {
                warn!(task_id = %id, error = %err, "task failed");
                record.fail(err.to_string());
                TaskStatus::Failed
            }
        };

        self.persist(&records);
        drop(records);
        self.emit(id, status);
    }
}

fn not_found(id: &str) -> ManagerError {
    ManagerError::NotFound {
        task_id: id.to_owned(),
    }
}
