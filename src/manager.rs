use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::UploaderConfig;
use crate::errors::{UploadError, UploadResult};
use crate::handler::HandlerRegistry;
use crate::preview::PreviewInfo;
use crate::progress::{ProgressSimulator, ProgressSink};
use crate::types::{
    Category, ProvisionalMessage, QueueStatus, Status, TransferResult, UploadCallbacks,
    UploadFailure, UploadFile, UploadOptions, UploadSuccess,
};

/// Returned by a resolved upload: the task id plus the server-assigned
/// message descriptor.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub task_id: String,
    pub result: TransferResult,
}

/// One in-flight upload attempt. Present in the queue only while Sending; the
/// terminal transition removes it in the same step its callback fires.
struct UploadTask {
    file: UploadFile,
    category: Category,
    status: Status,
    preview: PreviewInfo,
    provisional: ProvisionalMessage,
    cancel: CancellationToken,
    simulator: Arc<ProgressSimulator>,
}

/// Record of a terminal task, kept so retry can re-issue the same file after
/// the task has left the queue.
struct FinishedUpload {
    task_id: String,
    file: UploadFile,
    category: Category,
}

/// Bounded ledger of finished uploads backing retry-after-removal.
const FINISHED_LEDGER_CAP: usize = 32;

/// The upload orchestrator: owns the task queue, selects handlers, sequences
/// validation, preview, provisional-message emission, transfer and
/// completion, and dispatches lifecycle callbacks to its caller.
///
/// The queue is the only shared mutable structure; every mutation happens
/// under its lock with no suspension point in between.
pub struct UploadManager {
    handlers: HandlerRegistry,
    queue: Mutex<HashMap<String, UploadTask>>,
    finished: Mutex<VecDeque<FinishedUpload>>,
    callbacks: Arc<Mutex<UploadCallbacks>>,
}

static GLOBAL_MANAGER: OnceLock<UploadManager> = OnceLock::new();

impl UploadManager {
    pub fn new(config: UploaderConfig) -> UploadResult<Self> {
        config.validate()?;

        Ok(Self {
            handlers: HandlerRegistry::new(&config)?,
            queue: Mutex::new(HashMap::new()),
            finished: Mutex::new(VecDeque::new()),
            callbacks: Arc::new(Mutex::new(UploadCallbacks::default())),
        })
    }

    /// Initialize the process-wide manager with an explicit configuration.
    /// Fails if a global manager already exists.
    pub fn init_global(config: UploaderConfig) -> UploadResult<()> {
        let manager = UploadManager::new(config)?;
        GLOBAL_MANAGER
            .set(manager)
            .map_err(|_| UploadError::Internal("upload manager already initialized".to_string()))
    }

    /// The process-wide manager, created with default configuration when no
    /// explicit `init_global` ran first.
    pub fn global() -> &'static UploadManager {
        GLOBAL_MANAGER.get_or_init(|| {
            UploadManager::new(UploaderConfig::default())
                .expect("default uploader configuration is valid")
        })
    }

    /// Register lifecycle callbacks. A single set is active at a time; the
    /// last registration wins.
    pub fn register_callbacks(&self, callbacks: UploadCallbacks) {
        match self.callbacks.lock() {
            Ok(mut slot) => *slot = callbacks,
            Err(e) => log::error!("Failed to register callbacks: {}", e),
        }
    }

    /// Upload one file. Parameter, validation and preview failures reject
    /// immediately with no task created; transfer-phase failures surface both
    /// through `on_failed` and the returned error, carrying the same text.
    pub async fn upload(
        &self,
        file: UploadFile,
        category: Category,
        options: UploadOptions,
    ) -> UploadResult<UploadOutcome> {
        if options.room_id.trim().is_empty() {
            return Err(UploadError::missing_parameter("room_id"));
        }
        if options.token.trim().is_empty() {
            return Err(UploadError::missing_parameter("token"));
        }

        let handler = self.handlers.get(category);
        handler.validate(&file)?;

        let preview = handler.generate_preview(&file).await?;

        let task_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let provisional =
            handler.build_provisional_message(&task_id, &preview, &options.user_info, &options.room_id);

        log::info!(
            "Starting {} upload {} ({}, {} bytes)",
            category,
            task_id,
            file.name,
            file.size_bytes
        );

        let sink = self.progress_sink(task_id.clone());
        let simulator = Arc::new(ProgressSimulator::start(
            handler.config().progress_phases.clone(),
            cancel.clone(),
            Arc::clone(&sink),
        ));

        {
            let mut queue = match self.lock_queue() {
                Ok(queue) => queue,
                Err(e) => {
                    simulator.stop();
                    return Err(e);
                }
            };
            queue.insert(
                task_id.clone(),
                UploadTask {
                    file: file.clone(),
                    category,
                    status: Status::Sending,
                    preview,
                    provisional: provisional.clone(),
                    cancel: cancel.clone(),
                    simulator: Arc::clone(&simulator),
                },
            );
        }

        self.emit_status(&task_id, Status::Sending, Some(&provisional));

        let result = handler.upload(&file, &options, &cancel).await;

        match result {
            Ok(transfer) => {
                // finish() ends the simulated phase but leaves smoothing
                // live; a cancel that raced the transfer has already called
                // stop(), which silences the ramp entirely.
                simulator.finish();
                simulator.smooth_completion(&sink).await;
                self.finalize_success(&task_id, transfer)
            }
            Err(err) => {
                // No smoothing on failure; the simulator halts where it is.
                simulator.stop();
                self.finalize_failure(&task_id, err)
            }
        }
    }

    /// Upload with the category given by its wire name.
    pub async fn upload_by_name(
        &self,
        file: UploadFile,
        category: &str,
        options: UploadOptions,
    ) -> UploadResult<UploadOutcome> {
        let category = Category::parse(category)?;
        self.upload(file, category, options).await
    }

    /// Re-issue an upload for the file behind `task_id`. The retry is a fresh
    /// upload with a new task id; the original id is not resurrected.
    pub async fn retry(&self, task_id: &str, options: UploadOptions) -> UploadResult<UploadOutcome> {
        let live = {
            let queue = self.lock_queue()?;
            queue
                .get(task_id)
                .map(|task| (task.file.clone(), task.category))
        };

        let (file, category) = match live {
            Some(source) => {
                // Retrying a task that is still in flight abandons the old
                // attempt first, releasing its preview resources.
                self.cancel(task_id)?;
                source
            }
            None => {
                let finished = self
                    .finished
                    .lock()
                    .map_err(|e| UploadError::Internal(format!("finished ledger poisoned: {}", e)))?;
                finished
                    .iter()
                    .rev()
                    .find(|entry| entry.task_id == task_id)
                    .map(|entry| (entry.file.clone(), entry.category))
                    .ok_or_else(|| {
                        UploadError::Internal(format!("no record of task {}", task_id))
                    })?
            }
        };

        log::info!("Retrying upload of {} as a new task", file.name);
        self.upload(file, category, options).await
    }

    /// Cancel an in-flight upload. Returns `Ok(false)` when the task is gone
    /// already (completed or unknown id); cancelling after completion is a
    /// no-op, not an error.
    pub fn cancel(&self, task_id: &str) -> UploadResult<bool> {
        let task = {
            let mut queue = self.lock_queue()?;
            queue.remove(task_id)
        };

        let Some(mut task) = task else {
            log::debug!("Cancel for unknown or completed task {}", task_id);
            return Ok(false);
        };

        task.simulator.stop();
        task.cancel.cancel();
        task.status = Status::Failed;
        task.preview.release();
        self.record_finished(task_id, task.file, task.category)?;

        log::info!("Cancelled upload task {}", task_id);

        self.emit_failed(&UploadFailure {
            task_id: task_id.to_string(),
            error: UploadError::Cancelled.to_string(),
            provisional_message: Some(task.provisional.clone()),
            cancelled: true,
        });
        self.emit_status(task_id, Status::Failed, Some(&task.provisional));

        Ok(true)
    }

    /// Point-in-time snapshot of the queue. Completed tasks leave the queue
    /// in the same step their terminal callback fires, so the terminal counts
    /// are best-effort, not history.
    pub fn queue_status(&self) -> QueueStatus {
        let queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(e) => {
                log::error!("Failed to read queue status: {}", e);
                return QueueStatus::default();
            }
        };

        let mut status = QueueStatus {
            total: queue.len(),
            ..QueueStatus::default()
        };

        for task in queue.values() {
            match task.status {
                Status::Sending => status.sending += 1,
                Status::Success => status.success += 1,
                Status::Failed => status.failed += 1,
            }
        }

        status
    }

    fn finalize_success(
        &self,
        task_id: &str,
        transfer: TransferResult,
    ) -> UploadResult<UploadOutcome> {
        let task = {
            let mut queue = self.lock_queue()?;
            queue.remove(task_id)
        };

        let Some(mut task) = task else {
            // Cancelled while the transfer or smoothing was in flight; the
            // late result is discarded.
            log::info!("Discarding late result for cancelled task {}", task_id);
            return Err(UploadError::Cancelled);
        };

        task.status = Status::Success;
        task.preview.release();
        self.record_finished(task_id, task.file, task.category)?;

        log::info!(
            "Upload task {} succeeded with message id {}",
            task_id,
            transfer.message_id
        );

        self.emit_success(&UploadSuccess {
            task_id: task_id.to_string(),
            message_id: transfer.message_id.clone(),
            message: transfer.message.clone(),
            provisional_message: task.provisional.clone(),
        });
        self.emit_status(task_id, Status::Success, Some(&task.provisional));

        Ok(UploadOutcome {
            task_id: task_id.to_string(),
            result: transfer,
        })
    }

    fn finalize_failure(&self, task_id: &str, err: UploadError) -> UploadResult<UploadOutcome> {
        let task = {
            let mut queue = self.lock_queue()?;
            queue.remove(task_id)
        };

        let Some(mut task) = task else {
            // cancel() already finalized this task and fired its callbacks.
            return Err(UploadError::Cancelled);
        };

        task.status = Status::Failed;
        task.preview.release();
        self.record_finished(task_id, task.file, task.category)?;

        log::warn!("Upload task {} failed: {}", task_id, err);

        self.emit_failed(&UploadFailure {
            task_id: task_id.to_string(),
            error: err.to_string(),
            provisional_message: Some(task.provisional.clone()),
            cancelled: err.is_cancelled(),
        });
        self.emit_status(task_id, Status::Failed, Some(&task.provisional));

        Err(err)
    }

    fn record_finished(
        &self,
        task_id: &str,
        file: UploadFile,
        category: Category,
    ) -> UploadResult<()> {
        let mut finished = self
            .finished
            .lock()
            .map_err(|e| UploadError::Internal(format!("finished ledger poisoned: {}", e)))?;

        finished.push_back(FinishedUpload {
            task_id: task_id.to_string(),
            file,
            category,
        });
        while finished.len() > FINISHED_LEDGER_CAP {
            finished.pop_front();
        }

        Ok(())
    }

    fn lock_queue(&self) -> UploadResult<std::sync::MutexGuard<'_, HashMap<String, UploadTask>>> {
        self.queue
            .lock()
            .map_err(|e| UploadError::Internal(format!("upload queue poisoned: {}", e)))
    }

    fn progress_sink(&self, task_id: String) -> ProgressSink {
        let callbacks = Arc::clone(&self.callbacks);
        Arc::new(move |pct| {
            if let Ok(callbacks) = callbacks.lock() {
                if let Some(on_progress) = &callbacks.on_progress {
                    on_progress(&task_id, pct);
                }
            }
        })
    }

    fn emit_success(&self, payload: &UploadSuccess) {
        if let Ok(callbacks) = self.callbacks.lock() {
            if let Some(on_success) = &callbacks.on_success {
                on_success(payload);
            }
        }
    }

    fn emit_failed(&self, payload: &UploadFailure) {
        if let Ok(callbacks) = self.callbacks.lock() {
            if let Some(on_failed) = &callbacks.on_failed {
                on_failed(payload);
            }
        }
    }

    fn emit_status(&self, task_id: &str, status: Status, provisional: Option<&ProvisionalMessage>) {
        if let Ok(callbacks) = self.callbacks.lock() {
            if let Some(on_status_change) = &callbacks.on_status_change {
                on_status_change(task_id, status, provisional);
            }
        }
    }
}
