//! Terminal handling for a polled task.
//!
//! Writes progress into the store as it arrives, then either moves the current
//! task into history or clears it.

use crate::engine::{PollError, PollObserver};
use crate::error::TaskError;
use crate::model::{Notice, TaskStatus};
use crate::task_store::TaskStore;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

pub(super) struct TaskObserver {
    pub store: Arc<TaskStore>,
    pub notices: UnboundedSender<Notice>,
}

impl TaskObserver {
    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Clear the current task and report `err` once.
    fn settle_failure(&self, task_id: String, err: TaskError) {
        error!(task_id = %task_id, error = %err, "video task failed");
        if let Err(e) = self.store.clear_current() {
            error!(error = %e, "failed to clear current task");
        }
        let reason = match std::error::Error::source(&err) {
            Some(source) => format!("{err}: {source}"),
            None => err.to_string(),
        };
        self.notify(Notice::VideoFailed { task_id, reason });
    }
}

impl PollObserver<TaskStatus> for TaskObserver {
    fn is_complete(&self, data: &TaskStatus) -> bool {
        data.is_complete()
    }

    fn is_failed(&self, data: &TaskStatus) -> bool {
        data.is_failed()
    }

    fn on_data(&self, data: &TaskStatus) {
        let progress = data.progress_percent();
        debug!(progress, state = data.state, "task status");
        if let Err(e) = self.store.update_progress(progress) {
            warn!(error = %e, "failed to persist progress");
        }
        let task_id = self.store.get_current().task_id;
        self.notify(Notice::Generating { task_id, progress });
    }

    fn on_success(&self, data: TaskStatus) {
        let task_id = self.store.get_current().task_id;
        let Some(url) = data.result_url() else {
            self.settle_failure(
                task_id.clone(),
                TaskError::RemoteJobFailed { task_id },
            );
            return;
        };

        match self.store.complete_current(url) {
            Ok(Some(done)) => {
                info!(task_id = %done.task_id, video_url = %done.video_url, "video task succeeded");
                self.notify(Notice::VideoGenerated {
                    task_id: done.task_id,
                    video_url: done.video_url,
                });
            }
            Ok(None) => warn!("task completed but no current task was recorded"),
            Err(e) => self.settle_failure(task_id, TaskError::Store(e)),
        }
    }

    fn on_error(&self, error: PollError) {
        let task_id = self.store.get_current().task_id;
        let err = match error {
            PollError::Transport(e) => TaskError::PollTransport(e),
            PollError::Failed => TaskError::RemoteJobFailed {
                task_id: task_id.clone(),
            },
            PollError::TimedOut { attempts } => TaskError::PollTimeout {
                task_id: task_id.clone(),
                attempts,
            },
        };
        self.settle_failure(task_id, err);
    }
}
