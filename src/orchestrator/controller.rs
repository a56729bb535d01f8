//! Task lifecycle controller.
//!
//! Validates and admits submissions, creates the remote job, seeds the current
//! task and hands it to the poller. Also resumes an in-flight task found in
//! storage at startup.

use super::completion::TaskObserver;
use super::ResumeLatch;
use crate::api::{CreateVideoRequest, VideoApi};
use crate::engine::{FetchFn, PollConfig, Poller};
use crate::error::{StoreError, TaskError};
use crate::form::{FormField, FormStore, FormUpdateError, VideoForm};
use crate::model::{CurrentTask, HistoryTask, Notice, TaskStatus, VideoHistory, HISTORY_LIMIT};
use crate::task_store::TaskStore;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub(crate) struct Orchestrator {
    pub(super) api: Arc<dyn VideoApi>,
    store: Arc<TaskStore>,
    pub(super) form: Arc<FormStore>,
    poller: Poller<TaskStatus>,
    creating: watch::Sender<bool>,
    pub(super) notices: UnboundedSender<Notice>,
}

/// Resets the "creating" flag when task creation ends, however it ends.
struct CreatingGuard<'a>(&'a watch::Sender<bool>);

impl Drop for CreatingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn VideoApi>,
        store: Arc<TaskStore>,
        form: Arc<FormStore>,
        poll: PollConfig,
        notices: UnboundedSender<Notice>,
    ) -> Self {
        let observer = Arc::new(TaskObserver {
            store: store.clone(),
            notices: notices.clone(),
        });
        let fetch_api = api.clone();
        let fetch: FetchFn<TaskStatus> = Arc::new(move |task_id: String| {
            let api = fetch_api.clone();
            async move { api.get_job_status(&task_id).await }.boxed()
        });
        let (creating, _) = watch::channel(false);
        Self {
            api,
            store,
            form,
            poller: Poller::new(poll, fetch, observer),
            creating,
            notices,
        }
    }

    pub(super) fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Submit `form` as a new video task and start tracking it.
    ///
    /// Returns the remote task id once the job exists and polling has begun.
    /// Every error leaves the task store as it was.
    pub async fn submit(&self, form: &VideoForm) -> Result<String, TaskError> {
        let history_len = self.store.history_len();
        if history_len >= HISTORY_LIMIT {
            info!(history_len, "history at capacity, refusing submission");
            self.notify(Notice::HistoryLimitReached {
                limit: HISTORY_LIMIT,
            });
            return Err(TaskError::AdmissionLimit {
                limit: HISTORY_LIMIT,
            });
        }

        if let Err(errors) = form.validate() {
            debug!(?errors, "form validation failed");
            return Err(TaskError::Validation(errors));
        }

        if self.poller.is_polling() {
            debug!("already polling, skipping submission");
            return Err(TaskError::Busy);
        }
        let Some(_creating) = self.claim_creating() else {
            debug!("task creation already in flight, skipping submission");
            return Err(TaskError::Busy);
        };

        debug!(subject = %form.video_subject, "creating video task");
        let task_id = match self.api.create_job(&CreateVideoRequest::from(form)).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "error creating video task");
                self.notify(Notice::TaskCreateFailed {
                    reason: e.to_string(),
                });
                return Err(TaskError::RemoteCreate(e));
            }
        };

        let previous = self.store.get_current();
        if let Err(e) = self
            .store
            .set_current(CurrentTask::new(task_id.clone(), form.video_subject.clone()))
        {
            error!(task_id = %task_id, error = %e, "created task could not be recorded");
            self.notify(Notice::TaskCreateFailed {
                reason: e.to_string(),
            });
            return Err(TaskError::Store(e));
        }

        if self.poller.start(&task_id).is_none() {
            // Another session owns the poller; hand the record back to it.
            error!(task_id = %task_id, "poller busy after create, dropping new task");
            if let Err(e) = self.store.set_current(previous) {
                error!(error = %e, "failed to restore current task");
            }
            self.notify(Notice::TaskCreateFailed {
                reason: format!("task {task_id} was created while another task is tracked"),
            });
            return Err(TaskError::Busy);
        }
        info!(task_id = %task_id, "video task created");
        self.notify(Notice::TaskCreated {
            task_id: task_id.clone(),
        });
        Ok(task_id)
    }

    /// Take the creation slot. `None` when a submission or resumption
    /// already holds it.
    fn claim_creating(&self) -> Option<CreatingGuard<'_>> {
        let claimed = self.creating.send_if_modified(|creating| {
            if *creating {
                false
            } else {
                *creating = true;
                true
            }
        });
        claimed.then(|| CreatingGuard(&self.creating))
    }

    /// Submit whatever the persisted form currently holds.
    pub async fn submit_stored(&self) -> Result<String, TaskError> {
        let form = self.form.get();
        self.submit(&form).await
    }

    /// Resume polling a task left in storage by a previous process.
    ///
    /// Runs at most once per `latch`; later calls return `None` without
    /// touching the poller.
    pub fn resume(&self, latch: &ResumeLatch) -> Option<String> {
        if !latch.try_claim() {
            debug!("resumption already handled");
            return None;
        }
        let Some(_creating) = self.claim_creating() else {
            debug!("task creation in flight, skipping resumption");
            return None;
        };
        if self.poller.is_polling() {
            return None;
        }
        let current = self.store.get_current();
        if current.is_empty() {
            return None;
        }

        info!(task_id = %current.task_id, progress = current.progress, "resuming video task");
        self.poller.start(&current.task_id)?;
        self.notify(Notice::Resumed {
            task_id: current.task_id.clone(),
        });
        Some(current.task_id)
    }

    /// Wait until no polling session is active.
    pub async fn wait_idle(&self) {
        let mut rx = self.poller.subscribe();
        let _ = rx.wait_for(|active| !*active).await;
    }

    /// Stop tracking without settling the current task; it stays in storage
    /// and is picked up again by the next resumption.
    pub fn stop(&self) {
        self.poller.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    pub fn subscribe_polling(&self) -> watch::Receiver<bool> {
        self.poller.subscribe()
    }

    pub fn is_creating_task(&self) -> bool {
        *self.creating.borrow()
    }

    pub fn subscribe_creating(&self) -> watch::Receiver<bool> {
        self.creating.subscribe()
    }

    pub fn current_task(&self) -> CurrentTask {
        self.store.get_current()
    }

    pub fn history_tasks(&self) -> Vec<HistoryTask> {
        self.store.get_history()
    }

    pub fn snapshot(&self) -> VideoHistory {
        self.store.snapshot()
    }

    /// Reactive view of both the current task and the history.
    pub fn subscribe_tasks(&self) -> watch::Receiver<VideoHistory> {
        self.store.subscribe()
    }

    pub fn remove_history_task(&self, task_id: &str) -> Result<bool, StoreError> {
        let removed = self.store.remove_from_history(task_id)?;
        if removed {
            self.notify(Notice::HistoryDeleted {
                task_id: task_id.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.store.clear_history()?;
        self.notify(Notice::HistoryCleared);
        Ok(())
    }

    pub fn form(&self) -> VideoForm {
        self.form.get()
    }

    pub fn set_form_value(&self, field: &FormField, value: &str) -> Result<(), FormUpdateError> {
        self.form.set_value(field, value)
    }

    pub fn set_form_values(&self, values: &[(FormField, String)]) -> Result<(), FormUpdateError> {
        self.form.set_values(values)
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
