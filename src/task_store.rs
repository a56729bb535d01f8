//! Durable task store: one current task plus newest-first history.
//!
//! The store accepts any write; the history admission limit is the
//! orchestrator's concern.

use crate::error::StoreError;
use crate::model::{CurrentTask, HistoryTask, VideoHistory};
use crate::storage::{JsonRecord, HISTORY_FILE};
use std::path::Path;
use tokio::sync::watch;
use tracing::debug;

pub struct TaskStore {
    record: JsonRecord<VideoHistory>,
}

impl TaskStore {
    /// Open (or seed) `video_history.json` inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            record: JsonRecord::open(data_dir.join(HISTORY_FILE))?,
        })
    }

    pub fn path(&self) -> &Path {
        self.record.path()
    }

    pub fn snapshot(&self) -> VideoHistory {
        self.record.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<VideoHistory> {
        self.record.subscribe()
    }

    pub fn get_current(&self) -> CurrentTask {
        self.record.get().current_task
    }

    pub fn set_current(&self, task: CurrentTask) -> Result<(), StoreError> {
        debug!(task_id = %task.task_id, "set current task");
        self.record.update(|h| h.current_task = task)
    }

    pub fn clear_current(&self) -> Result<(), StoreError> {
        self.record.update(|h| h.current_task = CurrentTask::default())
    }

    /// Overwrite the current task's progress as reported. No-op when nothing is in flight.
    pub fn update_progress(&self, progress: u8) -> Result<(), StoreError> {
        self.record.update(|h| {
            if !h.current_task.is_empty() {
                h.current_task.progress = progress;
            }
        })
    }

    pub fn get_history(&self) -> Vec<HistoryTask> {
        self.record.get().history_tasks
    }

    pub fn history_len(&self) -> usize {
        self.record.get().history_tasks.len()
    }

    /// Prepend `task` (history is newest first). Production writes go through
    /// `complete_current`, which does the same inside the task move.
    #[cfg(test)]
    pub fn add_to_history(&self, task: HistoryTask) -> Result<(), StoreError> {
        self.record.update(|h| h.history_tasks.insert(0, task))
    }

    /// Remove by id. Returns whether anything was removed; absent ids are a no-op.
    pub fn remove_from_history(&self, task_id: &str) -> Result<bool, StoreError> {
        self.record.update(|h| {
            let before = h.history_tasks.len();
            h.history_tasks.retain(|t| t.task_id != task_id);
            h.history_tasks.len() != before
        })
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.record.update(|h| h.history_tasks.clear())
    }

    /// Move the current task into history with `video_url` and clear it, as a
    /// single record replace. Returns the new history entry, or `None` when
    /// nothing was in flight.
    pub fn complete_current(&self, video_url: &str) -> Result<Option<HistoryTask>, StoreError> {
        self.record.update(|h| {
            if h.current_task.is_empty() {
                return None;
            }
            let done = HistoryTask::from_current(&h.current_task, video_url);
            h.history_tasks.insert(0, done.clone());
            h.current_task = CurrentTask::default();
            Some(done)
        })
    }
}
