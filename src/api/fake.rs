//! Scripted in-memory backend for tests.

use super::{CreateVideoRequest, VideoApi};
use crate::error::ApiError;
use crate::model::{TaskStatus, VoiceCatalog};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub(crate) struct FakeApi {
    pub created_ids: Mutex<VecDeque<Result<String, String>>>,
    pub statuses: Mutex<VecDeque<Result<TaskStatus, String>>>,
    pub script: Mutex<Option<Result<String, String>>>,
    pub terms: Mutex<Option<Result<Vec<String>, String>>>,
    pub voices: Mutex<Option<Result<VoiceCatalog, String>>>,
    pub create_calls: Mutex<Vec<CreateVideoRequest>>,
    pub status_calls: Mutex<Vec<String>>,
    /// When set, `create_job` parks until the gate is notified.
    pub create_gate: Mutex<Option<Arc<Notify>>>,
}

pub(crate) fn status(progress: f64, state: i32) -> TaskStatus {
    TaskStatus {
        progress,
        state,
        ..Default::default()
    }
}

pub(crate) fn done(url: &str) -> TaskStatus {
    TaskStatus {
        progress: 100.0,
        state: TaskStatus::STATE_COMPLETE,
        videos: Some(vec![url.to_string()]),
        ..Default::default()
    }
}

fn fail(reason: String) -> ApiError {
    ApiError::Payload(reason)
}

impl FakeApi {
    pub fn creating(task_id: &str) -> Self {
        let api = Self::default();
        api.created_ids
            .lock()
            .unwrap()
            .push_back(Ok(task_id.to_string()));
        api
    }

    pub fn with_statuses(self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .extend(statuses.into_iter().map(Ok));
        self
    }

    pub fn push_status_error(&self, reason: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
    }

    pub fn gate_creation(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.create_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VideoApi for FakeApi {
    async fn create_job(&self, req: &CreateVideoRequest) -> Result<String, ApiError> {
        self.create_calls.lock().unwrap().push(req.clone());
        let gate = self.create_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.created_ids.lock().unwrap().pop_front();
        match next {
            Some(Ok(id)) => Ok(id),
            Some(Err(reason)) => Err(fail(reason)),
            None => Err(fail("no scripted task id".into())),
        }
    }

    async fn get_job_status(&self, task_id: &str) -> Result<TaskStatus, ApiError> {
        self.status_calls.lock().unwrap().push(task_id.to_string());
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(Ok(s)) => Ok(s),
            Some(Err(reason)) => Err(fail(reason)),
            // Scripts that run dry keep reporting "in progress".
            None => Ok(status(0.0, 0)),
        }
    }

    async fn generate_script(&self, _subject: &str, _language: &str) -> Result<String, ApiError> {
        match self.script.lock().unwrap().clone() {
            Some(Ok(s)) => Ok(s),
            Some(Err(reason)) => Err(fail(reason)),
            None => Err(fail("no scripted script".into())),
        }
    }

    async fn get_search_terms(
        &self,
        _subject: &str,
        _script: &str,
        _language: &str,
    ) -> Result<Vec<String>, ApiError> {
        match self.terms.lock().unwrap().clone() {
            Some(Ok(t)) => Ok(t),
            Some(Err(reason)) => Err(fail(reason)),
            None => Err(fail("no scripted terms".into())),
        }
    }

    async fn voice_models(&self) -> Result<VoiceCatalog, ApiError> {
        match self.voices.lock().unwrap().clone() {
            Some(Ok(c)) => Ok(c),
            Some(Err(reason)) => Err(fail(reason)),
            None => Err(fail("no scripted voices".into())),
        }
    }
}
