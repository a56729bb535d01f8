use super::{CreateVideoRequest, VideoApi};
use crate::error::ApiError;
use crate::model::{ServiceConfig, TaskStatus, Voice, VoiceCatalog};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const SCRIPTS_PATH: &str = "302/stock-video/api/v1/scripts";
const TERMS_PATH: &str = "302/stock-video/api/v1/terms";
const VIDEOS_PATH: &str = "302/stock-video/api/v1/videos";
const TASKS_PATH: &str = "302/stock-video/api/v1/tasks";
const VOICE_MODELS_PATH: &str = "api/voice/model?lang=zh";

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: i64,
}

#[derive(Debug, Deserialize)]
struct ScriptData {
    video_script: String,
}

#[derive(Debug, Deserialize)]
struct TermsData {
    #[serde(default)]
    video_terms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    task_id: String,
}

/// HTTP client for the stock-video backend.
pub struct StockVideoClient {
    http: reqwest::Client,
    base_url: String,
    tool_base_url: String,
    model_name: String,
}

impl StockVideoClient {
    pub fn new(cfg: &ServiceConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            tool_base_url: cfg.tool_base_url.trim_end_matches('/').to_string(),
            model_name: cfg.model_name.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::parse_envelope(response).await
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn parse_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let envelope: Envelope<T> = response.json().await?;
        debug!(status = envelope.status, message = %envelope.message, "api response");
        Ok(envelope.data)
    }
}

#[async_trait]
impl VideoApi for StockVideoClient {
    async fn create_job(&self, req: &CreateVideoRequest) -> Result<String, ApiError> {
        debug!(subject = %req.video_subject, "creating video task");
        let response = self
            .http
            .post(self.url(VIDEOS_PATH))
            .json(req)
            .send()
            .await?;
        let created: CreatedTask = Self::parse_envelope(response).await?;
        if created.task_id.is_empty() {
            return Err(ApiError::Payload("empty task_id".into()));
        }
        Ok(created.task_id)
    }

    async fn get_job_status(&self, task_id: &str) -> Result<TaskStatus, ApiError> {
        debug!(task_id, "querying video task status");
        let response = self
            .http
            .get(format!("{}/{}", self.url(TASKS_PATH), task_id))
            .send()
            .await?;
        let mut by_id: HashMap<String, TaskStatus> = Self::parse_envelope(response).await?;
        by_id
            .remove(task_id)
            .ok_or_else(|| ApiError::Payload(format!("no status for task {task_id}")))
    }

    async fn generate_script(&self, subject: &str, language: &str) -> Result<String, ApiError> {
        debug!(subject, language, "generating video script");
        let body = serde_json::json!({
            "video_subject": subject,
            "video_language": language,
            "models_name": self.model_name,
        });
        let data: ScriptData = self.post(SCRIPTS_PATH, &body).await?;
        Ok(data.video_script)
    }

    async fn get_search_terms(
        &self,
        subject: &str,
        script: &str,
        language: &str,
    ) -> Result<Vec<String>, ApiError> {
        debug!(subject, language, "getting video terms");
        let body = serde_json::json!({
            "video_subject": subject,
            "video_script": script,
            "video_language": language,
            "models_name": self.model_name,
        });
        let data: TermsData = self.post(TERMS_PATH, &body).await?;
        Ok(data.video_terms)
    }

    async fn voice_models(&self) -> Result<VoiceCatalog, ApiError> {
        debug!("fetching voice catalogue");
        let response = self
            .http
            .get(format!("{}/{}", self.tool_base_url, VOICE_MODELS_PATH))
            .send()
            .await?;
        // Unlike the video endpoints this one is not wrapped in an envelope.
        let raw: BTreeMap<String, Vec<Voice>> =
            Self::ensure_success(response).await?.json().await?;
        Ok(VoiceCatalog::from_response(raw))
    }
}
