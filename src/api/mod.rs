//! Remote video generation backend.
//!
//! `VideoApi` is the seam the orchestrator talks to; `StockVideoClient` is the
//! HTTP implementation.

mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::StockVideoClient;

use crate::error::ApiError;
use crate::form::VideoForm;
use crate::model::{TaskStatus, VoiceCatalog};
use async_trait::async_trait;
use serde::Serialize;

/// Body of the job creation request. Everything the form carries except the
/// output language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateVideoRequest {
    pub video_subject: String,
    pub video_script: String,
    pub video_terms: String,
    pub video_source: String,
    pub video_concat_mode: String,
    pub video_aspect: String,
    pub video_clip_duration: String,
    pub subtitle_enabled: bool,
    pub subtitle_font: String,
    pub subtitle_position: String,
    pub font_size: f64,
    pub stroke_width: f64,
    pub text_fore_color: String,
    pub stroke_color: String,
    pub voice_type: String,
    pub voice_name: String,
    pub voice_volume: String,
    pub bgm_type: String,
    pub bgm_volume: String,
}

impl From<&VideoForm> for CreateVideoRequest {
    fn from(form: &VideoForm) -> Self {
        Self {
            video_subject: form.video_subject.clone(),
            video_script: form.video_script.clone(),
            video_terms: form.video_terms.clone(),
            video_source: form.video_source.clone(),
            video_concat_mode: form.video_concat_mode.clone(),
            video_aspect: form.video_aspect.clone(),
            video_clip_duration: form.video_clip_duration.clone(),
            subtitle_enabled: form.subtitle_enabled,
            subtitle_font: form.subtitle_font.clone(),
            subtitle_position: form.subtitle_position.clone(),
            font_size: form.font_size,
            stroke_width: form.stroke_width,
            text_fore_color: form.text_fore_color.clone(),
            stroke_color: form.stroke_color.clone(),
            voice_type: form.model_name.clone(),
            voice_name: form.voice_name.clone(),
            voice_volume: form.voice_volume.clone(),
            // "null" is the form's "no background music" choice.
            bgm_type: if form.bgm_type == "null" {
                String::new()
            } else {
                form.bgm_type.clone()
            },
            bgm_volume: form.bgm_volume.clone(),
        }
    }
}

#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Create a rendering job and return its task id.
    async fn create_job(&self, req: &CreateVideoRequest) -> Result<String, ApiError>;

    /// Fetch the status of one job.
    async fn get_job_status(&self, task_id: &str) -> Result<TaskStatus, ApiError>;

    /// Generate a narration script for `subject` in `language`.
    async fn generate_script(&self, subject: &str, language: &str) -> Result<String, ApiError>;

    /// Suggest stock-footage search terms for a script.
    async fn get_search_terms(
        &self,
        subject: &str,
        script: &str,
        language: &str,
    ) -> Result<Vec<String>, ApiError>;

    /// Voices available for narration, per TTS provider.
    async fn voice_models(&self) -> Result<VoiceCatalog, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_bgm_is_sent_as_empty() {
        let form = VideoForm {
            bgm_type: "null".into(),
            ..Default::default()
        };
        let req = CreateVideoRequest::from(&form);
        assert_eq!(req.bgm_type, "");
        assert_eq!(req.voice_type, "Azure");
    }

    #[test]
    fn request_uses_snake_case_keys() {
        let req = CreateVideoRequest::from(&VideoForm::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["video_source"], "pexels");
        assert_eq!(json["bgm_type"], "random");
        assert!(json.get("video_language").is_none());
    }
}
