//! Shared data types: service configuration, the persisted task record,
//! backend status payloads, the voice catalogue, and user-facing notices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of history entries kept before new submissions are refused.
pub const HISTORY_LIMIT: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Host of the voice catalogue endpoint.
    pub tool_base_url: String,
    pub data_dir: PathBuf,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub model_name: String,
    pub user_agent: String,
}

/// The in-flight job tracked by this process. An empty `task_id` is the
/// "nothing in flight" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTask {
    pub task_id: String,
    pub task_subject: String,
    pub progress: u8,
    pub created_at: String,
}

impl CurrentTask {
    pub fn new(task_id: impl Into<String>, task_subject: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_subject: task_subject.into(),
            progress: 0,
            created_at: now_timestamp(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.task_id.is_empty()
    }
}

/// A completed job. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTask {
    pub task_id: String,
    pub task_subject: String,
    pub video_url: String,
    pub created_at: String,
}

impl HistoryTask {
    /// Build the history record for a finished current task.
    pub fn from_current(current: &CurrentTask, video_url: impl Into<String>) -> Self {
        Self {
            task_id: current.task_id.clone(),
            task_subject: current.task_subject.clone(),
            video_url: video_url.into(),
            created_at: current.created_at.clone(),
        }
    }
}

/// Whole persisted task record (`video_history`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoHistory {
    #[serde(default)]
    pub current_task: CurrentTask,
    #[serde(default)]
    pub history_tasks: Vec<HistoryTask>,
}

/// Status payload for one task as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub progress: f64,
    pub state: i32,
    #[serde(rename = "302_videos", default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<String>>,
    #[serde(
        rename = "302_combined_videos",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub combined_videos: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
}

impl TaskStatus {
    pub const STATE_COMPLETE: i32 = 1;
    pub const STATE_FAILED: i32 = -1;

    pub fn is_complete(&self) -> bool {
        self.state == Self::STATE_COMPLETE
    }

    pub fn is_failed(&self) -> bool {
        self.state == Self::STATE_FAILED
    }

    /// Progress rounded into `0..=100`. Ordering across polls is not enforced.
    pub fn progress_percent(&self) -> u8 {
        if !self.progress.is_finite() {
            return 0;
        }
        self.progress.round().clamp(0.0, 100.0) as u8
    }

    /// First rendered video, falling back to the combined output.
    pub fn result_url(&self) -> Option<&str> {
        self.videos
            .as_deref()
            .and_then(|v| v.first())
            .or_else(|| self.combined_videos.as_deref().and_then(|v| v.first()))
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}

/// One narration voice offered by a TTS provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Sample clip URL keyed by language code.
    #[serde(default)]
    pub sample: BTreeMap<String, String>,
}

impl Voice {
    /// Sample for `language` (English when blank), falling back to Chinese.
    pub fn sample_for(&self, language: &str) -> Option<&str> {
        let language = if language.is_empty() { "en" } else { language };
        self.sample
            .get(language)
            .or_else(|| self.sample.get("zh"))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceModel {
    pub model_name: String,
    pub voices: Vec<Voice>,
}

/// Voices the backend offers, grouped by provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceCatalog {
    pub models: Vec<VoiceModel>,
}

impl VoiceCatalog {
    pub fn from_response(raw: BTreeMap<String, Vec<Voice>>) -> Self {
        Self {
            models: raw
                .into_iter()
                .map(|(model_name, voices)| VoiceModel { model_name, voices })
                .collect(),
        }
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.model_name.as_str()).collect()
    }

    /// Provider keys come back lowercase ("azure") while the form stores
    /// "Azure", so the lookup ignores ASCII case.
    pub fn voices_for(&self, model_name: &str) -> &[Voice] {
        self.models
            .iter()
            .find(|m| m.model_name.eq_ignore_ascii_case(model_name))
            .map(|m| m.voices.as_slice())
            .unwrap_or(&[])
    }

    pub fn sample_url(&self, voice_name: &str, language: &str) -> Option<&str> {
        self.models
            .iter()
            .flat_map(|m| m.voices.iter())
            .find(|v| v.name == voice_name)
            .and_then(|v| v.sample_for(language))
    }

    pub fn knows(&self, model_name: &str, voice_name: &str) -> bool {
        self.voices_for(model_name)
            .iter()
            .any(|v| v.name == voice_name)
    }
}

/// User-visible notifications emitted by the orchestrator and consumed by UI/CLI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    TaskCreated { task_id: String },
    TaskCreateFailed { reason: String },
    Generating { task_id: String, progress: u8 },
    VideoGenerated { task_id: String, video_url: String },
    VideoFailed { task_id: String, reason: String },
    Resumed { task_id: String },
    HistoryLimitReached { limit: usize },
    HistoryDeleted { task_id: String },
    HistoryCleared,
    ScriptGenerated,
    ScriptFailed { reason: String },
}

impl Notice {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            Notice::TaskCreated { task_id } => format!("Video task created: {task_id}"),
            Notice::TaskCreateFailed { reason } => {
                format!("Failed to create video task: {reason}")
            }
            Notice::Generating { progress, .. } => format!("Generating video… {progress}%"),
            Notice::VideoGenerated { video_url, .. } => {
                format!("Video generated: {video_url}")
            }
            Notice::VideoFailed { task_id, reason } => {
                format!("Video generation failed for {task_id}: {reason}")
            }
            Notice::Resumed { task_id } => format!("Resumed tracking of task {task_id}"),
            Notice::HistoryLimitReached { limit } => format!(
                "History is full ({limit} videos). Delete old entries before generating again."
            ),
            Notice::HistoryDeleted { task_id } => format!("Deleted {task_id} from history"),
            Notice::HistoryCleared => "History cleared".to_string(),
            Notice::ScriptGenerated => "Video script generated".to_string(),
            Notice::ScriptFailed { reason } => format!("Failed to generate script: {reason}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::TaskCreateFailed { .. }
                | Notice::VideoFailed { .. }
                | Notice::HistoryLimitReached { .. }
                | Notice::ScriptFailed { .. }
        )
    }
}

/// Local wall-clock timestamp used for `createdAt`.
pub fn now_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| "now".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_backend_payload() {
        let raw = r#"{"progress":100,"state":1,"302_videos":["u.mp4"],"audio_duration":12.5}"#;
        let status: TaskStatus = serde_json::from_str(raw).unwrap();
        assert!(status.is_complete());
        assert!(!status.is_failed());
        assert_eq!(status.result_url(), Some("u.mp4"));
        assert_eq!(status.progress_percent(), 100);
    }

    #[test]
    fn result_url_falls_back_to_combined_output() {
        let status = TaskStatus {
            state: 1,
            videos: Some(vec![]),
            combined_videos: Some(vec!["combined.mp4".into()]),
            ..Default::default()
        };
        assert_eq!(status.result_url(), Some("combined.mp4"));
    }

    #[test]
    fn progress_is_clamped_not_smoothed() {
        let over = TaskStatus {
            progress: 140.2,
            ..Default::default()
        };
        let negative = TaskStatus {
            progress: -3.0,
            ..Default::default()
        };
        assert_eq!(over.progress_percent(), 100);
        assert_eq!(negative.progress_percent(), 0);
    }

    fn catalog() -> VoiceCatalog {
        let raw = r#"{
            "azure": [
                {"name": "en-US-AndrewMultilingualNeural-V2", "displayName": "Andrew",
                 "gender": "Male", "locale": "en-US", "langs": ["en"],
                 "sample": {"en": "https://x/andrew-en.mp3", "zh": "https://x/andrew-zh.mp3"}},
                {"name": "zh-CN-XiaoxiaoMultilingualNeural-V2", "displayName": "Xiaoxiao",
                 "gender": "Female", "locale": "zh-CN", "langs": ["zh"],
                 "sample": {"zh": "https://x/xiaoxiao-zh.mp3"}}
            ],
            "fish": []
        }"#;
        VoiceCatalog::from_response(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn voice_lookup_ignores_provider_case() {
        let catalog = catalog();
        assert_eq!(catalog.model_names(), vec!["azure", "fish"]);
        assert_eq!(catalog.voices_for("Azure").len(), 2);
        assert!(catalog.voices_for("OpenAI").is_empty());
        assert!(catalog.knows("Azure", "zh-CN-XiaoxiaoMultilingualNeural-V2"));
        assert!(!catalog.knows("Fish", "zh-CN-XiaoxiaoMultilingualNeural-V2"));
    }

    #[test]
    fn sample_falls_back_to_chinese() {
        let catalog = catalog();
        assert_eq!(
            catalog.sample_url("en-US-AndrewMultilingualNeural-V2", ""),
            Some("https://x/andrew-en.mp3")
        );
        assert_eq!(
            catalog.sample_url("zh-CN-XiaoxiaoMultilingualNeural-V2", "ja"),
            Some("https://x/xiaoxiao-zh.mp3")
        );
        assert_eq!(catalog.sample_url("missing", "en"), None);
    }

    #[test]
    fn history_uses_original_field_names() {
        let history = VideoHistory {
            current_task: CurrentTask::default(),
            history_tasks: vec![HistoryTask {
                task_id: "A1".into(),
                task_subject: "cats".into(),
                video_url: "u.mp4".into(),
                created_at: "2024-12-31 10:00:00".into(),
            }],
        };
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["currentTask"]["taskId"], "");
        assert_eq!(json["historyTasks"][0]["videoUrl"], "u.mp4");
        assert_eq!(json["historyTasks"][0]["taskSubject"], "cats");
    }
}
