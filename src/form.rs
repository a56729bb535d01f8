//! Video form record (`video_form`), field dispatch and validation.

use crate::error::StoreError;
use crate::storage::{JsonRecord, FORM_FILE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Last-submitted form values, persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoForm {
    pub video_subject: String,
    pub video_language: String,
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
    pub model_name: String,
    pub voice_name: String,
    pub voice_volume: String,
    pub bgm_type: String,
    pub bgm_volume: String,
}

impl Default for VideoForm {
    fn default() -> Self {
        Self {
            video_subject: String::new(),
            video_language: String::new(),
            video_script: String::new(),
            video_terms: String::new(),
            video_source: "pexels".into(),
            video_concat_mode: "sequential".into(),
            video_aspect: "16:9".into(),
            video_clip_duration: "3".into(),
            subtitle_enabled: true,
            subtitle_font: "华文黑体-中等粗细".into(),
            subtitle_position: "bottom".into(),
            font_size: 60.0,
            stroke_width: 1.5,
            text_fore_color: "#ffffff".into(),
            stroke_color: "#000000".into(),
            model_name: "Azure".into(),
            voice_name: "zh-CN-XiaoxiaoMultilingualNeural-V2".into(),
            voice_volume: "1".into(),
            bgm_type: "random".into(),
            bgm_volume: "0.2".into(),
        }
    }
}

/// Known form fields. Anything else lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormField {
    VideoSubject,
    VideoLanguage,
    VideoScript,
    VideoTerms,
    VideoSource,
    VideoConcatMode,
    VideoAspect,
    VideoClipDuration,
    SubtitleEnabled,
    SubtitleFont,
    SubtitlePosition,
    FontSize,
    StrokeWidth,
    TextForeColor,
    StrokeColor,
    ModelName,
    VoiceName,
    VoiceVolume,
    BgmType,
    BgmVolume,
    Other(String),
}

impl FormField {
    const KNOWN: [(FormField, &'static str); 20] = [
        (FormField::VideoSubject, "videoSubject"),
        (FormField::VideoLanguage, "videoLanguage"),
        (FormField::VideoScript, "videoScript"),
        (FormField::VideoTerms, "videoTerms"),
        (FormField::VideoSource, "videoSource"),
        (FormField::VideoConcatMode, "videoConcatMode"),
        (FormField::VideoAspect, "videoAspect"),
        (FormField::VideoClipDuration, "videoClipDuration"),
        (FormField::SubtitleEnabled, "subtitleEnabled"),
        (FormField::SubtitleFont, "subtitleFont"),
        (FormField::SubtitlePosition, "subtitlePosition"),
        (FormField::FontSize, "fontSize"),
        (FormField::StrokeWidth, "strokeWidth"),
        (FormField::TextForeColor, "textForeColor"),
        (FormField::StrokeColor, "strokeColor"),
        (FormField::ModelName, "modelName"),
        (FormField::VoiceName, "voiceName"),
        (FormField::VoiceVolume, "voiceVolume"),
        (FormField::BgmType, "bgmType"),
        (FormField::BgmVolume, "bgmVolume"),
    ];

    /// Map a validation path segment (e.g. `"videoScript"`) to a field.
    pub fn from_path(path: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|(_, name)| *name == path)
            .map(|(field, _)| field.clone())
            .unwrap_or_else(|| FormField::Other(path.to_string()))
    }

    /// Name of the input that should receive focus, if this is a known field.
    pub fn input_name(&self) -> Option<&'static str> {
        Self::KNOWN
            .iter()
            .find(|(field, _)| field == self)
            .map(|(_, name)| *name)
    }

    /// Translation key for the field's error message.
    pub fn message_key(&self) -> &'static str {
        match self {
            FormField::VideoSubject => "errors.videoSubject",
            FormField::VideoScript => "errors.videoScript",
            FormField::VideoTerms => "errors.videoTerms",
            FormField::FontSize => "errors.fontSize",
            FormField::StrokeWidth => "errors.strokeWidth",
            _ => "errors.validation",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormField::Other(name) => f.write_str(name),
            known => f.write_str(known.input_name().unwrap_or("unknown")),
        }
    }
}

impl FromStr for FormField {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_path(s))
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

impl FieldError {
    fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn message_key(&self) -> &'static str {
        self.field.message_key()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl VideoForm {
    /// Check required fields and numeric ranges. Errors come back in form order.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if !(30.0..=100.0).contains(&self.font_size) {
            errors.push(FieldError::new(
                FormField::FontSize,
                "Font size must be between 30 and 100",
            ));
        }
        if !(0.0..=10.0).contains(&self.stroke_width) {
            errors.push(FieldError::new(
                FormField::StrokeWidth,
                "Stroke width must be between 0 and 10",
            ));
        }
        if self.video_subject.trim().is_empty() {
            errors.push(FieldError::new(
                FormField::VideoSubject,
                "Video subject is required",
            ));
        }
        if self.video_script.trim().is_empty() {
            errors.push(FieldError::new(
                FormField::VideoScript,
                "Video script is required",
            ));
        }
        if self.video_terms.trim().is_empty() {
            errors.push(FieldError::new(FormField::VideoTerms, "Keywords is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Assign one field from its string form. Unknown fields and unparsable
    /// values are rejected with a field error.
    pub fn set_value(&mut self, field: &FormField, value: &str) -> Result<(), FieldError> {
        let text = |slot: &mut String| *slot = value.to_string();
        match field {
            FormField::VideoSubject => text(&mut self.video_subject),
            FormField::VideoLanguage => text(&mut self.video_language),
            FormField::VideoScript => text(&mut self.video_script),
            FormField::VideoTerms => text(&mut self.video_terms),
            FormField::VideoSource => text(&mut self.video_source),
            FormField::VideoConcatMode => text(&mut self.video_concat_mode),
            FormField::VideoAspect => text(&mut self.video_aspect),
            FormField::VideoClipDuration => text(&mut self.video_clip_duration),
            FormField::SubtitleFont => text(&mut self.subtitle_font),
            FormField::SubtitlePosition => text(&mut self.subtitle_position),
            FormField::TextForeColor => text(&mut self.text_fore_color),
            FormField::StrokeColor => text(&mut self.stroke_color),
            FormField::ModelName => text(&mut self.model_name),
            FormField::VoiceName => text(&mut self.voice_name),
            FormField::VoiceVolume => text(&mut self.voice_volume),
            FormField::BgmType => text(&mut self.bgm_type),
            FormField::BgmVolume => text(&mut self.bgm_volume),
            FormField::SubtitleEnabled => {
                self.subtitle_enabled = value
                    .parse()
                    .map_err(|_| FieldError::new(field.clone(), "expected true or false"))?;
            }
            FormField::FontSize => {
                self.font_size = value
                    .parse()
                    .map_err(|_| FieldError::new(field.clone(), "expected a number"))?;
            }
            FormField::StrokeWidth => {
                self.stroke_width = value
                    .parse()
                    .map_err(|_| FieldError::new(field.clone(), "expected a number"))?;
            }
            FormField::Other(_) => {
                return Err(FieldError::new(field.clone(), "unknown form field"));
            }
        }
        Ok(())
    }

    /// Search terms split on commas, trimmed, blanks dropped.
    pub fn terms(&self) -> Vec<String> {
        self.video_terms
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Durable `video_form` record.
pub struct FormStore {
    record: JsonRecord<VideoForm>,
}

impl FormStore {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            record: JsonRecord::open(data_dir.join(FORM_FILE))?,
        })
    }

    pub fn get(&self) -> VideoForm {
        self.record.get()
    }

    /// Set a single field and persist.
    pub fn set_value(&self, field: &FormField, value: &str) -> Result<(), FormUpdateError> {
        debug!(%field, "set form value");
        let applied = self.record.update(|form| form.set_value(field, value))?;
        applied.map_err(FormUpdateError::Field)
    }

    /// Apply several fields in one write; nothing is written if any value is rejected.
    pub fn set_values(&self, values: &[(FormField, String)]) -> Result<(), FormUpdateError> {
        let applied = self.record.update(|form| {
            let mut next = form.clone();
            for (field, value) in values {
                next.set_value(field, value)?;
            }
            *form = next;
            Ok(())
        })?;
        applied.map_err(FormUpdateError::Field)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormUpdateError {
    #[error("invalid value for {0}")]
    Field(FieldError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> VideoForm {
        VideoForm {
            video_subject: "cats".into(),
            video_script: "Cats are great.".into(),
            video_terms: "cat, kitten".into(),
            ..Default::default()
        }
    }

    #[test]
    fn filled_form_passes() {
        assert!(filled().validate().is_ok());
    }

    #[test]
    fn blank_script_is_reported_on_video_script() {
        let form = VideoForm {
            video_script: "   ".into(),
            ..filled()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, FormField::VideoScript);
        assert_eq!(errors[0].message_key(), "errors.videoScript");
        assert_eq!(errors[0].field.input_name(), Some("videoScript"));
    }

    #[test]
    fn required_fields_are_reported_in_order() {
        let errors = VideoForm::default().validate().unwrap_err();
        let fields: Vec<_> = errors.into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                FormField::VideoSubject,
                FormField::VideoScript,
                FormField::VideoTerms
            ]
        );
    }

    #[test]
    fn font_size_out_of_range() {
        let form = VideoForm {
            font_size: 12.0,
            ..filled()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors[0].field, FormField::FontSize);
    }

    #[test]
    fn unknown_field_falls_back() {
        let field = FormField::from_path("colorPickerHue");
        assert_eq!(field, FormField::Other("colorPickerHue".into()));
        assert_eq!(field.message_key(), "errors.validation");
        assert_eq!(field.input_name(), None);
        assert_eq!(field.to_string(), "colorPickerHue");
    }

    #[test]
    fn known_field_round_trips_through_path() {
        assert_eq!(FormField::from_path("bgmVolume"), FormField::BgmVolume);
        assert_eq!(FormField::BgmVolume.to_string(), "bgmVolume");
    }

    #[test]
    fn terms_are_split_and_trimmed() {
        let form = VideoForm {
            video_terms: " cat ,kitten,, fur ".into(),
            ..Default::default()
        };
        assert_eq!(form.terms(), vec!["cat", "kitten", "fur"]);
    }

    #[test]
    fn form_store_persists_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FormStore::open(dir.path()).unwrap();
        store.set_value(&FormField::VideoSubject, "cats").unwrap();
        store.set_value(&FormField::FontSize, "72").unwrap();

        let reopened = FormStore::open(dir.path()).unwrap();
        let form = reopened.get();
        assert_eq!(form.video_subject, "cats");
        assert_eq!(form.font_size, 72.0);
    }

    #[test]
    fn rejected_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FormStore::open(dir.path()).unwrap();
        let err = store
            .set_values(&[
                (FormField::VideoSubject, "dogs".into()),
                (FormField::FontSize, "big".into()),
            ])
            .unwrap_err();
        assert!(matches!(err, FormUpdateError::Field(_)));
        assert_eq!(store.get().video_subject, "");
    }
}
