//! Text summary builder for CLI output.
//!
//! Formats the task record and the saved form as human-readable lines.

use crate::form::VideoForm;
use crate::model::{HistoryTask, VideoHistory, Voice, HISTORY_LIMIT};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of the current task and history.
pub(crate) fn build_text_summary(record: &VideoHistory, max_attempts: u32) -> TextSummary {
    let mut lines = Vec::new();

    let current = &record.current_task;
    if current.is_empty() {
        lines.push("Current: none".to_string());
    } else {
        lines.push(format!(
            "Current: {} \"{}\" {}% (started {})",
            current.task_id, current.task_subject, current.progress, current.created_at
        ));
        lines.push(format!(
            "         checked every retry interval, up to {max_attempts} times"
        ));
    }

    lines.push(format!(
        "History: {}/{} videos",
        record.history_tasks.len(),
        HISTORY_LIMIT
    ));
    lines.extend(history_lines(&record.history_tasks));

    TextSummary { lines }
}

/// One line per completed video, newest first.
pub(crate) fn history_lines(history: &[HistoryTask]) -> Vec<String> {
    history
        .iter()
        .map(|t| {
            format!(
                "  {}  {}  {}  {}",
                t.created_at, t.task_id, t.task_subject, t.video_url
            )
        })
        .collect()
}

/// Saved form, one `field: value` per line. Long scripts are cut to one line.
pub(crate) fn form_lines(form: &VideoForm) -> Vec<String> {
    let script = form.video_script.lines().next().unwrap_or("");
    let script = if script.chars().count() > 60 || form.video_script.lines().count() > 1 {
        format!("{}…", script.chars().take(60).collect::<String>())
    } else {
        script.to_string()
    };
    vec![
        format!("videoSubject:      {}", form.video_subject),
        format!("videoLanguage:     {}", form.video_language),
        format!("videoScript:       {script}"),
        format!("videoTerms:        {}", form.terms().join(", ")),
        format!("videoSource:       {}", form.video_source),
        format!("videoConcatMode:   {}", form.video_concat_mode),
        format!("videoAspect:       {}", form.video_aspect),
        format!("videoClipDuration: {}", form.video_clip_duration),
        format!("subtitleEnabled:   {}", form.subtitle_enabled),
        format!("subtitleFont:      {}", form.subtitle_font),
        format!("subtitlePosition:  {}", form.subtitle_position),
        format!("fontSize:          {}", form.font_size),
        format!("strokeWidth:       {}", form.stroke_width),
        format!("textForeColor:     {}", form.text_fore_color),
        format!("strokeColor:       {}", form.stroke_color),
        format!("modelName:         {}", form.model_name),
        format!("voiceName:         {}", form.voice_name),
        format!("voiceVolume:       {}", form.voice_volume),
        format!("bgmType:           {}", form.bgm_type),
        format!("bgmVolume:         {}", form.bgm_volume),
    ]
}

/// One line per voice; `*` marks the one saved in the form.
pub(crate) fn voice_lines(voices: &[Voice], language: &str, selected: &str) -> Vec<String> {
    voices
        .iter()
        .map(|v| {
            let mark = if v.name == selected { '*' } else { ' ' };
            let sample = v.sample_for(language).unwrap_or("-");
            format!("{mark} {}  {}  {}", v.name, v.display_name, sample)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CurrentTask;

    #[test]
    fn idle_summary_lists_history() {
        let record = VideoHistory {
            current_task: CurrentTask::default(),
            history_tasks: vec![HistoryTask {
                task_id: "A1".into(),
                task_subject: "cats".into(),
                video_url: "u.mp4".into(),
                created_at: "2026-01-01 10:00:00".into(),
            }],
        };
        let summary = build_text_summary(&record, 30);
        assert_eq!(summary.lines[0], "Current: none");
        assert_eq!(summary.lines[1], format!("History: 1/{HISTORY_LIMIT} videos"));
        assert!(summary.lines[2].contains("A1"));
        assert!(summary.lines[2].ends_with("u.mp4"));
    }

    #[test]
    fn running_task_shows_progress() {
        let mut current = CurrentTask::new("T1", "dogs");
        current.progress = 40;
        let record = VideoHistory {
            current_task: current,
            history_tasks: Vec::new(),
        };
        let summary = build_text_summary(&record, 30);
        assert!(summary.lines[0].starts_with("Current: T1 \"dogs\" 40%"));
    }

    #[test]
    fn multi_line_script_is_shortened() {
        let form = VideoForm {
            video_script: "first line\nsecond line".into(),
            ..VideoForm::default()
        };
        let lines = form_lines(&form);
        assert_eq!(lines[2], "videoScript:       first line…");
    }

    #[test]
    fn saved_voice_is_marked() {
        let voice = |name: &str| Voice {
            name: name.into(),
            display_name: name.to_uppercase(),
            sample: [("zh".to_string(), format!("{name}.mp3"))].into_iter().collect(),
        };
        let lines = voice_lines(&[voice("a"), voice("b")], "en", "b");
        assert_eq!(lines, vec!["  a  A  a.mp3", "* b  B  b.mp3"]);
    }
}
