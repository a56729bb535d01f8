use super::UiEvent;
use crate::model::{HistoryTask, VideoHistory};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub info_is_error: bool,

    pub record: VideoHistory,
    pub polling: bool,
    pub creating: bool,

    pub history_selected: usize, // Index of selected history item (0 = most recent)
    pub history_scroll_offset: usize,
    // Clearing needs a second `C` press
    pub confirm_clear: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            info: String::new(),
            info_is_error: false,
            record: VideoHistory::default(),
            polling: false,
            creating: false,
            history_selected: 0,
            history_scroll_offset: 0,
            confirm_clear: false,
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

impl UiState {
    pub fn apply(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Record(record) => {
                self.record = record;
                self.clamp_selection();
            }
            UiEvent::Polling(active) => self.polling = active,
            UiEvent::Creating(active) => self.creating = active,
            UiEvent::Notice(notice) => {
                self.info_is_error = notice.is_error();
                self.info = notice.to_message();
            }
            UiEvent::Info { message, is_error } => {
                self.info_is_error = is_error;
                self.info = message;
            }
        }
    }

    pub fn history(&self) -> &[HistoryTask] {
        &self.record.history_tasks
    }

    pub fn selected(&self) -> Option<&HistoryTask> {
        self.history().get(self.history_selected)
    }

    pub fn select_prev(&mut self) {
        if self.history_selected > 0 {
            self.history_selected -= 1;
            if self.history_selected < self.history_scroll_offset {
                self.history_scroll_offset = self.history_selected;
            }
        }
    }

    pub fn select_next(&mut self, visible_rows: usize) {
        if self.history_selected + 1 < self.history().len() {
            self.history_selected += 1;
            let visible_rows = visible_rows.max(1);
            if self.history_selected >= self.history_scroll_offset + visible_rows {
                self.history_scroll_offset = self.history_selected + 1 - visible_rows;
            }
        }
    }

    /// Keep the cursor on a real row after the history shrinks.
    fn clamp_selection(&mut self) {
        let len = self.history().len();
        if len == 0 {
            self.history_selected = 0;
            self.history_scroll_offset = 0;
            return;
        }
        if self.history_selected >= len {
            self.history_selected = len - 1;
        }
        if self.history_scroll_offset > self.history_selected {
            self.history_scroll_offset = self.history_selected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Notice;

    fn entry(id: &str) -> HistoryTask {
        HistoryTask {
            task_id: id.into(),
            task_subject: "s".into(),
            video_url: format!("{id}.mp4"),
            created_at: "2026-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn selection_follows_shrinking_history() {
        let mut state = UiState::default();
        state.apply(UiEvent::Record(VideoHistory {
            history_tasks: vec![entry("a"), entry("b"), entry("c")],
            ..Default::default()
        }));
        state.select_next(10);
        state.select_next(10);
        assert_eq!(state.selected().map(|t| t.task_id.as_str()), Some("c"));

        state.apply(UiEvent::Record(VideoHistory {
            history_tasks: vec![entry("a")],
            ..Default::default()
        }));
        assert_eq!(state.history_selected, 0);
        assert_eq!(state.selected().map(|t| t.task_id.as_str()), Some("a"));
    }

    #[test]
    fn scrolling_keeps_cursor_visible() {
        let mut state = UiState::default();
        state.apply(UiEvent::Record(VideoHistory {
            history_tasks: (0..5).map(|i| entry(&i.to_string())).collect(),
            ..Default::default()
        }));
        for _ in 0..4 {
            state.select_next(2);
        }
        assert_eq!(state.history_selected, 4);
        assert_eq!(state.history_scroll_offset, 3);
        state.select_prev();
        state.select_prev();
        assert_eq!(state.history_scroll_offset, 2);
    }

    #[test]
    fn error_notices_are_flagged() {
        let mut state = UiState::default();
        state.apply(UiEvent::Notice(Notice::HistoryLimitReached { limit: 30 }));
        assert!(state.info_is_error);
        state.apply(UiEvent::Notice(Notice::HistoryCleared));
        assert!(!state.info_is_error);
        assert_eq!(state.info, "History cleared");
    }
}
