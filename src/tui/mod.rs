mod help;
mod state;

use crate::cli::App;
use crate::error::TaskError;
use crate::model::{Notice, VideoHistory};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Tabs},
    Terminal,
};
use state::{push_wrapped_status_kv, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Updates pushed from the async side to the UI thread.
pub enum UiEvent {
    Record(VideoHistory),
    Polling(bool),
    Creating(bool),
    Notice(Notice),
    Info { message: String, is_error: bool },
}

/// Requests from the UI thread to the async side.
#[derive(Debug)]
pub enum UiCommand {
    Generate,
    Remove(String),
    Clear,
    Quit,
}

pub(crate) async fn run(app: App, mut notices: UnboundedReceiver<Notice>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let initial = app.orchestrator.snapshot();
    let ui_handle = std::thread::spawn(move || run_threaded(initial, event_rx, cmd_tx));

    let mut tasks_rx = app.orchestrator.subscribe_tasks();
    let mut polling_rx = app.orchestrator.subscribe_polling();
    let mut creating_rx = app.orchestrator.subscribe_creating();

    app.resume();
    polling_rx.mark_unchanged();
    creating_rx.mark_unchanged();
    let _ = event_tx.send(UiEvent::Polling(app.orchestrator.is_polling()));
    let _ = event_tx.send(UiEvent::Creating(app.orchestrator.is_creating_task()));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(UiCommand::Generate) => {
                    if let Some(info) = submit_from_ui(&app).await {
                        let _ = event_tx.send(info);
                    }
                }
                Some(UiCommand::Remove(task_id)) => {
                    if let Err(e) = app.orchestrator.remove_history_task(&task_id) {
                        warn!(task_id = %task_id, error = %e, "delete from history failed");
                        let _ = event_tx.send(UiEvent::Info {
                            message: format!("Delete failed: {e}"),
                            is_error: true,
                        });
                    }
                }
                Some(UiCommand::Clear) => {
                    if let Err(e) = app.orchestrator.clear_history() {
                        let _ = event_tx.send(UiEvent::Info {
                            message: format!("Clear failed: {e}"),
                            is_error: true,
                        });
                    }
                }
                Some(UiCommand::Quit) | None => break,
            },
            Some(notice) = notices.recv() => {
                let _ = event_tx.send(UiEvent::Notice(notice));
            }
            Ok(()) = tasks_rx.changed() => {
                let record = tasks_rx.borrow_and_update().clone();
                let _ = event_tx.send(UiEvent::Record(record));
            }
            Ok(()) = polling_rx.changed() => {
                let active = *polling_rx.borrow_and_update();
                let _ = event_tx.send(UiEvent::Polling(active));
            }
            Ok(()) = creating_rx.changed() => {
                let active = *creating_rx.borrow_and_update();
                let _ = event_tx.send(UiEvent::Creating(active));
            }
        }
    }

    // Leave the current task in storage; the next start resumes it.
    app.orchestrator.stop();
    debug!("tui closed");

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Errors that the orchestrator does not already report as a notice.
async fn submit_from_ui(app: &App) -> Option<UiEvent> {
    match app.orchestrator.submit_stored().await {
        Ok(_) => None,
        Err(TaskError::Validation(errors)) => {
            let fields: Vec<String> = errors.iter().map(|e| e.field.to_string()).collect();
            Some(UiEvent::Info {
                message: format!("Form incomplete: {}", fields.join(", ")),
                is_error: true,
            })
        }
        Err(TaskError::Busy) => Some(UiEvent::Info {
            message: "A video task is already running".into(),
            is_error: true,
        }),
        Err(_) => None,
    }
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    initial: VideoHistory,
    mut event_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        record: initial,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let visible_rows = terminal
                    .size()
                    .map(|s| (s.height as usize).saturating_sub(6))
                    .unwrap_or(20);
                if !matches!(k.code, KeyCode::Char('C')) {
                    state.confirm_clear = false;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('g')) => {
                        if state.polling || state.creating {
                            state.info = "A video task is already running".into();
                            state.info_is_error = true;
                        } else {
                            state.info = "Submitting…".into();
                            state.info_is_error = false;
                            let _ = cmd_tx.send(UiCommand::Generate);
                        }
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 3;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 2;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) if state.tab == 1 => {
                        state.select_prev();
                    }
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) if state.tab == 1 => {
                        state.select_next(visible_rows);
                    }
                    (_, KeyCode::Char('d')) if state.tab == 1 => {
                        if let Some(task) = state.selected() {
                            let _ = cmd_tx.send(UiCommand::Remove(task.task_id.clone()));
                        }
                    }
                    (_, KeyCode::Char('C')) if state.tab == 1 => {
                        if state.history().is_empty() {
                            state.info = "History is already empty".into();
                            state.info_is_error = false;
                        } else if state.confirm_clear {
                            state.confirm_clear = false;
                            let _ = cmd_tx.send(UiCommand::Clear);
                        } else {
                            state.confirm_clear = true;
                            state.info = "Press C again to delete every video".into();
                            state.info_is_error = true;
                        }
                    }
                    (_, KeyCode::Char('y')) if state.tab == 1 => {
                        if let Some(url) = state.selected().map(|t| t.video_url.clone()) {
                            match copy_to_clipboard(&url) {
                                Ok(_) => {
                                    state.info = format!("✓ Copied to clipboard: {url}");
                                    state.info_is_error = false;
                                }
                                Err(e) => {
                                    state.info = format!("Clipboard copy failed: {e:#}");
                                    state.info_is_error = true;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Dashboard"),
        Line::from(format!("History ({})", state.history().len())),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("stock-video-cli"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_dashboard(chunks[1], f, state),
        1 => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn info_line(state: &UiState) -> Line<'static> {
    let color = if state.info_is_error {
        Color::Red
    } else {
        Color::Green
    };
    Line::from(vec![
        Span::styled("Info: ", Style::default().fg(Color::Gray)),
        Span::styled(state.info.clone(), Style::default().fg(color)),
    ])
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(7), // Current task
                Constraint::Length(3), // Progress gauge
                Constraint::Min(0),    // Latest video
                Constraint::Length(3), // Info line
            ]
            .as_ref(),
        )
        .split(area);

    let current = &state.record.current_task;
    let phase = if state.creating {
        Span::styled("creating", Style::default().fg(Color::Yellow))
    } else if state.polling {
        Span::styled("polling", Style::default().fg(Color::Cyan))
    } else if current.is_empty() {
        Span::styled("idle", Style::default().fg(Color::Gray))
    } else {
        Span::styled("paused", Style::default().fg(Color::Magenta))
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("State: ", Style::default().fg(Color::Gray)),
        phase,
    ])];
    if current.is_empty() {
        lines.push(Line::from("No video in progress. Press g to generate."));
    } else {
        let width = main[0].width;
        push_wrapped_status_kv(&mut lines, "Task", &current.task_id, width);
        push_wrapped_status_kv(&mut lines, "Subject", &current.task_subject, width);
        push_wrapped_status_kv(&mut lines, "Started", &current.created_at, width);
    }
    let status = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Current task"),
    );
    f.render_widget(status, main[0]);

    let progress = if current.is_empty() { 0 } else { current.progress };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(u16::from(progress.min(100)));
    f.render_widget(gauge, main[1]);

    let mut latest = Vec::new();
    match state.history().first() {
        Some(task) => {
            let width = main[2].width;
            push_wrapped_status_kv(&mut latest, "Task", &task.task_id, width);
            push_wrapped_status_kv(&mut latest, "Subject", &task.task_subject, width);
            push_wrapped_status_kv(&mut latest, "Created", &task.created_at, width);
            push_wrapped_status_kv(&mut latest, "URL", &task.video_url, width);
        }
        None => latest.push(Line::from("No videos yet.")),
    }
    let latest = Paragraph::new(latest).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Latest video"),
    );
    f.render_widget(latest, main[2]);

    let info = Paragraph::new(info_line(state)).block(Block::default().borders(Borders::ALL));
    f.render_widget(info, main[3]);
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    let max_items = (chunks[0].height as usize).saturating_sub(3);
    let total_count = state.history().len();
    let current_pos = if total_count > 0 {
        state.history_selected + 1
    } else {
        0
    };

    lines.push(Line::from(vec![
        Span::raw(format!("History ({current_pos}/{total_count}) - ")),
        Span::styled("↑/↓/j/k", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("y", Style::default().fg(Color::Magenta)),
        Span::raw(": copy URL, "),
        Span::styled("d", Style::default().fg(Color::Magenta)),
        Span::raw(": delete, "),
        Span::styled("C", Style::default().fg(Color::Magenta)),
        Span::raw(": clear"),
    ]));

    if total_count == 0 {
        lines.push(Line::from("No videos yet."));
    }

    for (idx, task) in state
        .history()
        .iter()
        .enumerate()
        .skip(state.history_scroll_offset)
        .take(max_items)
    {
        let style = if idx == state.history_selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<20}", task.created_at), style),
            Span::raw(" "),
            Span::styled(task.task_subject.clone(), style.fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(task.video_url.clone(), Style::default().fg(Color::Gray)),
        ]));
    }

    let list = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(list, chunks[0]);

    let info = Paragraph::new(info_line(state)).block(Block::default().borders(Borders::ALL));
    f.render_widget(info, chunks[1]);
}

// Global clipboard manager channel - initialized once on first use
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;

static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Initialize the clipboard manager thread if not already initialized.
/// This creates a background thread that processes clipboard operations sequentially,
/// keeping each clipboard instance alive for a sufficient duration.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        // Linux clipboard managers read lazily from the owner.
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard thread without blocking the render loop.
fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
