use crate::api::StockVideoClient;
use crate::engine::PollConfig;
use crate::error::TaskError;
use crate::form::{FieldError, FormField, FormStore};
use crate::model::{Notice, ServiceConfig};
use crate::orchestrator::{Orchestrator, ResumeLatch};
use crate::task_store::TaskStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "stock-video-cli",
    version,
    about = "Generate stock-footage videos and track them across restarts"
)]
pub struct Cli {
    /// Base URL of the video generation service
    #[arg(long, global = true, default_value = "https://api.302.ai")]
    pub base_url: String,

    /// Base URL of the voice catalogue service (defaults to --base-url)
    #[arg(long, global = true)]
    pub tool_base_url: Option<String>,

    /// Directory holding video_history.json and video_form.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Wait between two status checks
    #[arg(long, global = true, default_value = "30s")]
    pub retry_delay: humantime::Duration,

    /// Status checks before a task is given up as timed out
    #[arg(long, global = true, default_value_t = 30)]
    pub max_attempts: u32,

    /// Timeout applied to each HTTP request
    #[arg(long, global = true, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Language model used for script and search term generation
    #[arg(long, global = true, default_value = "gpt-4o-mini")]
    pub model_name: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Submit a video task from the saved form and wait for the result
    Generate {
        #[command(flatten)]
        form: FormArgs,

        /// Return as soon as the task is created
        #[arg(long)]
        no_wait: bool,
    },
    /// Generate a script and search terms for a subject and save them to the form
    Script {
        /// Video subject (defaults to the saved one)
        #[arg(long)]
        subject: Option<String>,

        /// Output language, e.g. en, zh, ja (defaults to the saved one)
        #[arg(long)]
        language: Option<String>,
    },
    /// Resume tracking a task left in flight by an earlier run
    Resume,
    /// Show the current task and history
    Status,
    /// Manage completed videos
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show or edit the saved form
    Form {
        #[command(flatten)]
        form: FormArgs,
    },
    /// List narration voices and their sample clips
    Voices {
        /// TTS provider (defaults to the saved modelName)
        #[arg(long)]
        model: Option<String>,

        /// Sample language (defaults to the saved videoLanguage)
        #[arg(long)]
        language: Option<String>,
    },
    /// Interactive view of the current task and history
    #[cfg(feature = "tui")]
    Watch,
}

#[derive(Debug, Subcommand, Clone)]
pub enum HistoryAction {
    /// List completed videos, newest first
    List,
    /// Delete one entry by task id
    Remove { task_id: String },
    /// Delete every entry
    Clear,
    /// Write the task record as JSON
    Export { path: PathBuf },
}

#[derive(Debug, clap::Args, Clone, Default)]
pub struct FormArgs {
    /// Video subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Output language
    #[arg(long)]
    pub language: Option<String>,

    /// Narration script
    #[arg(long)]
    pub script: Option<String>,

    /// Comma-separated stock footage search terms
    #[arg(long)]
    pub terms: Option<String>,

    /// Any other form field, e.g. --set videoAspect=9:16
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(FormField, String)>,
}

impl FormArgs {
    fn assignments(&self) -> Vec<(FormField, String)> {
        let named = [
            (FormField::VideoSubject, &self.subject),
            (FormField::VideoLanguage, &self.language),
            (FormField::VideoScript, &self.script),
            (FormField::VideoTerms, &self.terms),
        ];
        named
            .into_iter()
            .filter_map(|(field, value)| value.clone().map(|v| (field, v)))
            .chain(self.set.iter().cloned())
            .collect()
    }
}

fn parse_assignment(raw: &str) -> Result<(FormField, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    match FormField::from_path(key.trim()) {
        FormField::Other(name) => Err(format!("unknown form field `{name}`")),
        field => Ok((field, value.to_string())),
    }
}

/// Build a `ServiceConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ServiceConfig {
    ServiceConfig {
        base_url: args.base_url.clone(),
        tool_base_url: args
            .tool_base_url
            .clone()
            .unwrap_or_else(|| args.base_url.clone()),
        data_dir: args
            .data_dir
            .clone()
            .unwrap_or_else(crate::storage::default_data_dir),
        retry_delay: Duration::from(args.retry_delay),
        max_attempts: args.max_attempts,
        request_timeout: Duration::from(args.request_timeout),
        model_name: args.model_name.clone(),
        user_agent: format!("stock-video-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Whether this invocation takes over the terminal.
pub fn is_interactive(args: &Cli) -> bool {
    #[cfg(feature = "tui")]
    {
        matches!(args.command, None | Some(Command::Watch)) && !args.json
    }
    #[cfg(not(feature = "tui"))]
    {
        let _ = args;
        false
    }
}

/// Install the tracing subscriber. Interactive mode logs to a file so the
/// terminal UI stays clean.
pub fn init_tracing(args: &Cli) -> Result<()> {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stock_video_cli={default_level},warn")));

    if is_interactive(args) {
        let dir = build_config(args).data_dir;
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("stock-video.log"))
            .context("open log file")?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Application root: owns the orchestrator and the once-per-process
/// resumption latch.
pub(crate) struct App {
    pub orchestrator: Orchestrator,
    pub config: ServiceConfig,
    resume_latch: ResumeLatch,
}

impl App {
    pub fn build(config: ServiceConfig) -> Result<(Self, mpsc::UnboundedReceiver<Notice>)> {
        let store = TaskStore::open(&config.data_dir).context("open task history")?;
        debug!(path = %store.path().display(), "task history opened");
        let form = FormStore::open(&config.data_dir).context("open saved form")?;
        let client = StockVideoClient::new(&config).context("build HTTP client")?;
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let orchestrator = Orchestrator::new(
            Arc::new(client),
            Arc::new(store),
            Arc::new(form),
            PollConfig {
                retry_delay: config.retry_delay,
                max_attempts: config.max_attempts,
            },
            notice_tx,
        );
        Ok((
            Self {
                orchestrator,
                config,
                resume_latch: ResumeLatch::new(),
            },
            notice_rx,
        ))
    }

    /// Pick up a task left in flight by an earlier process. Only the first
    /// call per process can start polling.
    pub fn resume(&self) -> Option<String> {
        self.orchestrator.resume(&self.resume_latch)
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    info!(data_dir = %cfg.data_dir.display(), base_url = %cfg.base_url, "starting");
    let (app, notices) = App::build(cfg)?;

    let command = match args.command.clone() {
        Some(c) => c,
        None => {
            #[cfg(feature = "tui")]
            {
                if !args.json {
                    return crate::tui::run(app, notices).await;
                }
            }
            Command::Status
        }
    };

    #[cfg(feature = "tui")]
    if let Command::Watch = command {
        return crate::tui::run(app, notices).await;
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let forwarder = spawn_notice_forwarder(notices, out_tx.clone());

    let res = match command {
        Command::Generate { form, no_wait } => {
            run_generate(&app, &args, &form, no_wait, &out_tx).await
        }
        Command::Script { subject, language } => {
            run_script(&app, &args, subject, language, &out_tx).await
        }
        Command::Resume => run_resume(&app, &args, &out_tx).await,
        Command::Status => run_status(&app, &args, &out_tx),
        Command::History { action } => run_history(&app, &args, action, &out_tx),
        Command::Form { form } => run_form(&app, &args, &form, &out_tx).await,
        Command::Voices { model, language } => {
            run_voices(&app, &args, model, language, &out_tx).await
        }
        #[cfg(feature = "tui")]
        Command::Watch => Ok(()),
    };

    // The orchestrator owns the notice sender; dropping it ends the forwarder.
    app.orchestrator.stop();
    drop(app);
    let _ = forwarder.await;
    drop(out_tx);
    let _ = out_handle.await;
    res
}

/// Print orchestrator notices on stderr as they arrive.
fn spawn_notice_forwarder(
    mut notices: mpsc::UnboundedReceiver<Notice>,
    out_tx: mpsc::UnboundedSender<OutputLine>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_progress = None;
        while let Some(notice) = notices.recv().await {
            // Repeated progress values are noise on a 30s poll.
            if let Notice::Generating { progress, .. } = &notice {
                if last_progress == Some(*progress) {
                    continue;
                }
                last_progress = Some(*progress);
            }
            let _ = out_tx.send(OutputLine::Stderr(notice.to_message()));
        }
    })
}

fn print_json<T: serde::Serialize>(
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    value: &T,
) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    let _ = out_tx.send(OutputLine::Stdout(out));
    Ok(())
}

fn field_error_lines(errors: &[FieldError]) -> Vec<String> {
    errors
        .iter()
        .map(|e| format!("  {} ({}): {}", e.field, e.message_key(), e.message))
        .collect()
}

async fn run_generate(
    app: &App,
    args: &Cli,
    form: &FormArgs,
    no_wait: bool,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let assignments = form.assignments();
    if !assignments.is_empty() {
        app.orchestrator
            .set_form_values(&assignments)
            .context("update saved form")?;
    }

    if let Some(task_id) = app.resume() {
        anyhow::bail!(
            "task {task_id} from an earlier run is still in progress; run `resume` to follow it"
        );
    }

    let task_id = match app.orchestrator.submit_stored().await {
        Ok(id) => id,
        Err(err @ TaskError::Validation(_)) => {
            if let TaskError::Validation(errors) = &err {
                for line in field_error_lines(errors) {
                    let _ = out_tx.send(OutputLine::Stderr(line));
                }
            }
            let focus = err.focus_target().unwrap_or("form");
            anyhow::bail!("form is incomplete; fix `{focus}` and try again");
        }
        Err(TaskError::Busy) => {
            let current = app.orchestrator.current_task();
            anyhow::bail!(
                "task {} is still in progress; run `resume` to follow it",
                current.task_id
            );
        }
        Err(e) => return Err(e).context("video task was not submitted"),
    };

    if no_wait {
        app.orchestrator.stop();
        app.orchestrator.wait_idle().await;
        if args.json {
            print_json(out_tx, &app.orchestrator.current_task())?;
        } else {
            let _ = out_tx.send(OutputLine::Stdout(task_id));
        }
        return Ok(());
    }

    follow_task(app, args, &task_id, out_tx).await
}

async fn run_resume(
    app: &App,
    args: &Cli,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    match app.resume() {
        Some(task_id) => follow_task(app, args, &task_id, out_tx).await,
        None => {
            let _ = out_tx.send(OutputLine::Stderr("No task in flight.".into()));
            Ok(())
        }
    }
}

/// Wait for the tracked task to settle and report how it ended. Ctrl-C stops
/// tracking but leaves the task in storage for a later `resume`.
async fn follow_task(
    app: &App,
    args: &Cli,
    task_id: &str,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    tokio::select! {
        _ = app.orchestrator.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            app.orchestrator.stop();
            app.orchestrator.wait_idle().await;
            let _ = out_tx.send(OutputLine::Stderr(format!(
                "Stopped tracking {task_id}; run `resume` to continue."
            )));
            return Ok(());
        }
    }

    let finished = app
        .orchestrator
        .history_tasks()
        .into_iter()
        .find(|t| t.task_id == task_id);
    match finished {
        Some(task) => {
            if args.json {
                print_json(out_tx, &task)?;
            } else {
                let _ = out_tx.send(OutputLine::Stdout(task.video_url));
            }
            Ok(())
        }
        None => anyhow::bail!("video task {task_id} did not complete"),
    }
}

async fn run_script(
    app: &App,
    args: &Cli,
    subject: Option<String>,
    language: Option<String>,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    if let Some(subject) = &subject {
        app.orchestrator
            .set_form_value(&FormField::VideoSubject, subject)
            .context("update saved form")?;
    }
    if let Some(language) = &language {
        app.orchestrator
            .set_form_value(&FormField::VideoLanguage, language)
            .context("update saved form")?;
    }
    let saved = app.orchestrator.form();
    let (subject, language) = (saved.video_subject, saved.video_language);
    if subject.trim().is_empty() {
        anyhow::bail!("a subject is required (--subject or the saved form)");
    }

    let draft = app
        .orchestrator
        .pregenerate_script(&subject, &language)
        .await?;
    if args.json {
        print_json(
            out_tx,
            &serde_json::json!({ "videoScript": draft.script, "videoTerms": draft.terms }),
        )?;
    } else {
        let _ = out_tx.send(OutputLine::Stdout(draft.script));
        let _ = out_tx.send(OutputLine::Stdout(format!(
            "Terms: {}",
            draft.terms.join(", ")
        )));
    }
    Ok(())
}

fn run_status(app: &App, args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>) -> Result<()> {
    let snapshot = app.orchestrator.snapshot();
    if args.json {
        return print_json(out_tx, &snapshot);
    }
    let summary = crate::text_summary::build_text_summary(&snapshot, app.config.max_attempts);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    Ok(())
}

fn run_history(
    app: &App,
    args: &Cli,
    action: HistoryAction,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    match action {
        HistoryAction::List => {
            let history = app.orchestrator.history_tasks();
            if args.json {
                return print_json(out_tx, &history);
            }
            for line in crate::text_summary::history_lines(&history) {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
        HistoryAction::Remove { task_id } => {
            let removed = app
                .orchestrator
                .remove_history_task(&task_id)
                .context("update task history")?;
            if !removed {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "No history entry with id {task_id}"
                )));
            }
        }
        HistoryAction::Clear => {
            app.orchestrator
                .clear_history()
                .context("update task history")?;
        }
        HistoryAction::Export { path } => {
            crate::storage::export_json(&path, &app.orchestrator.snapshot())?;
            let _ = out_tx.send(OutputLine::Stderr(format!("Exported: {}", path.display())));
        }
    }
    Ok(())
}

async fn run_form(
    app: &App,
    args: &Cli,
    form: &FormArgs,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let assignments = form.assignments();
    if !assignments.is_empty() {
        app.orchestrator
            .set_form_values(&assignments)
            .context("update saved form")?;
    }
    let current = app.orchestrator.form();
    let voice_changed = assignments
        .iter()
        .any(|(field, _)| matches!(field, FormField::ModelName | FormField::VoiceName));
    if voice_changed {
        match app.orchestrator.voice_catalog().await {
            Ok(catalog) if !catalog.knows(&current.model_name, &current.voice_name) => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "Voice `{}` is not offered for model `{}`; see `voices --model {}`",
                    current.voice_name, current.model_name, current.model_name
                )));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not check voice against the catalogue"),
        }
    }
    if args.json {
        return print_json(out_tx, &current);
    }
    for line in crate::text_summary::form_lines(&current) {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    if let Err(errors) = current.validate() {
        let _ = out_tx.send(OutputLine::Stderr("Not ready to generate:".into()));
        for line in field_error_lines(&errors) {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }
    Ok(())
}

async fn run_voices(
    app: &App,
    args: &Cli,
    model: Option<String>,
    language: Option<String>,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let saved = app.orchestrator.form();
    let model = model.unwrap_or(saved.model_name);
    let language = language.unwrap_or(saved.video_language);
    let catalog = app
        .orchestrator
        .voice_catalog()
        .await
        .context("fetch voice catalogue")?;

    let voices = catalog.voices_for(&model);
    if voices.is_empty() {
        anyhow::bail!(
            "no voices for model `{model}` (available: {})",
            catalog.model_names().join(", ")
        );
    }
    if args.json {
        return print_json(out_tx, &voices);
    }
    for line in crate::text_summary::voice_lines(voices, &language, &saved.voice_name) {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_parses_known_fields() {
        assert_eq!(
            parse_assignment("videoAspect=9:16").unwrap(),
            (FormField::VideoAspect, "9:16".to_string())
        );
        assert!(parse_assignment("videoAspect").is_err());
        assert!(parse_assignment("hue=3").is_err());
    }

    #[test]
    fn named_flags_come_before_generic_assignments() {
        let form = FormArgs {
            subject: Some("cats".into()),
            terms: Some("cat".into()),
            set: vec![(FormField::FontSize, "70".into())],
            ..Default::default()
        };
        assert_eq!(
            form.assignments(),
            vec![
                (FormField::VideoSubject, "cats".to_string()),
                (FormField::VideoTerms, "cat".to_string()),
                (FormField::FontSize, "70".to_string()),
            ]
        );
    }

    #[test]
    fn config_uses_cli_durations() {
        let cli = Cli::parse_from([
            "stock-video-cli",
            "--retry-delay",
            "5s",
            "--max-attempts",
            "3",
            "--data-dir",
            "/tmp/sv",
            "status",
        ]);
        let cfg = build_config(&cli);
        assert_eq!(cfg.retry_delay, Duration::from_secs(5));
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/sv"));
        assert!(cfg.user_agent.starts_with("stock-video-cli/"));
        assert_eq!(cfg.tool_base_url, "https://api.302.ai");
    }
}
