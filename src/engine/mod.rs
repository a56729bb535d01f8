//! Bounded-retry status poller.
//!
//! A `Poller` runs at most one polling session at a time. Each session fetches
//! status strictly sequentially, reports every successful fetch through
//! `on_data`, and ends with exactly one of `on_success` / `on_error` unless it
//! is stopped first.

mod session;

pub use session::PollingSession;

use crate::error::ApiError;
use futures::future::BoxFuture;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Fixed wait between the end of one fetch and the start of the next.
    pub retry_delay: Duration,
    /// Fetches allowed before the session gives up with a timeout.
    pub max_attempts: u32,
}

/// Terminal failure of a polling session.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("status fetch failed")]
    Transport(#[source] ApiError),
    #[error("remote job reported failure")]
    Failed,
    #[error("no terminal status after {attempts} attempts")]
    TimedOut { attempts: u32 },
}

/// Predicates and callbacks driven by a polling session.
pub trait PollObserver<T>: Send + Sync {
    fn is_complete(&self, data: &T) -> bool;
    fn is_failed(&self, data: &T) -> bool;
    /// Called after every successful fetch, terminal or not.
    fn on_data(&self, data: &T);
    /// Called once when `is_complete` first holds.
    fn on_success(&self, data: T);
    /// Called once on transport failure, `is_failed`, or attempt exhaustion.
    fn on_error(&self, error: PollError);
}

pub type FetchFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Stop signal for one session.
#[derive(Default)]
struct SessionCtl {
    cancel: AtomicBool,
    wake: Notify,
}

impl SessionCtl {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Clears the active flag however the session ends.
struct ActiveGuard(Arc<watch::Sender<bool>>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

pub struct Poller<T> {
    cfg: PollConfig,
    fetch: FetchFn<T>,
    observer: Arc<dyn PollObserver<T>>,
    active: Arc<watch::Sender<bool>>,
    session: Mutex<Option<Arc<SessionCtl>>>,
}

impl<T: Send + 'static> Poller<T> {
    pub fn new(cfg: PollConfig, fetch: FetchFn<T>, observer: Arc<dyn PollObserver<T>>) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            cfg,
            fetch,
            observer,
            active: Arc::new(active),
            session: Mutex::new(None),
        }
    }

    pub fn is_polling(&self) -> bool {
        *self.active.borrow()
    }

    /// Reactive view of the active flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    /// Begin polling `target_id`. Returns `None` without side effects when a
    /// session is already active. Must be called inside a tokio runtime.
    pub fn start(&self, target_id: &str) -> Option<tokio::task::JoinHandle<()>> {
        let claimed = self.active.send_if_modified(|active| {
            if *active {
                false
            } else {
                *active = true;
                true
            }
        });
        if !claimed {
            debug!(target_id, "poll already active, ignoring start");
            return None;
        }
        let guard = ActiveGuard(self.active.clone());

        let ctl = Arc::new(SessionCtl::default());
        match self.session.lock() {
            Ok(mut slot) => *slot = Some(ctl.clone()),
            Err(_) => warn!("poll session slot poisoned; stop() will not reach this session"),
        }

        let session = PollingSession::new(target_id);
        let cfg = self.cfg;
        let fetch = self.fetch.clone();
        let observer = self.observer.clone();
        debug!(target_id, max_attempts = cfg.max_attempts, "poll session started");

        Some(tokio::spawn(async move {
            let _guard = guard;
            run_session(session, cfg, fetch, observer, ctl).await;
        }))
    }

}

impl<T> Poller<T> {
    /// Stop the active session, if any. Scheduled fetches are dropped; no
    /// terminal callback fires and committed writes stay as they are.
    pub fn stop(&self) {
        let ctl = self.session.lock().ok().and_then(|mut slot| slot.take());
        if let Some(ctl) = ctl {
            ctl.cancel.store(true, Ordering::Relaxed);
            ctl.wake.notify_one();
        }
    }
}

/// A dropped poller takes its session down with it.
impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_session<T>(
    mut session: PollingSession,
    cfg: PollConfig,
    fetch: FetchFn<T>,
    observer: Arc<dyn PollObserver<T>>,
    ctl: Arc<SessionCtl>,
) {
    loop {
        if ctl.cancelled() {
            debug!(target_id = %session.target_id, "poll session stopped");
            return;
        }

        let result = fetch(session.target_id.clone()).await;
        if ctl.cancelled() {
            debug!(target_id = %session.target_id, "poll session stopped during fetch");
            return;
        }

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!(target_id = %session.target_id, error = %e, "status fetch failed");
                observer.on_error(PollError::Transport(e));
                return;
            }
        };

        observer.on_data(&data);
        if observer.is_failed(&data) {
            observer.on_error(PollError::Failed);
            return;
        }
        if observer.is_complete(&data) {
            observer.on_success(data);
            return;
        }

        session.attempts_made += 1;
        if session.attempts_made >= cfg.max_attempts {
            observer.on_error(PollError::TimedOut {
                attempts: session.attempts_made,
            });
            return;
        }

        debug!(
            target_id = %session.target_id,
            attempt = session.attempts_made,
            "task still running, waiting {:?}",
            cfg.retry_delay
        );
        tokio::select! {
            _ = tokio::time::sleep(cfg.retry_delay) => {}
            _ = ctl.wake.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests;
