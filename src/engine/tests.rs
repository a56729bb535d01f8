use super::*;
use crate::api::fake::{done, status, FakeApi};
use crate::api::VideoApi;
use crate::model::TaskStatus;
use futures::FutureExt;

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Data(u8),
    Success(Option<String>),
    Error(String),
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Seen>>,
}

impl Recorder {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn terminal_count(&self) -> usize {
        self.seen()
            .iter()
            .filter(|s| !matches!(s, Seen::Data(_)))
            .count()
    }
}

impl PollObserver<TaskStatus> for Recorder {
    fn is_complete(&self, data: &TaskStatus) -> bool {
        data.is_complete()
    }

    fn is_failed(&self, data: &TaskStatus) -> bool {
        data.is_failed()
    }

    fn on_data(&self, data: &TaskStatus) {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Data(data.progress_percent()));
    }

    fn on_success(&self, data: TaskStatus) {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Success(data.result_url().map(str::to_string)));
    }

    fn on_error(&self, error: PollError) {
        let label = match error {
            PollError::Transport(_) => "transport".to_string(),
            PollError::Failed => "failed".to_string(),
            PollError::TimedOut { attempts } => format!("timeout after {attempts}"),
        };
        self.seen.lock().unwrap().push(Seen::Error(label));
    }
}

fn poller(
    api: Arc<FakeApi>,
    max_attempts: u32,
) -> (Poller<TaskStatus>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let fetch: FetchFn<TaskStatus> = Arc::new(move |id: String| {
        let api = api.clone();
        async move { api.get_job_status(&id).await }.boxed()
    });
    let cfg = PollConfig {
        retry_delay: Duration::from_secs(30),
        max_attempts,
    };
    (Poller::new(cfg, fetch, recorder.clone()), recorder)
}

#[tokio::test(start_paused = true)]
async fn completes_after_progress_updates() {
    let api = Arc::new(FakeApi::default().with_statuses([status(50.0, 0), done("u.mp4")]));
    let (poller, rec) = poller(api.clone(), 30);

    let handle = poller.start("A1").expect("session starts");
    assert!(poller.is_polling());
    handle.await.unwrap();

    assert_eq!(
        rec.seen(),
        vec![
            Seen::Data(50),
            Seen::Data(100),
            Seen::Success(Some("u.mp4".into()))
        ]
    );
    assert!(!poller.is_polling());
    assert_eq!(api.status_calls(), vec!["A1", "A1"]);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_ignored_while_active() {
    let api = Arc::new(FakeApi::default().with_statuses([status(10.0, 0), done("u.mp4")]));
    let (poller, rec) = poller(api.clone(), 30);

    let first = poller.start("A1").expect("first start");
    assert!(poller.start("A1").is_none());
    assert!(poller.start("B2").is_none());
    first.await.unwrap();

    assert_eq!(rec.terminal_count(), 1);
    assert!(api.status_calls().iter().all(|id| id == "A1"));
}

#[tokio::test(start_paused = true)]
async fn failed_state_reports_error_after_data() {
    let api = Arc::new(FakeApi::default().with_statuses([status(0.0, -1)]));
    let (poller, rec) = poller(api, 30);

    poller.start("A1").unwrap().await.unwrap();
    assert_eq!(rec.seen(), vec![Seen::Data(0), Seen::Error("failed".into())]);
}

#[tokio::test(start_paused = true)]
async fn failure_wins_over_completion() {
    let mut both = done("u.mp4");
    both.state = TaskStatus::STATE_FAILED;
    let api = Arc::new(FakeApi::default().with_statuses([both]));
    let (poller, rec) = poller(api, 30);

    poller.start("A1").unwrap().await.unwrap();
    assert_eq!(rec.terminal_count(), 1);
    assert_eq!(rec.seen().last(), Some(&Seen::Error("failed".into())));
}

#[tokio::test(start_paused = true)]
async fn transport_error_stops_without_data() {
    let api = Arc::new(FakeApi::default());
    api.push_status_error("connection reset");
    let (poller, rec) = poller(api.clone(), 30);

    poller.start("A1").unwrap().await.unwrap();
    assert_eq!(rec.seen(), vec![Seen::Error("transport".into())]);
    assert_eq!(api.status_calls().len(), 1);
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let api = Arc::new(FakeApi::default());
    let (poller, rec) = poller(api.clone(), 3);

    let started = tokio::time::Instant::now();
    poller.start("A1").unwrap().await.unwrap();

    assert_eq!(api.status_calls().len(), 3);
    assert_eq!(
        rec.seen(),
        vec![
            Seen::Data(0),
            Seen::Data(0),
            Seen::Data(0),
            Seen::Error("timeout after 3".into())
        ]
    );
    // Two waits between three fetches.
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn restart_after_terminal_state() {
    let api = Arc::new(FakeApi::default().with_statuses([done("a.mp4"), done("b.mp4")]));
    let (poller, rec) = poller(api, 30);

    poller.start("A1").unwrap().await.unwrap();
    poller.start("B2").expect("fresh session").await.unwrap();
    assert_eq!(rec.terminal_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_scheduled_fetches() {
    let api = Arc::new(FakeApi::default());
    let (poller, rec) = poller(api.clone(), 30);

    let handle = poller.start("A1").unwrap();
    // Let the first fetch land and the session go to sleep.
    tokio::time::sleep(Duration::from_secs(1)).await;
    poller.stop();
    handle.await.unwrap();

    assert_eq!(api.status_calls().len(), 1);
    assert_eq!(rec.terminal_count(), 0);
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn is_polling_is_observable() {
    let api = Arc::new(FakeApi::default().with_statuses([status(20.0, 0), done("u.mp4")]));
    let (poller, _rec) = poller(api, 30);
    let mut rx = poller.subscribe();

    poller.start("A1").unwrap();
    assert!(*rx.borrow_and_update());
    rx.wait_for(|active| !*active).await.unwrap();
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_poller_ends_its_session() {
    let api = Arc::new(FakeApi::default());
    let (poller, rec) = poller(api.clone(), 30);

    let handle = poller.start("A1").unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(poller);
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(api.status_calls().len(), 1);
    assert_eq!(rec.terminal_count(), 0);
}
