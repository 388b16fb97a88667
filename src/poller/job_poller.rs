use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiError, JobSource, PageQuery, PaginationMeta, ReportJob, has_active};
use crate::notify::{Notice, Notifier};

use super::state::{PollerMachine, PollerState, Signal, TimerAction};
use super::timer::{PollTimer, TimerGauge, next_tick};

/// Kept well under the server's 60 requests/minute budget.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(10);

/// Whether failures of a fetch are shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Timer tick: failures are logged only.
    Silent,
    /// User action: failures are notified and returned.
    Manual,
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("poller has shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub period: Duration,
    pub query: PageQuery,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            period: DEFAULT_POLL_PERIOD,
            query: PageQuery::default(),
        }
    }
}

/// Observable view of a poller, republished after every fetch.
#[derive(Debug, Clone, Default)]
pub struct PollerSnapshot {
    pub state: PollerState,
    pub jobs: Vec<ReportJob>,
    pub pagination: Option<PaginationMeta>,
    pub query: PageQuery,
    pub last_error: Option<String>,
    /// Number of fetches issued so far, successful or not.
    pub fetches: u64,
}

type Reply = oneshot::Sender<Result<(), ApiError>>;

enum Command {
    Refresh(Reply),
    SetPage(PageQuery, Reply),
    Delete(u64, Reply),
}

/// Keeps a page of report jobs in sync with the server.
///
/// While any job on the page is pending or processing the poller owns one
/// repeating timer and re-fetches silently on each tick. Once every job is
/// terminal, or the server rate-limits a fetch, the timer is dropped. Fetches
/// run on the poller's own task, so a tick never overlaps a fetch in flight.
pub struct JobPoller<S> {
    source: Arc<S>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
    query: PageQuery,
    state: PollerState,
    timer: Option<PollTimer>,
    gauge: TimerGauge,
    jobs: Vec<ReportJob>,
    pagination: Option<PaginationMeta>,
    last_error: Option<String>,
    fetches: u64,
    snapshot: watch::Sender<PollerSnapshot>,
}

impl<S: JobSource> JobPoller<S> {
    pub fn new(source: Arc<S>, notifier: Arc<dyn Notifier>, settings: PollerSettings) -> Self {
        let (snapshot, _) = watch::channel(PollerSnapshot {
            query: settings.query,
            ..Default::default()
        });
        Self {
            source,
            notifier,
            period: settings.period,
            query: settings.query,
            state: PollerState::Idle,
            timer: None,
            gauge: TimerGauge::default(),
            jobs: Vec::new(),
            pagination: None,
            last_error: None,
            fetches: 0,
            snapshot,
        }
    }

    /// Start the poller on its own task. The first fetch is a manual one.
    pub fn spawn(self) -> PollerHandle {
        let (tx, rx) = mpsc::channel(16);
        let snapshot = self.snapshot.subscribe();
        let gauge = self.gauge.clone();
        let task = tokio::spawn(self.run(rx));
        PollerHandle {
            commands: Some(tx),
            snapshot,
            gauge,
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::info!(period = ?self.period, page = self.query.page, "report job poller started");
        self.reconcile(FetchMode::Manual).await.ok();

        loop {
            let command = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Some(command),
                    None => break,
                },
                () = next_tick(&mut self.timer) => None,
            };

            match command {
                None => {
                    // Silent path: errors are logged inside reconcile and stop here.
                    self.reconcile(FetchMode::Silent).await.ok();
                }
                Some(Command::Refresh(reply)) => {
                    let result = self.reconcile(FetchMode::Manual).await;
                    let _ = reply.send(result);
                }
                Some(Command::SetPage(query, reply)) => {
                    self.query = query;
                    let result = self.reconcile(FetchMode::Manual).await;
                    let _ = reply.send(result);
                }
                Some(Command::Delete(id, reply)) => {
                    let result = self.delete(id).await;
                    let _ = reply.send(result);
                }
            }
        }

        self.apply(Signal::Teardown);
        self.publish();
        tracing::info!("report job poller stopped");
    }

    /// Fetch the current page and fold the result into local state.
    pub async fn reconcile(&mut self, mode: FetchMode) -> Result<(), ApiError> {
        self.fetches += 1;
        match self.source.list_jobs(self.query).await {
            Ok(page) => {
                self.pagination = Some(page.meta(self.query));
                self.replace_jobs(page.data);
                self.last_error = None;
                self.apply(Signal::JobsChanged {
                    has_active: has_active(&self.jobs),
                });
                self.publish();
                Ok(())
            }
            Err(err) => {
                match mode {
                    FetchMode::Silent if err.is_transient() => {
                        tracing::warn!(error = %err, "background refresh of report jobs failed");
                    }
                    FetchMode::Silent => {
                        tracing::error!(error = %err, "background refresh of report jobs rejected");
                    }
                    FetchMode::Manual => {
                        tracing::error!(error = %err, "refresh of report jobs failed");
                        self.notifier.notify(Notice::from_api_error(&err));
                    }
                }
                let signal = if err.is_rate_limited() {
                    tracing::warn!("rate limited, polling paused until the next refresh");
                    Signal::RateLimited
                } else {
                    Signal::FetchFailed
                };
                self.last_error = Some(err.to_string());
                self.apply(signal);
                self.publish();
                Err(err)
            }
        }
    }

    async fn delete(&mut self, id: u64) -> Result<(), ApiError> {
        if let Err(err) = self.source.delete_job(id).await {
            tracing::error!(job_id = id, error = %err, "failed to delete report job");
            self.notifier.notify(Notice::from_api_error(&err));
            return Err(err);
        }
        tracing::info!(job_id = id, "report job deleted");
        self.notifier
            .notify(Notice::info("Deleted", "Report deleted successfully."));
        self.reconcile(FetchMode::Manual).await
    }

    fn replace_jobs(&mut self, jobs: Vec<ReportJob>) {
        for job in &jobs {
            if let Some(prev) = self.jobs.iter().find(|p| p.id == job.id)
                && prev.status != job.status
            {
                if job.status.rank() < prev.status.rank() {
                    tracing::warn!(
                        job_id = job.id,
                        from = %prev.status,
                        to = %job.status,
                        "report job status went backwards"
                    );
                } else {
                    tracing::info!(
                        job_id = job.id,
                        from = %prev.status,
                        to = %job.status,
                        "report job status changed"
                    );
                }
            }
        }
        self.jobs = jobs;
    }

    fn apply(&mut self, signal: Signal) {
        let (next, action) = PollerMachine::next(self.state, signal);
        match action {
            TimerAction::Reschedule => {
                // Release first so two timers never coexist.
                drop(self.timer.take());
                let timer = PollTimer::start(self.period, &self.gauge);
                tracing::trace!(period = ?timer.period(), "next poll scheduled");
                self.timer = Some(timer);
            }
            TimerAction::Cancel => drop(self.timer.take()),
            TimerAction::Keep => {}
        }
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, ?signal, "poller transition");
        }
        self.state = next;
    }

    fn publish(&self) {
        self.snapshot.send_replace(PollerSnapshot {
            state: self.state,
            jobs: self.jobs.clone(),
            pagination: self.pagination,
            query: self.query,
            last_error: self.last_error.clone(),
            fetches: self.fetches,
        });
    }
}

/// Owner side of a spawned [`JobPoller`].
///
/// Dropping the handle tears the poller down; [`PollerHandle::shutdown`]
/// does the same and waits for the task to finish.
pub struct PollerHandle {
    commands: Option<mpsc::Sender<Command>>,
    snapshot: watch::Receiver<PollerSnapshot>,
    gauge: TimerGauge,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> Result<(), PollerError> {
        let commands = self.commands.as_ref().ok_or(PollerError::Closed)?;
        let (tx, rx) = oneshot::channel();
        commands
            .send(build(tx))
            .await
            .map_err(|_| PollerError::Closed)?;
        rx.await.map_err(|_| PollerError::Closed)??;
        Ok(())
    }

    /// Manual refresh; failures are notified and returned.
    pub async fn refresh(&self) -> Result<(), PollerError> {
        self.request(Command::Refresh).await
    }

    pub async fn set_page(&self, query: PageQuery) -> Result<(), PollerError> {
        self.request(|reply| Command::SetPage(query, reply)).await
    }

    /// Delete a job, then re-fetch the current page.
    pub async fn delete(&self, id: u64) -> Result<(), PollerError> {
        self.request(|reply| Command::Delete(id, reply)).await
    }

    pub fn snapshot(&self) -> PollerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerSnapshot> {
        self.snapshot.clone()
    }

    pub fn active_timers(&self) -> usize {
        self.gauge.live()
    }

    pub async fn shutdown(mut self) {
        // Closing the command channel ends the loop after any fetch in flight.
        self.commands.take();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::error!(error = %err, "report job poller task failed");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
impl<S: JobSource> JobPoller<S> {
    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn timer_gauge(&self) -> TimerGauge {
        self.gauge.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobStatus;
    use crate::api::types::{JobPage, ReportFormat, ReportType};
    use crate::notify::{Level, RecordingNotifier};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn job(id: u64, status: JobStatus) -> ReportJob {
        ReportJob {
            id,
            report_type: ReportType::Labs,
            format: ReportFormat::Pdf,
            status,
            file_path: None,
            download_url: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            created_at: "2026-01-24T01:34:20Z".parse().unwrap(),
            filters: serde_json::Value::Null,
        }
    }

    fn page(jobs: Vec<ReportJob>) -> JobPage {
        JobPage {
            data: jobs,
            current_page: Some(1),
            last_page: Some(1),
            per_page: Some(20),
            total: None,
            from: None,
            to: None,
        }
    }

    fn rate_limited() -> ApiError {
        ApiError::RateLimited {
            retry_after_secs: Some(60),
            message: None,
        }
    }

    /// Replays queued responses; the last one repeats once the queue is empty.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<JobPage, ApiError>>>,
        last: Mutex<Option<Result<JobPage, ApiError>>>,
        calls: AtomicUsize,
        queries: Mutex<Vec<PageQuery>>,
        deleted: Mutex<Vec<u64>>,
        delete_error: Option<ApiError>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<JobPage, ApiError>>) -> Arc<Self> {
            Arc::new(Self::build(responses, None))
        }

        fn failing_delete(responses: Vec<Result<JobPage, ApiError>>, err: ApiError) -> Arc<Self> {
            Arc::new(Self::build(responses, Some(err)))
        }

        fn build(responses: Vec<Result<JobPage, ApiError>>, delete_error: Option<ApiError>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                delete_error,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn push(&self, response: Result<JobPage, ApiError>) {
            self.responses.lock().unwrap().push_back(response);
        }
    }

    impl JobSource for ScriptedSource {
        async fn list_jobs(&self, query: PageQuery) -> Result<JobPage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query);
            let next = self.responses.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next);
            }
            last.clone().unwrap_or_else(|| Ok(page(Vec::new())))
        }

        async fn delete_job(&self, id: u64) -> Result<(), ApiError> {
            self.deleted.lock().unwrap().push(id);
            match &self.delete_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn poller(source: &Arc<ScriptedSource>) -> (JobPoller<ScriptedSource>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let poller = JobPoller::new(source.clone(), notifier.clone(), PollerSettings::default());
        (poller, notifier)
    }

    async fn first_fetch(handle: &PollerHandle) {
        handle
            .subscribe()
            .wait_for(|s| s.fetches >= 1)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn active_jobs_keep_one_timer() {
        let source = ScriptedSource::new(vec![Ok(page(vec![
            job(1, JobStatus::Pending),
            job(2, JobStatus::Completed),
        ]))]);
        let (mut poller, _) = poller(&source);

        poller.reconcile(FetchMode::Silent).await.unwrap();
        assert_eq!(poller.state(), PollerState::Polling);
        assert_eq!(poller.timer_gauge().live(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_jobs_release_timer() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![job(1, JobStatus::Processing)])),
            Ok(page(vec![job(1, JobStatus::Failed), job(2, JobStatus::Completed)])),
        ]);
        let (mut poller, _) = poller(&source);

        poller.reconcile(FetchMode::Silent).await.unwrap();
        assert_eq!(poller.state(), PollerState::Polling);
        poller.reconcile(FetchMode::Silent).await.unwrap();
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.timer_gauge().live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_list_is_idle() {
        let source = ScriptedSource::new(vec![Ok(page(Vec::new()))]);
        let (mut poller, _) = poller(&source);

        poller.reconcile(FetchMode::Manual).await.unwrap();
        assert_eq!(poller.state(), PollerState::Idle);
        assert_eq!(poller.timer_gauge().live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_twice_leaves_one_timer() {
        let source = ScriptedSource::new(Vec::new());
        let (mut poller, _) = poller(&source);
        let gauge = poller.timer_gauge();

        poller.apply(Signal::JobsChanged { has_active: true });
        poller.apply(Signal::JobsChanged { has_active: true });
        assert_eq!(gauge.live(), 1);
        assert_eq!(poller.state(), PollerState::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn processing_then_completed_stops_polling() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![job(1, JobStatus::Processing)])),
            Ok(page(vec![job(1, JobStatus::Completed)])),
        ]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;
        assert_eq!(handle.snapshot().state, PollerState::Polling);
        assert_eq!(handle.active_timers(), 1);

        sleep(Duration::from_secs(11)).await;
        assert_eq!(source.calls(), 2);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, PollerState::Idle);
        assert_eq!(snapshot.jobs[0].status, JobStatus::Completed);
        assert_eq!(handle.active_timers(), 0);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 2);
        assert!(notifier.notices().is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_on_tick_stops_polling_silently() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![job(1, JobStatus::Pending)])),
            Err(rate_limited()),
        ]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;

        sleep(Duration::from_secs(11)).await;
        assert_eq!(source.calls(), 2);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, PollerState::Idle);
        assert_eq!(snapshot.jobs.len(), 1);
        assert!(snapshot.last_error.is_some());
        assert_eq!(handle.active_timers(), 0);

        sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls(), 2);
        assert!(notifier.notices().is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_resumes_after_rate_limit() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![job(1, JobStatus::Pending)])),
            Err(rate_limited()),
            Ok(page(vec![job(1, JobStatus::Processing)])),
        ]);
        let (poller, _) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;
        sleep(Duration::from_secs(11)).await;
        assert_eq!(handle.snapshot().state, PollerState::Idle);

        handle.refresh().await.unwrap();
        assert_eq!(handle.snapshot().state, PollerState::Polling);
        assert_eq!(handle.active_timers(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_on_tick_keeps_list_and_schedule() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![job(1, JobStatus::Processing)])),
            Err(ApiError::Network("connection reset".into())),
            Ok(page(vec![job(1, JobStatus::Processing)])),
        ]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;
        let before = handle.snapshot().jobs;

        sleep(Duration::from_secs(11)).await;
        assert_eq!(source.calls(), 2);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.jobs, before);
        assert_eq!(snapshot.state, PollerState::Polling);
        assert_eq!(handle.active_timers(), 1);

        // Next tick still lands on the same 10s grid.
        sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls(), 3);
        assert!(notifier.notices().is_empty());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_failure_notifies_once() {
        let source = ScriptedSource::new(vec![Ok(page(Vec::new()))]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;

        source.push(Err(ApiError::Status {
            status: 500,
            message: Some("boom".into()),
        }));
        let err = handle.refresh().await.unwrap_err();
        assert!(matches!(err, PollerError::Api(ApiError::Status { status: 500, .. })));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Server error");
        assert_eq!(notices[0].description, "boom");
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_rate_limit_notifies_and_stops_timer() {
        let source = ScriptedSource::new(vec![Ok(page(vec![job(1, JobStatus::Processing)]))]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;
        assert_eq!(handle.active_timers(), 1);

        source.push(Err(rate_limited()));
        let err = handle.refresh().await.unwrap_err();
        assert!(matches!(err, PollerError::Api(ApiError::RateLimited { .. })));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Too many requests");
        assert_eq!(notices[0].description, "Try again in 60 seconds.");
        assert_eq!(handle.active_timers(), 0);
        assert_eq!(handle.snapshot().state, PollerState::Idle);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 2);
        handle.shutdown().await;
    }

    /// Each fetch takes longer than the poll period.
    struct SlowSource {
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl JobSource for SlowSource {
        async fn list_jobs(&self, _query: PageQuery) -> Result<JobPage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(page(vec![job(1, JobStatus::Processing)]))
        }

        async fn delete_job(&self, _id: u64) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetches_never_overlap() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(25),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let handle = JobPoller::new(source.clone(), notifier, PollerSettings::default()).spawn();

        sleep(Duration::from_secs(200)).await;
        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "only {calls} fetches in 200s");
        // One fetch every 25s at most, even though the period is 10s.
        assert!(calls <= 9, "{calls} fetches in 200s");
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(handle.active_timers(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_failure_is_notified() {
        let source = ScriptedSource::new(vec![Err(ApiError::Network("refused".into()))]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;

        assert_eq!(notifier.notices().len(), 1);
        assert_eq!(handle.snapshot().state, PollerState::Idle);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_timer() {
        let source = ScriptedSource::new(vec![Ok(page(vec![job(1, JobStatus::Pending)]))]);
        let (poller, _) = poller(&source);
        let gauge = poller.timer_gauge();
        let handle = poller.spawn();
        first_fetch(&handle).await;
        assert_eq!(gauge.live(), 1);

        handle.shutdown().await;
        assert_eq!(gauge.live(), 0);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_releases_timer() {
        let source = ScriptedSource::new(vec![Ok(page(vec![job(1, JobStatus::Pending)]))]);
        let (poller, _) = poller(&source);
        let gauge = poller.timer_gauge();
        let handle = poller.spawn();
        first_fetch(&handle).await;
        assert_eq!(gauge.live(), 1);

        drop(handle);
        sleep(Duration::from_millis(1)).await;
        assert_eq!(gauge.live(), 0);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_refetches_and_notifies() {
        let source = ScriptedSource::new(vec![
            Ok(page(vec![job(1, JobStatus::Completed), job(2, JobStatus::Failed)])),
            Ok(page(vec![job(2, JobStatus::Failed)])),
        ]);
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;

        handle.delete(1).await.unwrap();
        assert_eq!(*source.deleted.lock().unwrap(), vec![1]);
        assert_eq!(source.calls(), 2);
        assert_eq!(handle.snapshot().jobs.len(), 1);
        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, Level::Info);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delete_skips_refetch() {
        let source = ScriptedSource::failing_delete(
            vec![Ok(page(vec![job(1, JobStatus::Completed)]))],
            ApiError::Status {
                status: 404,
                message: Some("Relatório não encontrado".into()),
            },
        );
        let (poller, notifier) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;

        assert!(handle.delete(1).await.is_err());
        assert_eq!(source.calls(), 1);
        assert_eq!(notifier.notices()[0].description, "Relatório não encontrado");
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn set_page_fetches_with_new_query() {
        let source = ScriptedSource::new(vec![Ok(page(Vec::new()))]);
        let (poller, _) = poller(&source);
        let handle = poller.spawn();
        first_fetch(&handle).await;

        let query = PageQuery::new(3, 50);
        handle.set_page(query).await.unwrap();
        assert_eq!(source.queries.lock().unwrap().last(), Some(&query));
        assert_eq!(handle.snapshot().query, query);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_shutdown_fail_closed() {
        let source = ScriptedSource::new(vec![Ok(page(Vec::new()))]);
        let (poller, _) = poller(&source);
        let mut handle = poller.spawn();
        first_fetch(&handle).await;
        handle.commands.take();

        assert!(matches!(handle.refresh().await, Err(PollerError::Closed)));
    }
}
