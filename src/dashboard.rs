//! Live dashboard statistics.
//!
//! A fixed refresh timer and the realtime subscription are two independent
//! triggers feeding the same [`DashboardMonitor::refresh`] routine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::api::{DashboardStats, StatsSource};
use crate::realtime::{Delivery, Subscription};

pub const DEFAULT_DASHBOARD_PERIOD: Duration = Duration::from_secs(30);

/// Why a refresh ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initial,
    Timer,
    Push,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    /// Last successfully fetched stats; kept across failed refreshes.
    pub stats: Option<DashboardStats>,
    pub refreshes: u64,
    pub push_refreshes: u64,
    pub last_error: Option<String>,
}

pub struct DashboardMonitor<S> {
    source: Arc<S>,
    period: Duration,
    subscription: Option<Subscription>,
    snapshot: watch::Sender<DashboardSnapshot>,
    current: DashboardSnapshot,
}

impl<S: StatsSource> DashboardMonitor<S> {
    pub fn new(source: Arc<S>, period: Duration, subscription: Option<Subscription>) -> Self {
        let (snapshot, _) = watch::channel(DashboardSnapshot::default());
        Self {
            source,
            period: period.max(Duration::from_millis(1)),
            subscription,
            snapshot,
            current: DashboardSnapshot::default(),
        }
    }

    pub fn spawn(self) -> DashboardHandle {
        let snapshot = self.snapshot.subscribe();
        let task = tokio::spawn(self.run());
        DashboardHandle {
            snapshot,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        self.refresh(Trigger::Initial).await;

        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let delivery = tokio::select! {
                _ = timer.tick() => None,
                delivery = next_delivery(&mut self.subscription) => Some(delivery),
            };

            let trigger = match delivery {
                None => Trigger::Timer,
                Some(Some(Delivery::Event(event))) => {
                    tracing::debug!(event = event.name(), "dashboard push event");
                    Trigger::Push
                }
                Some(Some(Delivery::Missed(n))) => {
                    tracing::debug!(missed = n, "dashboard subscription lagged");
                    Trigger::Push
                }
                Some(None) => {
                    tracing::info!("realtime channel closed, falling back to timer only");
                    self.subscription = None;
                    continue;
                }
            };
            self.refresh(trigger).await;
        }
    }

    /// Fetch stats once. Failures are logged and the previous stats kept.
    pub async fn refresh(&mut self, trigger: Trigger) {
        self.current.refreshes += 1;
        if trigger == Trigger::Push {
            self.current.push_refreshes += 1;
        }
        match self.source.dashboard_stats().await {
            Ok(stats) => {
                self.current.stats = Some(stats);
                self.current.last_error = None;
            }
            Err(err) => {
                tracing::error!(error = %err, ?trigger, "failed to fetch dashboard stats");
                self.current.last_error = Some(err.to_string());
            }
        }
        self.snapshot.send_replace(self.current.clone());
    }
}

async fn next_delivery(subscription: &mut Option<Subscription>) -> Option<Delivery> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// Owner side of a spawned [`DashboardMonitor`]. Dropping it stops the
/// monitor and releases its subscription.
pub struct DashboardHandle {
    snapshot: watch::Receiver<DashboardSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl DashboardHandle {
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // A cancelled join error is the expected outcome here.
            let _ = task.await;
        }
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
