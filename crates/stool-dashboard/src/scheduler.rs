use crate::backend::StageBackend;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stool_core::{DashboardController, ReconcileReport, StageView};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Self-rescheduling poll loop: the next pass is scheduled only once the
/// previous one has returned, so passes never overlap.
pub struct PollScheduler {
    interval: Duration,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
}

#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    refresh: Arc<Notify>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Cuts the current wait short. Requests made while a pass is running
    /// collapse into one immediate pass.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            refresh: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            refresh: self.refresh.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub async fn run<P, Fut>(self, mut pass: P)
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        while !self.cancel.is_cancelled() {
            pass().await;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.refresh.notified() => {}
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("poll_scheduler_stopped");
    }

    pub fn start<P, Fut>(self, pass: P) -> (SchedulerHandle, JoinHandle<()>)
    where
        P: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = self.handle();
        let join = tokio::spawn(self.run(pass));
        (handle, join)
    }
}

/// One reconciliation pass. A failed fetch keeps the rows that are already
/// displayed.
pub async fn refresh_once<B, V>(
    backend: &B,
    controller: &Mutex<DashboardController<V>>,
) -> Option<ReconcileReport>
where
    B: StageBackend,
    V: StageView,
{
    match backend.fetch_snapshot().await {
        Ok(snapshot) => {
            let report = controller.lock().await.apply_snapshot(&snapshot);
            if !report.is_noop() {
                debug!(
                    "reconcile: inserted={} updated={} removed={}",
                    report.inserted.len(),
                    report.updated.len(),
                    report.removed.len()
                );
            }
            Some(report)
        }
        Err(err) => {
            warn!("snapshot_fetch_error: {err}");
            controller.lock().await.record_failure(err.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use crate::view::TableView;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stool_core::{StageRecord, StageSnapshot};

    #[tokio::test(start_paused = true)]
    async fn first_pass_runs_immediately_then_on_interval() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = passes.clone();
        let (handle, join) = PollScheduler::new(Duration::from_millis(5000)).start(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);

        handle.stop();
        join.await.expect("join");
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_passes_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));
        let (a, m, t) = (active.clone(), max_active.clone(), total.clone());

        let (handle, join) = PollScheduler::new(Duration::from_millis(100)).start(move || {
            let (a, m, t) = (a.clone(), m.clone(), t.clone());
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(700)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                t.fetch_add(1, Ordering::SeqCst);
            }
        });

        for _ in 0..10 {
            handle.request_refresh();
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        handle.stop();
        join.await.expect("join");

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(total.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_request_skips_the_wait() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = passes.clone();
        let (handle, join) = PollScheduler::new(Duration::from_secs(60)).start(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.request_refresh();
        handle.request_refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 2);

        handle.stop();
        join.await.expect("join");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_current_rows() {
        let backend = FakeBackend::default();
        backend.push_snapshot(Ok(StageSnapshot::from_records([
            StageRecord::new("web").with_field("status", "running"),
        ])));
        let controller = Mutex::new(DashboardController::new(TableView::default()));

        let report = refresh_once(&backend, &controller).await.expect("report");
        assert_eq!(report.inserted, vec!["web"]);

        assert!(refresh_once(&backend, &controller).await.is_none());
        let guard = controller.lock().await;
        assert_eq!(guard.view().rows().len(), 1);
        assert!(guard.last_error().expect("error").contains("503"));
        assert_eq!(guard.passes(), 1);
    }
}
