use crate::backend::StageBackend;
use crate::scheduler::SchedulerHandle;
use crate::tail::{LogSink, LogTailer, TailOutcome, TailSettings};
use std::sync::Arc;
use stool_core::{ActionRequest, ActionSequence, DashboardController, SequenceState, StageView};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done { process_ids: Vec<String> },
    Failed { message: String },
}

impl ActionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, ActionOutcome::Done { .. })
    }
}

/// Runs stage actions: issues each command step, tails its log into the
/// caller's sink and moves on once the tail has ended.
pub struct ActionInvoker<B> {
    backend: Arc<B>,
    tailer: LogTailer<B>,
    scheduler: Option<SchedulerHandle>,
}

impl<B: StageBackend> ActionInvoker<B> {
    pub fn new(backend: Arc<B>, settings: TailSettings) -> Self {
        let tailer = LogTailer::new(backend.clone(), settings);
        Self {
            backend,
            tailer,
            scheduler: None,
        }
    }

    /// Finished actions ask this scheduler for an immediate refresh.
    pub fn with_scheduler(mut self, scheduler: SchedulerHandle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn tailer(&self) -> &LogTailer<B> {
        &self.tailer
    }

    /// A failed step ends the action: later steps are not issued, the row
    /// is marked broken and the failure goes to `sink` unless the view was
    /// closed. Closing the view only stops the log display.
    pub async fn run<V, S>(
        &self,
        request: ActionRequest,
        controller: &Mutex<DashboardController<V>>,
        sink: Arc<Mutex<S>>,
        view_token: CancellationToken,
    ) -> ActionOutcome
    where
        V: StageView,
        S: LogSink + 'static,
    {
        info!("action_start: {request}");
        let stage = request.stage.clone();
        let mut sequence = ActionSequence::new(request);
        let mut next = sequence.start();

        while let Some(step) = next.take() {
            match self.backend.invoke(&step).await {
                Ok(process_id) => {
                    debug!("action_step: {step} process={process_id}");
                    let session =
                        self.tailer
                            .open_tail(process_id.clone(), sink.clone(), view_token.clone());
                    match session.wait().await {
                        TailOutcome::Failed(message) => {
                            warn!("action_log_unavailable: {step} {message}");
                        }
                        TailOutcome::Cancelled => debug!("action_log_closed: {step}"),
                        TailOutcome::Finished => {}
                    }
                    next = sequence.step_succeeded(process_id);
                }
                Err(err) => {
                    sequence.step_failed(err.to_string());
                }
            }
        }

        let outcome = match sequence.state() {
            SequenceState::Done => {
                info!("action_done: {}", sequence.request());
                ActionOutcome::Done {
                    process_ids: sequence.process_ids().to_vec(),
                }
            }
            _ => {
                let message = sequence
                    .failure()
                    .unwrap_or("action did not complete")
                    .to_string();
                error!("action_failed: {} {message}", sequence.request());
                controller.lock().await.mark_broken(&stage, &message);
                if !view_token.is_cancelled() {
                    sink.lock().await.report_failure(&message);
                }
                ActionOutcome::Failed { message }
            }
        };

        if let Some(scheduler) = &self.scheduler {
            scheduler.request_refresh();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PollScheduler;
    use crate::testing::{status_error, FakeBackend, RecordingSink};
    use crate::view::{LogPane, TableView};
    use std::time::Duration;
    use stool_core::{ColumnRenderer, StageAction, StageRecord, StageSnapshot};

    fn settings() -> TailSettings {
        TailSettings {
            poll_interval: Duration::from_millis(1000),
            cap_chars: 100_000,
        }
    }

    fn controller_with(names: &[&str]) -> Mutex<DashboardController<TableView>> {
        let mut controller = DashboardController::new(TableView::new(ColumnRenderer::default()));
        controller.apply_snapshot(&StageSnapshot::from_records(
            names
                .iter()
                .map(|name| StageRecord::new(*name).with_field("status", "running")),
        ));
        Mutex::new(controller)
    }

    #[tokio::test(start_paused = true)]
    async fn restart_runs_stop_then_start_after_stop_log_ends() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_invoke(Ok("p-stop".to_string()));
        backend.push_invoke(Ok("p-start".to_string()));
        backend.push_chunk("p-stop", "stopping\n", 9, true);
        backend.push_chunk("p-stop", "stopped\n", 17, false);
        backend.push_chunk("p-start", "started\n", 8, false);
        let controller = controller_with(&["web"]);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));

        let invoker = ActionInvoker::new(backend.clone(), settings());
        let request = ActionRequest::new("web", StageAction::Restart).with_arguments("fast");
        let outcome = invoker
            .run(request, &controller, sink.clone(), CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            ActionOutcome::Done {
                process_ids: vec!["p-stop".to_string(), "p-start".to_string()]
            }
        );
        assert_eq!(backend.invoked(), vec!["stop web", "start web (fast)"]);
        assert_eq!(sink.lock().await.text, "stopping\nstopped\nstarted\n");
        let requests = backend.log_requests();
        let first_start = requests
            .iter()
            .position(|(pid, _)| pid == "p-start")
            .expect("start polled");
        assert!(requests[..first_start].iter().all(|(pid, _)| pid == "p-stop"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_pane_within_cap_across_both_processes() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_invoke(Ok("p-stop".to_string()));
        backend.push_invoke(Ok("p-start".to_string()));
        backend.push_chunk("p-stop", "123456789", 9, false);
        backend.push_chunk("p-start", "abcdefghi", 9, true);
        backend.push_chunk("p-start", "jk", 11, false);
        let controller = controller_with(&["web"]);
        let pane = Arc::new(Mutex::new(LogPane::new()));
        pane.lock().await.open("restart web");

        let cap = 10;
        let invoker = ActionInvoker::new(
            backend.clone(),
            TailSettings {
                poll_interval: Duration::from_millis(1000),
                cap_chars: cap,
            },
        );
        let outcome = invoker
            .run(
                ActionRequest::new("web", StageAction::Restart),
                &controller,
                pane.clone(),
                CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_done());
        let pane = pane.lock().await;
        // Never more than the cap plus the last chunk.
        assert!(pane.text().chars().count() <= cap + 2);
        assert_eq!(pane.text(), "jk");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stop_never_issues_start() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_invoke(Err(status_error(500)));
        let controller = controller_with(&["web"]);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));

        let invoker = ActionInvoker::new(backend.clone(), settings());
        let outcome = invoker
            .run(
                ActionRequest::new("web", StageAction::Restart),
                &controller,
                sink.clone(),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcome, ActionOutcome::Failed { ref message } if message.contains("500")));
        assert_eq!(backend.invoked(), vec!["stop web"]);
        assert!(backend.log_requests().is_empty());

        let guard = controller.lock().await;
        assert!(guard.view().rows()[0].broken.is_some());
        let sink = sink.lock().await;
        assert_eq!(sink.events.len(), 1);
        assert!(sink.events[0].starts_with("failure:"));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_view_still_runs_remaining_steps() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_invoke(Ok("p-stop".to_string()));
        backend.push_invoke(Ok("p-start".to_string()));
        let controller = controller_with(&["web"]);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let view_token = CancellationToken::new();

        let closer = view_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            closer.cancel();
        });

        let invoker = ActionInvoker::new(backend.clone(), settings());
        let outcome = invoker
            .run(
                ActionRequest::new("web", StageAction::Restart),
                &controller,
                sink.clone(),
                view_token,
            )
            .await;

        assert!(outcome.is_done());
        assert_eq!(backend.invoked(), vec!["stop web", "start web"]);
        assert!(backend
            .log_requests()
            .iter()
            .all(|(pid, _)| pid == "p-stop"));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_action_requests_refresh() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_invoke(Ok("p-1".to_string()));
        backend.push_chunk("p-1", "", 0, false);
        let controller = controller_with(&["web"]);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));

        let scheduler = PollScheduler::new(Duration::from_secs(3600));
        let handle = scheduler.handle();
        let invoker = ActionInvoker::new(backend.clone(), settings()).with_scheduler(handle.clone());
        let outcome = invoker
            .run(
                ActionRequest::new("web", StageAction::Delete),
                &controller,
                sink,
                CancellationToken::new(),
            )
            .await;
        assert!(outcome.is_done());

        // The stored permit makes the first wait return at once.
        let passes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = passes.clone();
        let (_, join) = scheduler.start(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(passes.load(std::sync::atomic::Ordering::SeqCst), 2);
        handle.stop();
        join.await.expect("join");
    }
}
