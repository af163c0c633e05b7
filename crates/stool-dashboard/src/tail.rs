use crate::backend::StageBackend;
use crate::config::DashboardConfig;
use std::sync::Arc;
use std::time::Duration;
use stool_core::{TailState, TailStep};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives log output for one view. Calls arrive in fetch order and never
/// after the session's token is cancelled.
pub trait LogSink: Send {
    fn started(&mut self, _process_id: &str) {}

    fn append(&mut self, data: &str);

    fn clear(&mut self);

    fn scroll_to_bottom(&mut self);

    /// Characters currently shown, counting output of earlier sessions.
    fn buffered_chars(&self) -> usize;

    /// The process is no longer running; hides the progress indicator.
    fn finished(&mut self);

    fn report_failure(&mut self, message: &str) {
        self.append(&format!("failed: {message}\n"));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailSettings {
    pub poll_interval: Duration,
    pub cap_chars: usize,
}

impl TailSettings {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            poll_interval: config.log_poll_interval,
            cap_chars: config.log_cap_chars,
        }
    }
}

pub struct LogTailer<B> {
    backend: Arc<B>,
    settings: TailSettings,
}

impl<B> Clone for LogTailer<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            settings: self.settings,
        }
    }
}

impl<B: StageBackend> LogTailer<B> {
    pub fn new(backend: Arc<B>, settings: TailSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> TailSettings {
        self.settings
    }

    /// Starts polling the process log into `sink` until the process ends or
    /// `cancel` fires.
    pub fn open_tail<S>(
        &self,
        process_id: impl Into<String>,
        sink: Arc<Mutex<S>>,
        cancel: CancellationToken,
    ) -> TailSession
    where
        S: LogSink + 'static,
    {
        let process_id = process_id.into();
        let join = tokio::spawn(run_tail(
            self.backend.clone(),
            self.settings,
            process_id.clone(),
            sink,
            cancel.clone(),
        ));
        TailSession {
            process_id,
            cancel,
            join,
        }
    }
}

pub struct TailSession {
    process_id: String,
    cancel: CancellationToken,
    join: JoinHandle<TailOutcome>,
}

impl TailSession {
    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> TailOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => TailOutcome::Failed(format!("tail task aborted: {err}")),
        }
    }
}

async fn run_tail<B, S>(
    backend: Arc<B>,
    settings: TailSettings,
    process_id: String,
    sink: Arc<Mutex<S>>,
    cancel: CancellationToken,
) -> TailOutcome
where
    B: StageBackend,
    S: LogSink,
{
    let mut state = TailState::new(process_id.clone(), settings.cap_chars);
    {
        let mut sink = sink.lock().await;
        if cancel.is_cancelled() {
            return TailOutcome::Cancelled;
        }
        sink.started(&process_id);
    }

    loop {
        if cancel.is_cancelled() {
            return TailOutcome::Cancelled;
        }
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TailOutcome::Cancelled,
            result = backend.fetch_log(&process_id, state.offset()) => result,
        };
        let chunk = match fetched {
            Ok(chunk) => chunk,
            Err(err) => {
                // The view keeps its progress indicator; nothing retries.
                warn!("log_fetch_error: process={process_id} offset={} {err}", state.offset());
                return TailOutcome::Failed(err.to_string());
            }
        };
        if cancel.is_cancelled() {
            return TailOutcome::Cancelled;
        }

        let step = {
            let mut sink = sink.lock().await;
            if cancel.is_cancelled() {
                return TailOutcome::Cancelled;
            }
            let step = state.apply(chunk, sink.buffered_chars());
            deliver(&mut *sink, &step);
            step
        };
        if !step.keep_polling {
            debug!("log_tail_finished: process={process_id} offset={}", state.offset());
            return TailOutcome::Finished;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return TailOutcome::Cancelled,
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }
}

fn deliver<S: LogSink + ?Sized>(sink: &mut S, step: &TailStep) {
    if step.clear_first {
        sink.clear();
    }
    if let Some(data) = &step.append {
        sink.append(data);
        sink.scroll_to_bottom();
    }
    if !step.keep_polling {
        sink.finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, RecordingSink};

    fn settings(cap_chars: usize) -> TailSettings {
        TailSettings {
            poll_interval: Duration::from_millis(1000),
            cap_chars,
        }
    }

    fn tailer(backend: &Arc<FakeBackend>, cap_chars: usize) -> LogTailer<FakeBackend> {
        LogTailer::new(backend.clone(), settings(cap_chars))
    }

    #[tokio::test(start_paused = true)]
    async fn tails_until_process_stops() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_chunk("p-1", "hello", 5, true);
        backend.push_chunk("p-1", "", 5, true);
        backend.push_chunk("p-1", " world", 11, false);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));

        let session = tailer(&backend, 100_000).open_tail("p-1", sink.clone(), CancellationToken::new());
        assert_eq!(session.process_id(), "p-1");
        assert_eq!(session.wait().await, TailOutcome::Finished);

        let sink = sink.lock().await;
        assert_eq!(sink.text, "hello world");
        assert_eq!(
            sink.events,
            vec![
                "started:p-1",
                "append:hello",
                "scroll",
                "append: world",
                "scroll",
                "finished"
            ]
        );
        assert_eq!(
            backend.log_requests(),
            vec![
                ("p-1".to_string(), 0),
                ("p-1".to_string(), 5),
                ("p-1".to_string(), 5)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn polls_once_per_interval() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let cancel = CancellationToken::new();
        let session = tailer(&backend, 100_000).open_tail("p-1", sink, cancel.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(backend.log_requests().len(), 4);

        session.close();
        assert_eq!(session.wait().await, TailOutcome::Cancelled);
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(backend.log_requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_session_never_writes_to_sink() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_chunk("p-1", "first", 5, true);
        backend.push_chunk("p-1", "second", 11, true);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let cancel = CancellationToken::new();
        let session = tailer(&backend, 100_000).open_tail("p-1", sink.clone(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        // Hold the sink the way the view does while closing.
        {
            let mut guard = sink.lock().await;
            cancel.cancel();
            guard.events.clear();
            guard.text.clear();
        }
        assert_eq!(session.wait().await, TailOutcome::Cancelled);
        tokio::time::sleep(Duration::from_millis(5000)).await;

        let sink = sink.lock().await;
        assert!(sink.events.is_empty());
        assert!(sink.text.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_start_does_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let session = tailer(&backend, 100_000).open_tail("p-1", sink.clone(), cancel);
        assert_eq!(session.wait().await, TailOutcome::Cancelled);
        assert!(backend.log_requests().is_empty());
        assert!(sink.lock().await.events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_stops_without_finishing() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_chunk("p-1", "partial", 7, true);
        backend.push_chunk_error("p-1", 502);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));

        let session = tailer(&backend, 100_000).open_tail("p-1", sink.clone(), CancellationToken::new());
        let outcome = session.wait().await;
        assert!(matches!(outcome, TailOutcome::Failed(ref message) if message.contains("502")));

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(backend.log_requests().len(), 2);
        let sink = sink.lock().await;
        assert!(!sink.events.iter().any(|event| event == "finished"));
        assert_eq!(sink.text, "partial");
    }

    #[tokio::test(start_paused = true)]
    async fn clears_sink_when_over_cap() {
        let backend = Arc::new(FakeBackend::default());
        for n in 1..=3 {
            backend.push_chunk("p-1", "abcdef", n * 6, true);
        }
        backend.push_chunk("p-1", "tail", 22, false);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));

        let session = tailer(&backend, 10).open_tail("p-1", sink.clone(), CancellationToken::new());
        assert_eq!(session.wait().await, TailOutcome::Finished);

        let sink = sink.lock().await;
        assert_eq!(sink.events.iter().filter(|e| *e == "clear").count(), 1);
        assert_eq!(sink.text, "abcdeftail");
    }

    #[tokio::test(start_paused = true)]
    async fn cap_includes_text_left_by_an_earlier_session() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_chunk("p-2", "abc", 3, false);
        let sink = Arc::new(Mutex::new(RecordingSink::default()));
        sink.lock().await.append("0123456789ab");

        let session = tailer(&backend, 10).open_tail("p-2", sink.clone(), CancellationToken::new());
        assert_eq!(session.wait().await, TailOutcome::Finished);

        let sink = sink.lock().await;
        assert!(sink.events.iter().any(|e| e == "clear"));
        assert_eq!(sink.text, "abc");
    }
}
