use crate::backend::{BackendError, StageBackend};
use crate::tail::LogSink;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use stool_core::{ActionRequest, LogChunk, StageSnapshot};

/// Scripted in-memory backend. Unscripted log polls report a running
/// process with no new output.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub snapshots: Mutex<VecDeque<Result<StageSnapshot, BackendError>>>,
    pub invoke_results: Mutex<VecDeque<Result<String, BackendError>>>,
    pub invocations: Mutex<Vec<ActionRequest>>,
    pub chunks: Mutex<HashMap<String, VecDeque<Result<LogChunk, BackendError>>>>,
    pub log_requests: Mutex<Vec<(String, u64)>>,
    pub stage_logs: Mutex<Vec<String>>,
    pub snapshot_delay: Option<Duration>,
}

impl FakeBackend {
    pub fn push_snapshot(&self, result: Result<StageSnapshot, BackendError>) {
        self.snapshots.lock().expect("lock").push_back(result);
    }

    pub fn push_invoke(&self, result: Result<String, BackendError>) {
        self.invoke_results.lock().expect("lock").push_back(result);
    }

    pub fn push_chunk(&self, process_id: &str, data: &str, next_offset: u64, running: bool) {
        self.chunks
            .lock()
            .expect("lock")
            .entry(process_id.to_string())
            .or_default()
            .push_back(Ok(LogChunk {
                data: data.to_string(),
                next_offset,
                running,
            }));
    }

    pub fn push_chunk_error(&self, process_id: &str, status: u16) {
        self.chunks
            .lock()
            .expect("lock")
            .entry(process_id.to_string())
            .or_default()
            .push_back(Err(status_error(status)));
    }

    pub fn invoked(&self) -> Vec<String> {
        self.invocations
            .lock()
            .expect("lock")
            .iter()
            .map(|request| request.to_string())
            .collect()
    }

    pub fn log_requests(&self) -> Vec<(String, u64)> {
        self.log_requests.lock().expect("lock").clone()
    }
}

pub(crate) fn status_error(status: u16) -> BackendError {
    BackendError::Status {
        status,
        body: "scripted".to_string(),
    }
}

impl StageBackend for FakeBackend {
    async fn fetch_snapshot(&self) -> Result<StageSnapshot, BackendError> {
        if let Some(delay) = self.snapshot_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.snapshots.lock().expect("lock").pop_front();
        next.unwrap_or_else(|| Err(status_error(503)))
    }

    async fn invoke(&self, request: &ActionRequest) -> Result<String, BackendError> {
        self.invocations.lock().expect("lock").push(request.clone());
        let next = self.invoke_results.lock().expect("lock").pop_front();
        next.unwrap_or_else(|| Err(status_error(500)))
    }

    async fn fetch_log(&self, process_id: &str, offset: u64) -> Result<LogChunk, BackendError> {
        self.log_requests
            .lock()
            .expect("lock")
            .push((process_id.to_string(), offset));
        let next = self
            .chunks
            .lock()
            .expect("lock")
            .get_mut(process_id)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| {
            Ok(LogChunk {
                data: String::new(),
                next_offset: offset,
                running: true,
            })
        })
    }

    async fn list_stage_logs(&self, _stage: &str) -> Result<Vec<String>, BackendError> {
        Ok(self.stage_logs.lock().expect("lock").clone())
    }
}

/// Records every sink call as a short string.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<String>,
    pub text: String,
}

impl LogSink for RecordingSink {
    fn started(&mut self, process_id: &str) {
        self.events.push(format!("started:{process_id}"));
    }

    fn append(&mut self, data: &str) {
        self.events.push(format!("append:{data}"));
        self.text.push_str(data);
    }

    fn clear(&mut self) {
        self.events.push("clear".to_string());
        self.text.clear();
    }

    fn buffered_chars(&self) -> usize {
        self.text.chars().count()
    }

    fn scroll_to_bottom(&mut self) {
        self.events.push("scroll".to_string());
    }

    fn finished(&mut self) {
        self.events.push("finished".to_string());
    }

    fn report_failure(&mut self, message: &str) {
        self.events.push(format!("failure:{message}"));
    }
}
