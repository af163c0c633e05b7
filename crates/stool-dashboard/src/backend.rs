use crate::config::DashboardConfig;
use reqwest::{Client, Response, Url};
use std::future::Future;
use stool_core::{ActionRequest, ArgumentStyle, LogChunk, SnapshotError, StageSnapshot};
use thiserror::Error;

pub const SIZE_HEADER: &str = "X-Size";
pub const RUNNING_HEADER: &str = "X-Running";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid base url '{0}'")]
    BaseUrl(String),
    #[error("missing or invalid {0} header")]
    Header(&'static str),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("invalid process id in response: {0}")]
    ProcessId(String),
}

/// The server endpoints the dashboard talks to.
pub trait StageBackend: Send + Sync + 'static {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<StageSnapshot, BackendError>> + Send;

    /// Issues one command and returns the process id of the running action.
    fn invoke(
        &self,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    fn fetch_log(
        &self,
        process_id: &str,
        offset: u64,
    ) -> impl Future<Output = Result<LogChunk, BackendError>> + Send;

    fn list_stage_logs(
        &self,
        stage: &str,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    select: Vec<String>,
    argument_style: ArgumentStyle,
}

impl HttpBackend {
    pub fn new(config: &DashboardConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| BackendError::BaseUrl(format!("{}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::BaseUrl(config.base_url.clone()));
        }
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            base_url,
            select: config.select.clone(),
            argument_style: config.argument_style,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl StageBackend for HttpBackend {
    async fn fetch_snapshot(&self) -> Result<StageSnapshot, BackendError> {
        let mut url = self.endpoint(&["stages"])?;
        if !self.select.is_empty() {
            url.query_pairs_mut()
                .append_pair("select", &self.select.join(","));
        }
        let response = checked(self.client.get(url).send().await?).await?;
        let body = response.text().await?;
        Ok(StageSnapshot::from_json_str(&body)?)
    }

    async fn invoke(&self, request: &ActionRequest) -> Result<String, BackendError> {
        let mut url = self.endpoint(&request.path_segments(self.argument_style))?;
        if let Some(query) = request.query(self.argument_style) {
            url.set_query(Some(query));
        }
        let response = checked(self.client.post(url).send().await?).await?;
        let body = response.text().await?;
        parse_process_id(&body)
    }

    async fn fetch_log(&self, process_id: &str, offset: u64) -> Result<LogChunk, BackendError> {
        let mut url = self.endpoint(&["processes", process_id, "log"])?;
        url.query_pairs_mut()
            .append_pair("index", &offset.to_string());
        let response = checked(self.client.get(url).send().await?).await?;

        let next_offset = response
            .headers()
            .get(SIZE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or(BackendError::Header(SIZE_HEADER))?;
        let running = response
            .headers()
            .get(RUNNING_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim() == "true")
            .unwrap_or(false);
        let data = response.text().await?;

        Ok(LogChunk {
            data,
            next_offset,
            running,
        })
    }

    async fn list_stage_logs(&self, stage: &str) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint(&["stages", stage, "logs"])?;
        let response = checked(self.client.get(url).send().await?).await?;
        Ok(response.json::<Vec<String>>().await?)
    }
}

async fn checked(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

/// The command response is the bare id, or the id as a JSON string.
pub fn parse_process_id(body: &str) -> Result<String, BackendError> {
    let trimmed = body.trim();
    let id = if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed)
            .map_err(|err| BackendError::ProcessId(err.to_string()))?
    } else {
        trimmed.to_string()
    };
    if id.trim().is_empty() {
        return Err(BackendError::ProcessId("empty body".to_string()));
    }
    if id.contains('/') {
        return Err(BackendError::ProcessId(id));
    }
    Ok(id.trim().to_string())
}
