use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::events::StreamEvent;
use crate::service::run_stream::{EventSegment, RunStream};
use crate::service::sse::{SseDecoder, decode_frame};
use crate::service::types::{
    Agent, AgentDeletionStatus, CreateAgentRequest, CreateMessageRequest, CreateRunRequest,
    MessageList, MessageRole, SubmitToolOutputsRequest, Thread, ThreadMessage, ToolOutput,
};
use crate::service::{AgentService, EventSource, ServiceError};

/// HTTP client for the agents REST API. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct AgentsClient {
    pub endpoint: String,
    api_token: String,
    pub(crate) inner: reqwest::Client,
    pub cfg: ServiceConfig,
}

impl AgentsClient {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Result<Self, ServiceError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ServiceError::InvalidEndpoint(endpoint));
        }
        let inner = reqwest::Client::builder().build()?;
        Ok(Self {
            endpoint,
            api_token: api_token.into(),
            inner,
            cfg: ServiceConfig::default(),
        })
    }

    pub fn with_service_config(mut self, cfg: ServiceConfig) -> Self {
        // Streams can be long lived: bound connect and idle reads, and apply the
        // overall request timeout only to non-streaming calls.
        let builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .read_timeout(Duration::from_millis(cfg.read_idle_timeout_ms));
        match builder.build() {
            Ok(c) => self.inner = c,
            Err(e) => warn!(err = %e, "keeping default http client"),
        }
        self.cfg = cfg;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .request(method, self.url(path))
            .bearer_auth(&self.api_token)
            .query(&[("api-version", self.cfg.api_version.as_str())])
    }

    pub(crate) fn backoff_delay(&self, attempt: usize, retry_after_secs: Option<u64>) -> Duration {
        if self.cfg.respect_retry_after
            && let Some(secs) = retry_after_secs
        {
            let cap = Duration::from_millis(self.cfg.max_retry_after_ms);
            return Duration::from_secs(secs).min(cap);
        }
        let base = self.cfg.retry_base_ms;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1).min(16) as u32));
        let jitter = self.cfg.retry_jitter_ms as i64;
        let half = jitter / 2;
        let rnd = fastrand::i64(-half..=half).max(0) as u64;
        Duration::from_millis(exp.saturating_add(rnd))
    }

    /// Send a request, retrying only while the response has not been established.
    /// `idempotent` widens the retry set to timeouts and 5xx responses.
    async fn send<F>(&self, what: &str, idempotent: bool, build: F) -> Result<Response, ServiceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.cfg.max_retries.saturating_add(1);
        let mut attempt = 1usize;
        loop {
            let (err, retry_after) = match build().send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok());
                    let body = resp.text().await.unwrap_or_default();
                    (ServiceError::from_status(status, body), retry_after)
                }
                Err(e) => (ServiceError::from(e), None),
            };
            if attempt < max_attempts && err.is_retryable(idempotent) {
                let wait = self.backoff_delay(attempt, retry_after);
                warn!(what, attempt, err = %err, wait_ms = %wait.as_millis(), "retrying agent service request");
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }
            error!(what, attempt, err = %err, "agent service request failed");
            return Err(err);
        }
    }

    async fn send_json<B, T>(&self, what: &str, method: Method, path: &str, body: Option<&B>) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let timeout = Duration::from_millis(self.cfg.request_timeout_ms);
        let idempotent = method != Method::POST;
        let resp = self
            .send(what, idempotent, || {
                let req = self.request(method.clone(), path).timeout(timeout);
                match body {
                    Some(b) => req.json(b),
                    None => req,
                }
            })
            .await?;
        let text = resp.text().await?;
        debug!(what, response_body = %text, "agent service response");
        serde_json::from_str(&text).map_err(|source| ServiceError::Decode {
            event: what.to_string(),
            source,
        })
    }

    async fn open_stream<B>(&self, what: &str, path: &str, body: &B) -> Result<EventSegment, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
    {
        if let Ok(payload) = serde_json::to_string(body) {
            debug!(payload = %payload, path, "opening event stream");
        }
        let resp = self
            .send(what, false, || self.request(Method::POST, path).json(body))
            .await?;
        Ok(event_segment(resp))
    }

    pub(crate) async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<EventSegment, ServiceError> {
        let req = SubmitToolOutputsRequest {
            tool_outputs,
            stream: true,
        };
        self.open_stream(
            "submit_tool_outputs",
            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &req,
        )
        .await
    }
}

fn event_segment(resp: Response) -> EventSegment {
    let mut bytes = resp.bytes_stream();
    let stream = async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(ServiceError::from)?;
            for frame in decoder.push(&chunk) {
                debug!(event = %frame.event, "sse frame");
                let events: Vec<StreamEvent> = decode_frame(&frame)?;
                yield events;
            }
        }
        if let Some(frame) = decoder.finish() {
            let events: Vec<StreamEvent> = decode_frame(&frame)?;
            yield events;
        }
    };
    Box::pin(stream)
}

#[async_trait]
impl AgentService for AgentsClient {
    async fn create_agent(&self, req: CreateAgentRequest) -> Result<Agent, ServiceError> {
        let agent: Agent = self
            .send_json("create_agent", Method::POST, "assistants", Some(&req))
            .await?;
        info!(agent_id = %agent.id, "created agent");
        Ok(agent)
    }

    async fn create_thread(&self) -> Result<Thread, ServiceError> {
        let body = serde_json::json!({});
        self.send_json("create_thread", Method::POST, "threads", Some(&body))
            .await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, ServiceError> {
        let req = CreateMessageRequest {
            role,
            content: content.to_string(),
        };
        self.send_json(
            "create_message",
            Method::POST,
            &format!("threads/{thread_id}/messages"),
            Some(&req),
        )
        .await
    }

    async fn create_stream(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Box<dyn EventSource>, ServiceError> {
        let req = CreateRunRequest {
            assistant_id: agent_id.to_string(),
            stream: true,
        };
        let segment = self
            .open_stream("create_run", &format!("threads/{thread_id}/runs"), &req)
            .await?;
        Ok(Box::new(RunStream::new(
            self.clone(),
            thread_id.to_string(),
            segment,
        )))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<AgentDeletionStatus, ServiceError> {
        self.send_json::<(), _>(
            "delete_agent",
            Method::DELETE,
            &format!("assistants/{agent_id}"),
            None,
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ServiceError> {
        let mut out = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut path = format!("threads/{thread_id}/messages?order=asc");
            if let Some(cursor) = &after {
                path.push_str(&format!("&after={cursor}"));
            }
            let page: MessageList = self
                .send_json::<(), _>("list_messages", Method::GET, &path, None)
                .await?;
            let has_more = page.has_more;
            after = page.data.last().map(|m| m.id.clone());
            out.extend(page.data);
            if !has_more || after.is_none() {
                break;
            }
        }
        Ok(out)
    }
}
