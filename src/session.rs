//! One remote agent and the local tools it may call.
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchError, Dispatcher, EventHandler, RunOutcome};
use crate::service::types::{
    Agent, AgentDeletionStatus, CreateAgentRequest, MessageRole, Thread, ThreadMessage,
};
use crate::service::{AgentService, ServiceError};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub model: String,
    pub name: String,
    pub instructions: String,
}

/// Handle to a created agent. The agent lives until [`AgentSession::delete`] is
/// called; dropping the handle leaves it on the service.
pub struct AgentSession {
    service: Arc<dyn AgentService>,
    agent: Agent,
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl AgentSession {
    pub async fn create(
        service: Arc<dyn AgentService>,
        spec: AgentSpec,
        registry: ToolRegistry,
    ) -> Result<Self, ServiceError> {
        let req = CreateAgentRequest {
            model: spec.model,
            name: spec.name,
            instructions: spec.instructions,
            tools: registry.tool_defs(),
        };
        if registry.is_empty() {
            warn!("creating agent without any local tools");
        }
        let agent = service.create_agent(req).await?;
        info!(
            agent_id = %agent.id,
            tools = registry.len(),
            names = ?registry.names().collect::<Vec<_>>(),
            "agent session started"
        );
        Ok(Self {
            service,
            agent,
            registry: Arc::new(registry),
            tool_timeout: Duration::from_secs(60),
        })
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent.id
    }

    pub async fn create_thread(&self) -> Result<Thread, ServiceError> {
        self.service.create_thread().await
    }

    pub async fn post_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage, ServiceError> {
        self.service
            .create_message(thread_id, MessageRole::User, content)
            .await
    }

    /// Start a run on `thread_id` and dispatch its events until it terminates.
    pub async fn run<H: EventHandler>(
        &self,
        thread_id: &str,
        handler: H,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, DispatchError> {
        let mut source = self.service.create_stream(thread_id, &self.agent.id).await?;
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.registry), handler)
            .with_tool_timeout(self.tool_timeout);
        let result = dispatcher.run(source.as_mut(), cancel).await;
        debug!(thread_id, state = ?dispatcher.state(), "dispatcher stopped");
        result
    }

    pub async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ServiceError> {
        self.service.list_messages(thread_id).await
    }

    /// Remove the agent from the service. Threads are left in place.
    pub async fn delete(&self) -> Result<AgentDeletionStatus, ServiceError> {
        let status = self.service.delete_agent(&self.agent.id).await?;
        info!(agent_id = %status.id, deleted = status.deleted, "agent session ended");
        Ok(status)
    }
}
