//! Boundary to the remote agent service.
mod client;
mod connection;
mod error;
mod run_stream;
pub mod sse;
pub mod types;

use async_trait::async_trait;

use crate::events::{StreamEvent, ToolOutcome};
use types::{Agent, AgentDeletionStatus, CreateAgentRequest, MessageRole, Thread, ThreadMessage};

pub use client::AgentsClient;
pub use connection::ProjectConnection;
pub use error::ServiceError;

/// Ordered events of one run plus the back-channel for tool results.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the sequence has ended.
    async fn next_event(&mut self) -> Option<Result<StreamEvent, ServiceError>>;

    async fn submit_tool_result(
        &mut self,
        call_id: &str,
        outcome: &ToolOutcome,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait AgentService: Send + Sync {
    async fn create_agent(&self, req: CreateAgentRequest) -> Result<Agent, ServiceError>;

    async fn create_thread(&self) -> Result<Thread, ServiceError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, ServiceError>;

    async fn create_stream(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Box<dyn EventSource>, ServiceError>;

    async fn delete_agent(&self, agent_id: &str) -> Result<AgentDeletionStatus, ServiceError>;

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ServiceError>;
}
