use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("authentication failed ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("agent service error: {status} - {body}")]
    Http { status: u16, body: String },

    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("failed to decode `{event}` payload: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event stream closed before the run terminated")]
    StreamClosed,

    #[error("no pending tool call with id {0}")]
    UnexpectedToolOutput(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ServiceError {
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            ServiceError::Unauthorized {
                status: status.as_u16(),
                body,
            }
        } else {
            ServiceError::Http {
                status: status.as_u16(),
                body,
            }
        }
    }

    /// Whether the request may be sent again. A non-idempotent request is only
    /// retried when the service cannot have acted on it: the connection was never
    /// made, or the request was rejected with 429.
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            ServiceError::Connection(e) => e.is_connect() || (idempotent && e.is_timeout()),
            ServiceError::Http { status, .. } => {
                *status == 429 || (idempotent && *status >= 500)
            }
            _ => false,
        }
    }
}
