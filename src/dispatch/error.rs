use thiserror::Error;

use crate::dispatch::DispatchState;
use crate::events::RunError;
use crate::service::ServiceError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("run {run_id} failed: {}", .error.as_ref().map(ToString::to_string).unwrap_or_else(|| "no error detail".into()))]
    RunFailed {
        run_id: String,
        error: Option<RunError>,
    },

    #[error("received `{event}` in state {state:?}")]
    ProtocolViolation { state: DispatchState, event: String },

    #[error(transparent)]
    Connection(#[from] ServiceError),

    #[error("run abandoned by caller")]
    Cancelled,
}
