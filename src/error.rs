use thiserror::Error;

use crate::backend::BackendError;
use crate::workflow::ListKind;

#[derive(Debug, Error)]
pub enum PickscanError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The server refused a confirmation. Local scan state is untouched so
    /// the operator can retry.
    #[error("Confirmation rejected: {0}")]
    ConfirmationRejected(String),

    #[error("{kind} {list} is being worked by {}", .holder.as_deref().unwrap_or("another session"))]
    LockDenied {
        kind: ListKind,
        list: String,
        holder: Option<String>,
    },
}

/// Rejections raised while building a [`StepOrder`](crate::scan::StepOrder).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepOrderError {
    #[error("step order must name at least one step")]
    Empty,

    #[error("step `{0}` appears more than once")]
    Duplicate(String),

    #[error("unknown step kind `{0}`")]
    UnknownKind(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("list has no items")]
    EmptyList,

    #[error("item index {index} out of range (list has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("item {item_code} cannot be confirmed yet")]
    ConfirmNotAllowed { item_code: String },
}
