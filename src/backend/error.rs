//! Errors raised while talking to the warehouse server.
//!
//! Rejections the server reports in-band (`{"success": false}`) are not
//! errors at this layer; they come back as regular replies.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP status outside 2xx, with the response body.
    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("malformed response from {method}: {reason}")]
    Malformed { method: String, reason: String },

    #[error("unknown list: {0}")]
    UnknownList(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = BackendError::Server {
            status: 403,
            message: "Not permitted".into(),
        };
        assert_eq!(err.to_string(), "server error (status 403): Not permitted");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BackendError>();
    }
}
