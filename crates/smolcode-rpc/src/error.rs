use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Errors that can occur in the RPC client or its transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The transport or client has been closed; all future operations fail
    /// fast with this error.
    #[error("rpc connection closed")]
    Closed,

    /// The peer closed its end of the stream cleanly.
    #[error("end of stream")]
    Eof,

    /// The transport produced an empty frame, which is not a valid message.
    #[error("empty frame received")]
    EmptyFrame,

    /// The caller cancelled a pending call.
    #[error("call cancelled")]
    Cancelled,

    /// The child process did not exit within the close timeout and was
    /// killed.
    #[error("process did not exit within {timeout_secs}s and was killed")]
    CloseTimeout { timeout_secs: u64 },

    /// The server answered with a JSON-RPC error object.
    #[error("{0}")]
    Remote(JsonRpcError),

    /// An I/O operation on the transport failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
