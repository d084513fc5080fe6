//! JSON-RPC 2.0 client over an abstract line-framed transport.
//!
//! The client multiplexes concurrent in-flight calls through one transport:
//! a background listener routes each incoming response to the pending call
//! with the matching id, while sends are serialized so frames never
//! interleave. The bundled transport speaks newline-delimited JSON over a
//! child process's standard streams.

mod client;
mod error;
mod protocol;
mod transport;

pub use client::RpcClient;
pub use error::{Result, RpcError};
pub use protocol::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
pub use transport::{StdioTransport, Transport};
