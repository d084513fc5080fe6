//! Byte transports for the RPC client.
//!
//! A transport carries whole JSON-RPC messages; delimiting is its job, not
//! the client's. The stdio implementation frames one message per newline
//! over a managed child process.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};

/// How long `close` waits for the child before killing it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// An abstract message pipe: send one payload, receive one payload.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one complete JSON-RPC message.
    async fn send(&self, payload: &str) -> Result<()>;

    /// Block until the next complete message arrives. Returns
    /// `RpcError::Eof` on clean end-of-stream.
    async fn receive(&self) -> Result<String>;

    /// Tear the pipe down. Idempotent; later sends and receives return
    /// `RpcError::Closed`.
    async fn close(&self) -> Result<()>;
}

/// Newline-delimited JSON over a child process's stdin/stdout.
///
/// stderr is drained by a background task into the log so the child can
/// never block on a full pipe.
pub struct StdioTransport {
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<BufReader<ChildStdout>>>,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Spawn `program args...` with piped standard streams.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdin",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdout",
            ))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let program = program.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(program = %program, "child stderr: {line}");
                }
            });
        }

        Ok(Self {
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(Some(BufReader::new(stdout))),
            child: Mutex::new(Some(child)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, payload: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Closed);
        }
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(RpcError::Closed)?;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<String> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Closed);
        }
        let mut guard = self.stdout.lock().await;
        let stdout = guard.as_mut().ok_or(RpcError::Closed)?;

        let mut line = String::new();
        let bytes_read = stdout.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(RpcError::Eof);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(RpcError::EmptyFrame);
        }
        Ok(trimmed.to_string())
    }

    async fn close(&self) -> Result<()> {
        // Latch: only the first close tears anything down.
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Close stdin so the child sees EOF, then drop our readers.
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!(error = %e, "error closing child stdin");
            }
        }
        self.stdout.lock().await.take();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "child process exited");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "error waiting for child process");
                Err(RpcError::Io(e))
            }
            Err(_) => {
                warn!("child process did not exit within timeout, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill child process");
                }
                Err(RpcError::CloseTimeout {
                    timeout_secs: CLOSE_TIMEOUT.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cat_echoes_sent_lines() {
        let transport = StdioTransport::spawn("cat", &[]).expect("spawn cat");
        transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .await
            .expect("send");
        let line = transport.receive().await.expect("receive");
        assert_eq!(line, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        transport.close().await.expect("close");
    }

    #[tokio::test]
    async fn empty_lines_are_errors_not_messages() {
        let transport = StdioTransport::spawn(
            "sh",
            &["-c".to_string(), "printf '\\nhello\\n'".to_string()],
        )
        .expect("spawn sh");

        assert!(matches!(
            transport.receive().await,
            Err(RpcError::EmptyFrame)
        ));
        assert_eq!(transport.receive().await.expect("receive"), "hello");
        let _ = transport.close().await;
    }

    #[tokio::test]
    async fn child_exit_is_clean_eof() {
        let transport = StdioTransport::spawn("true", &[]).expect("spawn true");
        assert!(matches!(transport.receive().await, Err(RpcError::Eof)));
        transport.close().await.expect("close");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_poisons_io() {
        let transport = StdioTransport::spawn("cat", &[]).expect("spawn cat");
        transport.close().await.expect("first close");
        transport.close().await.expect("second close");

        assert!(matches!(transport.send("{}").await, Err(RpcError::Closed)));
        assert!(matches!(transport.receive().await, Err(RpcError::Closed)));
    }
}
