use crate::socks::ResponseCode;
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::net::TcpStream;

/// Error type for outbound connection attempts
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connection to {0} timed out after {1:?}")]
    TimedOut(SocketAddrV4, Duration),

    #[error("connection to {0} failed: {1}")]
    Io(SocketAddrV4, #[source] std::io::Error),
}

impl ConnectError {
    /// Reply code reported to the client for this failure.
    ///
    /// Every connect failure (timeout, refused, unreachable) maps to
    /// `RejectedOrFailed`; the finer-grained codes require identd support.
    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::RejectedOrFailed
    }
}

/// Opens outbound connections to requested targets
#[derive(Debug, Clone)]
pub struct TargetConnector {
    timeout: Duration,
}

impl TargetConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Open a TCP connection to `addr`, bounded by the configured timeout.
    ///
    /// Returns the open stream only on success; a failure carries no
    /// handle, so callers cannot touch a dead connection.
    pub async fn connect(&self, addr: SocketAddrV4) -> Result<TcpStream, ConnectError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ConnectError::Io(addr, e)),
            Err(_) => Err(ConnectError::TimedOut(addr, self.timeout)),
        }
    }
}
