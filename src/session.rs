use crate::connector::TargetConnector;
use crate::socks::{ConnectRequest, ConnectResponse, ParseError, MAX_REQUEST_LEN};
use crate::tunnel;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Global counter feeding session id generation
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a compact unique session id (timestamp + counter, lowercase hex)
pub fn new_session_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("{:x}{:x}", now.as_nanos() & 0xffffffffffff, counter & 0xffffffff)
}

/// Error type for faults that escape a session's normal handling
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("handshake I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One client connection: handshake, then tunnel.
///
/// A session exclusively owns its client endpoint and, once connected,
/// its target endpoint; nothing is shared with other sessions.
pub struct Session {
    id: String,
    peer: SocketAddr,
    connector: Arc<TargetConnector>,
}

impl Session {
    pub fn new(peer: SocketAddr, connector: Arc<TargetConnector>) -> Self {
        Self {
            id: new_session_id(),
            peer,
            connector,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the session to completion: read and parse the request,
    /// attempt the target connection, reply, and relay on success.
    ///
    /// Handshake rejections (malformed request, unreachable target) are
    /// normal outcomes handled here; only unexpected I/O faults surface
    /// to the caller.
    pub async fn run(&self, mut client: TcpStream) -> Result<(), SessionError> {
        let mut buf = [0u8; MAX_REQUEST_LEN];
        let n = client.read(&mut buf).await?;

        let request = match ConnectRequest::parse(&buf[..n]) {
            Ok(request) => request,
            Err(e @ ParseError::UnsupportedCommand(_)) => {
                // BIND is acknowledged with a rejection before closing.
                debug!("session {} from {}: {}", self.id, self.peer, e);
                client
                    .write_all(&ConnectResponse::rejection().to_bytes())
                    .await?;
                return Ok(());
            }
            Err(e) => {
                // Malformed header: close the client without a response.
                debug!("session {} from {}: dropping client: {}", self.id, self.peer, e);
                return Ok(());
            }
        };

        let target_addr = SocketAddrV4::new(request.addr, request.port);
        debug!(
            "session {}: {:?} {} user_id {:?}",
            self.id,
            request.command,
            target_addr,
            String::from_utf8_lossy(&request.user_id)
        );

        let target = match self.connector.connect(target_addr).await {
            Ok(target) => target,
            Err(e) => {
                info!("session {}: {}", self.id, e);
                let reply = ConnectResponse {
                    code: e.response_code(),
                    port: 0,
                    addr: Ipv4Addr::UNSPECIFIED,
                };
                client.write_all(&reply.to_bytes()).await?;
                return Ok(());
            }
        };

        client
            .write_all(&ConnectResponse::granted().to_bytes())
            .await?;
        info!(
            "session {}: {} -> {} established",
            self.id, self.peer, target_addr
        );

        let (up, down) = tunnel::run(client, target, &self.id).await;
        info!("session {}: closed, {}↑ {}↓ bytes", self.id, up, down);

        Ok(())
    }
}

/// Task boundary for one accepted client.
///
/// Any fault escaping the session is logged and converted into teardown
/// here rather than terminating the task abnormally.
pub async fn handle_client(stream: TcpStream, peer: SocketAddr, connector: Arc<TargetConnector>) {
    let session = Session::new(peer, connector);
    if let Err(e) = session.run(stream).await {
        warn!("session {} from {}: {}", session.id(), peer, e);
    }
}
