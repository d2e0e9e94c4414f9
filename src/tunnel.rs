use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Read size for one relay iteration
pub const RELAY_BUF_SIZE: usize = 2048;

/// Relay bytes between an established client/target pair until either
/// side closes.
///
/// Each direction runs as its own task sharing nothing but the stream
/// halves. The first direction to terminate aborts the other, and both
/// tasks are joined before the endpoints are released, so a tunnel can
/// never leave a relay blocked behind a dead peer.
///
/// Returns the byte totals (client-to-target, target-to-client).
pub async fn run(client: TcpStream, target: TcpStream, session: &str) -> (u64, u64) {
    let (client_read, client_write) = client.into_split();
    let (target_read, target_write) = target.into_split();

    let up_count = Arc::new(AtomicU64::new(0));
    let down_count = Arc::new(AtomicU64::new(0));

    let mut upstream = tokio::spawn(pipe(client_read, target_write, up_count.clone()));
    let mut downstream = tokio::spawn(pipe(target_read, client_write, down_count.clone()));

    tokio::select! {
        _ = &mut upstream => {
            downstream.abort();
            let _ = downstream.await;
        }
        _ = &mut downstream => {
            upstream.abort();
            let _ = upstream.await;
        }
    }

    let up = up_count.load(Ordering::Relaxed);
    let down = down_count.load(Ordering::Relaxed);
    debug!("session {}: tunnel closed, {}↑ {}↓ bytes", session, up, down);

    (up, down)
}

/// Copy one direction: read up to [`RELAY_BUF_SIZE`] bytes, forward
/// exactly what was read, repeat.
///
/// A zero-byte read and a read or write error are all the same normal
/// termination signal. The write side is shut down on exit so the peer
/// observes EOF.
async fn pipe<R, W>(mut reader: R, mut writer: W, copied: Arc<AtomicU64>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; RELAY_BUF_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if writer.write_all(&buf[..n]).await.is_err() {
                    break;
                }
                copied.fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }

    let _ = writer.shutdown().await;
}
