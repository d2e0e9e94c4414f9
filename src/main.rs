mod config;
mod connection;
mod connector;
mod session;
mod socks;
mod tunnel;

use crate::config::{Cli, ProxyConfig};
use crate::connection::{get_ip_tracker, ConnectionGuard, ACTIVE_SESSIONS};
use crate::connector::TargetConnector;
use crate::session::handle_client;
use clap::Parser;
use color_eyre::eyre::Result;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s4p=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    color_eyre::install()?;

    let args = Cli::parse();
    let config = Arc::new(ProxyConfig::from_cli(args));

    let connector = Arc::new(TargetConnector::new(config.connect_timeout));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("SOCKS4 proxy listening on {}", config.listen_addr);

    // Periodic status logging; only speaks up when something changed.
    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
        let mut last_active = 0;
        loop {
            interval.tick().await;
            let active = ACTIVE_SESSIONS.load(Ordering::Relaxed);
            if active > 0 && active != last_active {
                info!("status: {} active sessions", active);
            }
            last_active = active;
        }
    });

    // Graceful shutdown signal handling
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");

        info!("shutdown signal received");

        let active = ACTIVE_SESSIONS.load(Ordering::Relaxed);
        if active > 0 {
            info!("waiting for {} sessions to close...", active);

            for i in 1..=30 {
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                let remaining = ACTIVE_SESSIONS.load(Ordering::Relaxed);

                if remaining == 0 {
                    info!("all sessions closed");
                    break;
                }

                if i % 5 == 0 {
                    info!("still waiting for {} sessions... ({}/30s)", remaining, i);
                }
            }

            let final_count = ACTIVE_SESSIONS.load(Ordering::Relaxed);
            if final_count > 0 {
                warn!("forced shutdown with {} sessions still active", final_count);
            }
        }
    };

    // Main server loop
    let server = async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let ip_tracker = get_ip_tracker();
                    let client_ip = peer_addr.ip();

                    if ip_tracker
                        .try_increment(client_ip, config.conn_per_ip)
                        .await
                        .is_none()
                    {
                        warn!(
                            "connection limit exceeded for {}: {} connections",
                            client_ip,
                            ip_tracker.get_count(client_ip).await
                        );
                        drop(stream);
                        continue;
                    }

                    let guard = match ConnectionGuard::try_new() {
                        Some(guard) => guard,
                        None => {
                            warn!(
                                "session limit reached ({} active), dropping {}",
                                ConnectionGuard::active_count(),
                                peer_addr
                            );
                            ip_tracker.decrement(client_ip).await;
                            drop(stream);
                            continue;
                        }
                    };

                    let connector = connector.clone();
                    tokio::task::spawn(async move {
                        handle_client(stream, peer_addr, connector).await;

                        // Release per-IP and global slots when the session ends.
                        ip_tracker.decrement(client_ip).await;
                        drop(guard);
                    });
                }
                Err(e) => {
                    warn!("accept error: {} (continuing)", e);
                    continue;
                }
            }
        }
    };

    // Run until the shutdown signal is received
    tokio::select! {
        _ = server => {
            warn!("server loop terminated");
        }
        _ = shutdown => {
            info!("server shutdown complete");
        }
    }

    Ok(())
}
