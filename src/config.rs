use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Command line interface configuration
#[derive(Parser, Debug)]
#[command(
    author, version,
    about = "SOCKS4 CONNECT proxy",
    long_about = "s4p accepts SOCKS4 CONNECT requests and relays bytes \
between each client and its requested target.\n\nOnly the CONNECT command \
is served; BIND requests are answered with a rejection. Identd lookups \
are not performed."
)]
pub struct Cli {
    /// IP address to bind the listener
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_ip: Ipv4Addr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 1337)]
    pub port: u16,

    /// Outbound connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Maximum connections per client IP address
    #[arg(long = "conn-per-ip", default_value_t = 500)]
    pub conn_per_ip: usize,
}

/// Proxy server configuration derived from CLI arguments
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub connect_timeout: Duration,
    pub conn_per_ip: usize,
}

impl ProxyConfig {
    pub fn from_cli(args: Cli) -> Self {
        Self {
            listen_addr: SocketAddr::from((args.listen_ip, args.port)),
            connect_timeout: Duration::from_secs(args.connect_timeout),
            conn_per_ip: args.conn_per_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["s4p"]).expect("defaults should parse");
        let config = ProxyConfig::from_cli(cli);

        assert_eq!(config.listen_addr, "0.0.0.0:1337".parse().unwrap());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.conn_per_ip, 500);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "s4p",
            "--listen-ip",
            "127.0.0.1",
            "-p",
            "1080",
            "--connect-timeout",
            "3",
            "--conn-per-ip",
            "16",
        ])
        .expect("flags should parse");
        let config = ProxyConfig::from_cli(cli);

        assert_eq!(config.listen_addr, "127.0.0.1:1080".parse().unwrap());
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.conn_per_ip, 16);
    }

    #[test]
    fn test_rejects_invalid_listen_ip() {
        assert!(Cli::try_parse_from(["s4p", "--listen-ip", "not-an-ip"]).is_err());
    }
}
