use std::net::Ipv4Addr;

/// SOCKS protocol version accepted in requests
pub const SOCKS_VERSION: u8 = 4;

/// Reply version byte, always 0 in SOCKS4 responses
pub const REPLY_VERSION: u8 = 0;

/// Maximum bytes read for a handshake request
pub const MAX_REQUEST_LEN: usize = 1024;

/// Length of an encoded SOCKS4 reply
pub const REPLY_LEN: usize = 8;

/// Error type for SOCKS4 request parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("request too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported SOCKS version {0}")]
    BadVersion(u8),

    #[error("unsupported command {0}")]
    UnsupportedCommand(u8),

    #[error("unknown command byte {0}")]
    UnknownCommand(u8),

    #[error("unknown response code {0}")]
    UnknownResponseCode(u8),
}

/// SOCKS4 command set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Open an outbound connection on the client's behalf
    Connect = 1,
    /// Listen for an inbound connection on the client's behalf (refused)
    Bind = 2,
}

impl Command {
    pub fn from_byte(b: u8) -> Result<Self, ParseError> {
        match b {
            1 => Ok(Command::Connect),
            2 => Ok(Command::Bind),
            other => Err(ParseError::UnknownCommand(other)),
        }
    }
}

/// SOCKS4 reply codes, shared by the encoder and the target connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// Request granted
    Granted = 90,
    /// Request rejected or failed
    RejectedOrFailed = 91,
    /// Client identd unreachable (never sent, identd is out of scope)
    NoClientIdentd = 92,
    /// Identd reported a different user id (never sent)
    IdentdMismatch = 93,
}

impl ResponseCode {
    #[allow(dead_code)]
    pub fn from_byte(b: u8) -> Result<Self, ParseError> {
        match b {
            90 => Ok(ResponseCode::Granted),
            91 => Ok(ResponseCode::RejectedOrFailed),
            92 => Ok(ResponseCode::NoClientIdentd),
            93 => Ok(ResponseCode::IdentdMismatch),
            other => Err(ParseError::UnknownResponseCode(other)),
        }
    }
}

/// A parsed SOCKS4 CONNECT request
///
/// The request must arrive complete in a single read; fragmented delivery
/// is treated as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub command: Command,
    pub port: u16,
    pub addr: Ipv4Addr,
    /// Trailing user-id bytes up to the NUL terminator, kept for logging only
    pub user_id: Vec<u8>,
}

impl ConnectRequest {
    /// Parse a raw request buffer obtained from a single read.
    ///
    /// Byte 0 must be version 4 exactly, byte 1 a known command. BIND is
    /// recognized but refused by the session layer; this parser reports it
    /// as `UnsupportedCommand` so the caller can answer with a rejection
    /// instead of an abrupt close.
    pub fn parse(buf: &[u8]) -> Result<ConnectRequest, ParseError> {
        if buf.len() < 8 {
            return Err(ParseError::TooShort(buf.len()));
        }

        if buf[0] != SOCKS_VERSION {
            return Err(ParseError::BadVersion(buf[0]));
        }

        let command = Command::from_byte(buf[1])?;
        if command != Command::Connect {
            return Err(ParseError::UnsupportedCommand(buf[1]));
        }

        let port = u16::from_be_bytes([buf[2], buf[3]]);
        let addr = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);

        // User id runs from byte 8 to the NUL terminator; both the id and
        // its terminator are optional as far as this proxy is concerned.
        let user_id = buf[8..]
            .iter()
            .take_while(|&&b| b != 0)
            .copied()
            .collect();

        Ok(ConnectRequest {
            command,
            port,
            addr,
            user_id,
        })
    }
}

/// A SOCKS4 reply, always encoded as exactly 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub code: ResponseCode,
    pub port: u16,
    pub addr: Ipv4Addr,
}

impl ConnectResponse {
    /// Canonical granted CONNECT reply (zero port and address)
    pub fn granted() -> Self {
        Self {
            code: ResponseCode::Granted,
            port: 0,
            addr: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Canonical rejection CONNECT reply (zero port and address)
    pub fn rejection() -> Self {
        Self {
            code: ResponseCode::RejectedOrFailed,
            port: 0,
            addr: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Encode to the fixed 8-byte wire form:
    /// version 0, code, port (big-endian), IPv4 octets.
    pub fn to_bytes(&self) -> [u8; REPLY_LEN] {
        let port = self.port.to_be_bytes();
        let ip = self.addr.octets();
        [
            REPLY_VERSION,
            self.code as u8,
            port[0],
            port[1],
            ip[0],
            ip[1],
            ip[2],
            ip[3],
        ]
    }

    /// Decode an 8-byte reply. Used by tests and SOCKS4 client code.
    #[allow(dead_code)]
    pub fn from_bytes(buf: &[u8; REPLY_LEN]) -> Result<ConnectResponse, ParseError> {
        if buf[0] != REPLY_VERSION {
            return Err(ParseError::BadVersion(buf[0]));
        }
        let code = ResponseCode::from_byte(buf[1])?;
        let port = u16::from_be_bytes([buf[2], buf[3]]);
        let addr = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);
        Ok(ConnectResponse { code, port, addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect_request() {
        // 04 01 00 50 7F 00 00 01 00 -> CONNECT 127.0.0.1:80, empty user id
        let buf = [0x04, 0x01, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01, 0x00];
        let req = ConnectRequest::parse(&buf).expect("valid request");

        assert_eq!(req.command, Command::Connect);
        assert_eq!(req.port, 80);
        assert_eq!(req.addr, Ipv4Addr::new(127, 0, 0, 1));
        assert!(req.user_id.is_empty());
    }

    #[test]
    fn test_parse_connect_request_with_user_id() {
        let mut buf = vec![0x04, 0x01, 0x1f, 0x90, 0x0a, 0x00, 0x00, 0x02];
        buf.extend_from_slice(b"fred\x00");

        let req = ConnectRequest::parse(&buf).expect("valid request");
        assert_eq!(req.port, 8080);
        assert_eq!(req.addr, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(req.user_id, b"fred");
    }

    #[test]
    fn test_parse_request_without_terminator() {
        // The terminator is not validated; a missing NUL still parses.
        let buf = [0x04, 0x01, 0x00, 0x16, 0xc0, 0xa8, 0x01, 0x01];
        let req = ConnectRequest::parse(&buf).expect("valid request");
        assert_eq!(req.port, 22);
        assert_eq!(req.addr, Ipv4Addr::new(192, 168, 1, 1));
        assert!(req.user_id.is_empty());
    }

    #[test]
    fn test_parse_rejects_short_buffer() {
        // A request split across reads shows up here as a short buffer.
        let buf = [0x04, 0x01, 0x00];
        assert!(matches!(
            ConnectRequest::parse(&buf),
            Err(ParseError::TooShort(3))
        ));
        assert!(matches!(
            ConnectRequest::parse(&[]),
            Err(ParseError::TooShort(0))
        ));
    }

    #[test]
    fn test_parse_rejects_socks5() {
        // Version 5 is enforced as an error, no SOCKS5 leniency.
        let buf = [0x05, 0x01, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01, 0x00];
        assert!(matches!(
            ConnectRequest::parse(&buf),
            Err(ParseError::BadVersion(5))
        ));
    }

    #[test]
    fn test_parse_rejects_bind() {
        let buf = [0x04, 0x02, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01, 0x00];
        assert!(matches!(
            ConnectRequest::parse(&buf),
            Err(ParseError::UnsupportedCommand(2))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        let buf = [0x04, 0x07, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01, 0x00];
        assert!(matches!(
            ConnectRequest::parse(&buf),
            Err(ParseError::UnknownCommand(7))
        ));
    }

    #[test]
    fn test_granted_reply_wire_format() {
        let bytes = ConnectResponse::granted().to_bytes();
        assert_eq!(bytes, [0x00, 0x5a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_rejection_reply_wire_format() {
        let bytes = ConnectResponse::rejection().to_bytes();
        assert_eq!(bytes, [0x00, 0x5b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_reply_round_trip() {
        let codes = [
            ResponseCode::Granted,
            ResponseCode::RejectedOrFailed,
            ResponseCode::NoClientIdentd,
            ResponseCode::IdentdMismatch,
        ];

        for code in codes {
            let resp = ConnectResponse {
                code,
                port: 4242,
                addr: Ipv4Addr::new(192, 0, 2, 17),
            };
            let decoded = ConnectResponse::from_bytes(&resp.to_bytes()).expect("decodes");
            assert_eq!(decoded, resp);
        }
    }

    #[test]
    fn test_reply_decode_rejects_bad_version() {
        let buf = [0x04, 0x5a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            ConnectResponse::from_bytes(&buf),
            Err(ParseError::BadVersion(4))
        ));
    }

    #[test]
    fn test_reply_decode_rejects_unknown_code() {
        let buf = [0x00, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            ConnectResponse::from_bytes(&buf),
            Err(ParseError::UnknownResponseCode(0x42))
        ));
    }
}
