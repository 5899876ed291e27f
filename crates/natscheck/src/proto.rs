//! Client-side subset of the NATS wire protocol.
//!
//! Only the operations a single request/reply round-trip needs are covered:
//! `INFO`, `CONNECT`, `PING`/`PONG`, `SUB`/`UNSUB`, `PUB` and `MSG`. All
//! protocol lines are CRLF-terminated; payloads follow `PUB`/`MSG` lines
//! verbatim and carry their own trailing CRLF.

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Connection-level metadata the server advertises in its `INFO` operation.
///
/// Fields the probe never looks at are still parsed so a debug log of the
/// handshake is meaningful; everything is defaulted because servers vary in
/// what they send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub server_id: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub proto: i32,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub tls_required: bool,
}

fn default_max_payload() -> usize {
    1024 * 1024
}

/// Options sent in the client's `CONNECT` operation.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectOptions {
    pub verbose: bool,
    pub pedantic: bool,
    pub tls_required: bool,
    /// Client name shown in server monitoring; carries the user-agent string.
    pub name: String,
    pub lang: String,
    pub version: String,
    pub protocol: u8,
    pub echo: bool,
}

impl ConnectOptions {
    pub fn new(name: &str) -> Self {
        Self {
            verbose: false,
            pedantic: false,
            tls_required: false,
            name: name.to_string(),
            lang: "rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol: 0,
            echo: true,
        }
    }
}

/// A single operation received from the server.
///
/// For `Msg` only the header line is parsed here; the payload bytes that
/// follow are read separately by the connection, which knows the length.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerOp {
    Info(ServerInfo),
    Msg {
        subject: String,
        sid: u64,
        reply_to: Option<String>,
        payload_len: usize,
    },
    Ping,
    Pong,
    Ok,
    Err { message: String },
}

/// Parse one server protocol line. Operation names are matched
/// case-insensitively, as the protocol allows.
pub fn parse_server_op(line: &str) -> Result<ServerOp, ProbeError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (op, args) = match line.find(char::is_whitespace) {
        Some(at) => (&line[..at], line[at..].trim()),
        None => (line, ""),
    };

    match op.to_ascii_uppercase().as_str() {
        "INFO" => serde_json::from_str(args)
            .map(ServerOp::Info)
            .map_err(|e| ProbeError::protocol(format!("malformed INFO payload: {e}"))),
        "MSG" => parse_msg_args(args),
        "PING" => Ok(ServerOp::Ping),
        "PONG" => Ok(ServerOp::Pong),
        "+OK" => Ok(ServerOp::Ok),
        "-ERR" => Ok(ServerOp::Err {
            message: args.trim_matches('\'').to_string(),
        }),
        _ => Err(ProbeError::protocol(format!(
            "unrecognized server operation: {line}"
        ))),
    }
}

fn parse_msg_args(args: &str) -> Result<ServerOp, ProbeError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (subject, sid, reply_to, len) = match parts.as_slice() {
        [subject, sid, len] => (*subject, *sid, None, *len),
        [subject, sid, reply, len] => (*subject, *sid, Some((*reply).to_string()), *len),
        _ => {
            return Err(ProbeError::protocol(format!(
                "malformed MSG arguments: {args}"
            )));
        }
    };

    let sid = sid
        .parse::<u64>()
        .map_err(|_| ProbeError::protocol(format!("malformed MSG sid: {sid}")))?;
    let payload_len = len
        .parse::<usize>()
        .map_err(|_| ProbeError::protocol(format!("malformed MSG payload length: {len}")))?;

    Ok(ServerOp::Msg {
        subject: subject.to_string(),
        sid,
        reply_to,
        payload_len,
    })
}

pub fn connect_line(options: &ConnectOptions) -> Result<String, ProbeError> {
    let json = serde_json::to_string(options)
        .map_err(|e| ProbeError::protocol(format!("serialize CONNECT options: {e}")))?;
    Ok(format!("CONNECT {json}\r\n"))
}

pub fn ping_line() -> &'static str {
    "PING\r\n"
}

pub fn pong_line() -> &'static str {
    "PONG\r\n"
}

pub fn sub_line(subject: &str, sid: u64) -> String {
    format!("SUB {subject} {sid}\r\n")
}

pub fn unsub_line(sid: u64) -> String {
    format!("UNSUB {sid}\r\n")
}

/// Encode a `PUB` operation with its payload and trailing CRLF.
pub fn pub_bytes(subject: &str, reply_to: &str, payload: &[u8]) -> Vec<u8> {
    let header = format!("PUB {subject} {reply_to} {}\r\n", payload.len());
    let mut buf = Vec::with_capacity(header.len() + payload.len() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(b"\r\n");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info() {
        let line = r#"INFO {"server_id":"abc","version":"2.10.0","max_payload":2048,"auth_required":true}"#;
        match parse_server_op(line).unwrap() {
            ServerOp::Info(info) => {
                assert_eq!(info.server_id, "abc");
                assert_eq!(info.version, "2.10.0");
                assert_eq!(info.max_payload, 2048);
                assert!(info.auth_required);
                assert!(!info.tls_required);
            }
            other => panic!("expected INFO, got {other:?}"),
        }
    }

    #[test]
    fn test_info_defaults_max_payload() {
        match parse_server_op("INFO {}").unwrap() {
            ServerOp::Info(info) => assert_eq!(info.max_payload, 1024 * 1024),
            other => panic!("expected INFO, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_msg_without_reply() {
        let op = parse_server_op("MSG _INBOX.abc 1 2\r\n").unwrap();
        assert_eq!(
            op,
            ServerOp::Msg {
                subject: "_INBOX.abc".to_string(),
                sid: 1,
                reply_to: None,
                payload_len: 2,
            }
        );
    }

    #[test]
    fn test_parse_msg_with_reply() {
        let op = parse_server_op("MSG health.check 7 _INBOX.xyz 11").unwrap();
        assert_eq!(
            op,
            ServerOp::Msg {
                subject: "health.check".to_string(),
                sid: 7,
                reply_to: Some("_INBOX.xyz".to_string()),
                payload_len: 11,
            }
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_server_op("ping\r\n").unwrap(), ServerOp::Ping);
        assert_eq!(parse_server_op("Pong").unwrap(), ServerOp::Pong);
    }

    #[test]
    fn test_parse_err_strips_quotes() {
        let op = parse_server_op("-ERR 'Unknown Protocol Operation'").unwrap();
        assert_eq!(
            op,
            ServerOp::Err {
                message: "Unknown Protocol Operation".to_string()
            }
        );
    }

    #[test]
    fn test_unrecognized_operation_is_a_protocol_error() {
        let err = parse_server_op("BOGUS stuff").unwrap_err();
        assert!(matches!(err, ProbeError::Protocol { .. }));
    }

    #[test]
    fn test_malformed_msg_length_is_a_protocol_error() {
        let err = parse_server_op("MSG a 1 nope").unwrap_err();
        assert!(matches!(err, ProbeError::Protocol { .. }));
    }

    #[test]
    fn test_pub_encoding() {
        let buf = pub_bytes("health.check", "_INBOX.abc", b"{}");
        assert_eq!(buf, b"PUB health.check _INBOX.abc 2\r\n{}\r\n");
    }

    #[test]
    fn test_connect_line_carries_the_client_name() {
        let line = connect_line(&ConnectOptions::new("NATS Health Check")).unwrap();
        assert!(line.starts_with("CONNECT {"));
        assert!(line.ends_with("\r\n"));
        assert!(line.contains(r#""name":"NATS Health Check""#));
        assert!(line.contains(r#""verbose":false"#));
    }

    #[test]
    fn test_sub_and_unsub_lines() {
        assert_eq!(sub_line("_INBOX.abc", 1), "SUB _INBOX.abc 1\r\n");
        assert_eq!(unsub_line(1), "UNSUB 1\r\n");
    }
}
