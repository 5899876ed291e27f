//! Minimal NATS connection: dial, handshake, one request/reply, drain.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use uuid::Uuid;

use crate::dialer::Dialer;
use crate::error::ProbeError;
use crate::proto::{self, ConnectOptions, ServerInfo, ServerOp};

/// Bound on dial plus handshake, matching the default of common NATS clients.
/// The request timeout configured on the probe only covers the request itself.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// An established client connection to a NATS server.
///
/// The local socket address is resolved once, immediately after the dial
/// succeeds, and kept for the lifetime of the connection; a `Connection`
/// cannot exist without it.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_addr: SocketAddr,
    info: ServerInfo,
    subscriptions: Vec<u64>,
    next_sid: u64,
}

impl Connection {
    /// Dial `addr` through the given dialer and complete the NATS handshake:
    /// read `INFO`, send `CONNECT` and `PING`, wait for `PONG`.
    ///
    /// Servers that require authentication or TLS are refused; the probe
    /// supports neither.
    pub async fn connect(
        addr: &str,
        dialer: &dyn Dialer,
        options: ConnectOptions,
    ) -> Result<Self, ProbeError> {
        match tokio::time::timeout(CONNECT_TIMEOUT, Self::connect_inner(addr, dialer, options))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Transport {
                context: format!("connect to {addr}"),
                source: "connection attempt timed out".to_string(),
            }),
        }
    }

    async fn connect_inner(
        addr: &str,
        dialer: &dyn Dialer,
        options: ConnectOptions,
    ) -> Result<Self, ProbeError> {
        let stream = dialer
            .dial(addr)
            .await
            .map_err(|e| ProbeError::transport(format!("dial {addr}"), e))?;
        let local_addr = stream
            .local_addr()
            .map_err(|e| ProbeError::transport("resolve local address", e))?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let info = match read_op(&mut reader).await? {
            ServerOp::Info(info) => info,
            other => {
                return Err(ProbeError::protocol(format!(
                    "expected INFO from server, got {other:?}"
                )));
            }
        };
        debug!(
            "connected to {} (server {} v{}), local address {}",
            addr, info.server_id, info.version, local_addr
        );

        if info.auth_required {
            return Err(ProbeError::protocol(
                "server requires authentication, which this client does not support",
            ));
        }
        if info.tls_required {
            return Err(ProbeError::protocol(
                "server requires TLS, which this client does not support",
            ));
        }

        let mut conn = Self {
            reader,
            writer: write_half,
            local_addr,
            info,
            subscriptions: Vec::new(),
            next_sid: 1,
        };

        let connect = proto::connect_line(&options)?;
        conn.send(connect.as_bytes(), "send CONNECT").await?;
        conn.send(proto::ping_line().as_bytes(), "send PING").await?;
        conn.flush("send PING").await?;

        // The server may interleave its own PING before our PONG arrives.
        loop {
            match conn.read_next().await? {
                ServerOp::Pong => break,
                ServerOp::Ping => {
                    conn.send(proto::pong_line().as_bytes(), "answer server ping")
                        .await?;
                    conn.flush("answer server ping").await?;
                }
                ServerOp::Ok | ServerOp::Info(_) => {}
                ServerOp::Err { message } => {
                    return Err(ProbeError::protocol(format!("server error: {message}")));
                }
                other => {
                    return Err(ProbeError::protocol(format!(
                        "expected PONG from server, got {other:?}"
                    )));
                }
            }
        }

        Ok(conn)
    }

    /// The local endpoint of the underlying TCP connection.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    /// Publish `payload` on `subject` and block until the single reply to a
    /// freshly subscribed inbox arrives. The caller bounds the whole call
    /// with a timeout; this method waits indefinitely.
    pub async fn request(&mut self, subject: &str, payload: &[u8]) -> Result<Vec<u8>, ProbeError> {
        if payload.len() > self.info.max_payload {
            return Err(ProbeError::protocol(format!(
                "request of {} bytes exceeds server max_payload of {}",
                payload.len(),
                self.info.max_payload
            )));
        }

        let inbox = format!("_INBOX.{}", Uuid::new_v4().simple());
        let sid = self.next_sid;
        self.next_sid += 1;

        self.send(proto::sub_line(&inbox, sid).as_bytes(), "subscribe reply inbox")
            .await?;
        self.subscriptions.push(sid);
        self.send(&proto::pub_bytes(subject, &inbox, payload), "publish request")
            .await?;
        self.flush("publish request").await?;

        loop {
            match self.read_next().await? {
                ServerOp::Msg {
                    sid: msg_sid,
                    payload_len,
                    subject: msg_subject,
                    ..
                } => {
                    let body = self.read_payload(payload_len).await?;
                    if msg_sid == sid {
                        return Ok(body);
                    }
                    warn!("ignoring message on '{msg_subject}' for unknown sid {msg_sid}");
                }
                ServerOp::Ping => {
                    self.send(proto::pong_line().as_bytes(), "answer server ping")
                        .await?;
                    self.flush("answer server ping").await?;
                }
                ServerOp::Err { message } => {
                    return Err(ProbeError::protocol(format!("server error: {message}")));
                }
                ServerOp::Pong | ServerOp::Ok | ServerOp::Info(_) => {}
            }
        }
    }

    /// Unsubscribe everything, flush, and close the write side.
    pub async fn drain(mut self) -> Result<(), ProbeError> {
        for sid in std::mem::take(&mut self.subscriptions) {
            self.send(proto::unsub_line(sid).as_bytes(), "drain subscription")
                .await?;
        }
        self.flush("drain connection").await?;
        self.writer
            .shutdown()
            .await
            .map_err(|e| ProbeError::transport("close connection", e))
    }

    async fn read_next(&mut self) -> Result<ServerOp, ProbeError> {
        read_op(&mut self.reader).await
    }

    async fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, ProbeError> {
        if len > self.info.max_payload {
            return Err(ProbeError::protocol(format!(
                "server announced a {len} byte message, larger than its own max_payload"
            )));
        }
        // Payload is followed by CRLF on the wire.
        let mut buf = vec![0u8; len + 2];
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| ProbeError::transport("read message payload", e))?;
        buf.truncate(len);
        Ok(buf)
    }

    async fn send(&mut self, bytes: &[u8], context: &str) -> Result<(), ProbeError> {
        trace!("-> {}", String::from_utf8_lossy(bytes).trim_end());
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| ProbeError::transport(context, e))
    }

    async fn flush(&mut self, context: &str) -> Result<(), ProbeError> {
        self.writer
            .flush()
            .await
            .map_err(|e| ProbeError::transport(context, e))
    }
}

async fn read_op(reader: &mut BufReader<OwnedReadHalf>) -> Result<ServerOp, ProbeError> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| ProbeError::transport("read from server", e))?;
    if read == 0 {
        return Err(ProbeError::Transport {
            context: "read from server".to_string(),
            source: "connection closed by server".to_string(),
        });
    }
    trace!("<- {}", line.trim_end());
    proto::parse_server_op(&line)
}
