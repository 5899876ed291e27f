//! Drives the end-to-end health check.

use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::client::Connection;
use crate::dialer::Dialer;
use crate::error::ProbeError;
use crate::proto::ConnectOptions;

/// The only reply body that counts as a healthy responder.
pub const HEALTHY_REPLY: &str = "ok";

/// Request payload sent to the remote responder.
///
/// `client_ip` is the local endpoint of the connection the probe opened, a
/// diagnostic attribute for the remote side; `user_agent` identifies the
/// probing client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRequest {
    pub client_ip: String,
    pub user_agent: String,
}

/// Configuration for a single probe run.
#[derive(Debug, Clone)]
pub struct Probe {
    pub host: String,
    pub port: u16,
    pub subject: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Probe {
    /// The nats:// URL of the target server.
    pub fn server_url(&self) -> String {
        format!("nats://{}:{}", self.host, self.port)
    }

    /// Run the check end to end: connect, send the payload, wait for the
    /// reply, compare it to [`HEALTHY_REPLY`].
    ///
    /// Exactly one attempt is made. The timeout bounds the request only; the
    /// connection itself has a fixed dial/handshake bound. The connection is
    /// drained whether or not the request succeeded, with a request error
    /// taking precedence over a drain error.
    pub async fn run(&self, dialer: &dyn Dialer) -> Result<String, ProbeError> {
        if self.subject.is_empty() {
            return Err(ProbeError::InvalidSubject);
        }

        info!("checking '{}' via {}", self.subject, self.server_url());
        let addr = format!("{}:{}", self.host, self.port);
        let mut conn =
            Connection::connect(&addr, dialer, ConnectOptions::new(&self.user_agent)).await?;

        // Built only after connect, from the address the dial captured.
        let request = ProbeRequest {
            client_ip: conn.local_addr().ip().to_string(),
            user_agent: self.user_agent.clone(),
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| ProbeError::protocol(format!("serialize request payload: {e}")))?;
        debug!("requesting as {} ({})", request.client_ip, request.user_agent);

        let outcome = match tokio::time::timeout(self.timeout, conn.request(&self.subject, &payload))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                subject: self.subject.clone(),
                timeout: self.timeout,
            }),
        };

        let drained = conn.drain().await;
        let reply = outcome?;
        drained?;

        let text = String::from_utf8_lossy(&reply).into_owned();
        if text != HEALTHY_REPLY {
            return Err(ProbeError::Unhealthy { reply: text });
        }
        Ok(text)
    }
}
