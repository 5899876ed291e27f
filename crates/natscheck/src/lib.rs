//! natscheck: remote node health checks over NATS request/reply.
//!
//! The probe opens a connection to a NATS server through a pluggable
//! [`dialer::Dialer`] and captures the local endpoint of that connection.
//! It then sends a JSON payload (`client_ip` + `user_agent`) as a single
//! request on a configured subject and succeeds iff the reply body is
//! exactly `ok`.

pub mod cli;
pub mod client;
pub mod dialer;
pub mod error;
pub mod probe;
pub mod proto;
pub mod telemetry;

pub use error::ProbeError;
pub use probe::{HEALTHY_REPLY, Probe, ProbeRequest};

// Logging macros, re-exported so binary and library code log the same way.
pub use log::{debug, error, info, trace, warn};
