use std::fmt;
use std::time::Duration;

/// Everything that can go wrong during a single probe run.
///
/// I/O failures are carried as text, together with the context of the
/// operation that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The configured subject is empty. Raised before any network activity.
    InvalidSubject,
    /// Dial, local-address resolution, read/write, or drain failure.
    Transport { context: String, source: String },
    /// The server sent something we cannot or will not speak to: a malformed
    /// operation line, an `-ERR`, or a requirement (auth, TLS) we don't support.
    Protocol { message: String },
    /// No reply arrived on the subject within the configured bound.
    Timeout { subject: String, timeout: Duration },
    /// A reply arrived but it was not `"ok"`. The reply text is the message.
    Unhealthy { reply: String },
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::InvalidSubject => write!(f, "invalid subject"),
            ProbeError::Transport { context, source } => write!(f, "{context}: {source}"),
            ProbeError::Protocol { message } => write!(f, "protocol error: {message}"),
            ProbeError::Timeout { subject, timeout } => {
                write!(f, "no reply on '{subject}' within {timeout:?}")
            }
            ProbeError::Unhealthy { reply } => write!(f, "{reply}"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl ProbeError {
    pub fn transport(context: impl Into<String>, source: std::io::Error) -> Self {
        ProbeError::Transport {
            context: context.into(),
            source: source.to_string(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ProbeError::Protocol {
            message: message.into(),
        }
    }
}
