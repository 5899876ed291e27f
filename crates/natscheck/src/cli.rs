//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;

use crate::probe::Probe;

#[derive(Parser, Debug)]
#[command(
    name = "natscheck",
    version,
    about = "Remote node health checks over NATS request/reply"
)]
pub struct Cli {
    /// NATS server host.
    #[arg(long, env = "NATS_HOST", default_value = "localhost")]
    pub host: String,

    /// NATS server port.
    #[arg(short, long, env = "NATS_PORT", default_value_t = 4222)]
    pub port: u16,

    /// Subject the remote health-check responder listens on.
    #[arg(
        short,
        long,
        visible_alias = "sub",
        alias = "topic",
        short_alias = 't',
        env = "NATS_REQUEST_SUBJECT"
    )]
    pub subject: Option<String>,

    /// How long to wait for the reply, e.g. "5s", "1500ms", "2m" or a bare
    /// number of seconds.
    #[arg(
        long,
        env = "NATS_REQUEST_TIMEOUT",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub timeout: Duration,

    /// User agent string identifying this client in the request payload.
    #[arg(long, env = "NATS_USER_AGENT", default_value = "NATS Health Check")]
    pub user_agent: String,
}

impl Cli {
    pub fn probe(&self) -> Probe {
        Probe {
            host: self.host.clone(),
            port: self.port,
            subject: self.subject.clone().unwrap_or_default(),
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Parse a duration given as `<n>ms`, `<n>s`, `<n>m`, or a bare number of
/// seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty duration".to_string());
    }

    // "ms" must be tried before the single-letter suffixes.
    if let Some(ms) = value.strip_suffix("ms") {
        return parse_count(ms, value).map(Duration::from_millis);
    }
    if let Some(secs) = value.strip_suffix('s') {
        return parse_count(secs, value).map(Duration::from_secs);
    }
    if let Some(mins) = value.strip_suffix('m') {
        return parse_count(mins, value).map(|m| Duration::from_secs(m * 60));
    }
    parse_count(value, value).map(Duration::from_secs)
}

fn parse_count(digits: &str, input: &str) -> Result<u64, String> {
    digits
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid duration '{input}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["natscheck"]).unwrap();
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 4222);
        assert_eq!(cli.subject, None);
        assert_eq!(cli.timeout, Duration::from_secs(5));
        assert_eq!(cli.user_agent, "NATS Health Check");
    }

    #[test]
    fn test_subject_flag_and_aliases() {
        for args in [
            ["natscheck", "--subject", "health.check"],
            ["natscheck", "-s", "health.check"],
            ["natscheck", "--sub", "health.check"],
            ["natscheck", "-t", "health.check"],
            ["natscheck", "--topic", "health.check"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.subject.as_deref(), Some("health.check"));
        }
    }

    #[test]
    fn test_probe_conversion_defaults_missing_subject_to_empty() {
        let cli = Cli::try_parse_from(["natscheck", "-p", "5222"]).unwrap();
        let probe = cli.probe();
        assert_eq!(probe.port, 5222);
        assert_eq!(probe.subject, "");
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert_eq!(parse_duration(" 10s "), Ok(Duration::from_secs(10)));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1.5s").is_err());
    }

    #[test]
    fn test_timeout_flag() {
        let cli = Cli::try_parse_from(["natscheck", "--timeout", "250ms"]).unwrap();
        assert_eq!(cli.timeout, Duration::from_millis(250));
    }
}
