//! Startup configuration: the listening port and the audit sink address.
//!
//! Resolved once in `main` from the CLI arguments and the `LOG_RPC_IP`
//! environment variable, then handed down to the listener and the audit
//! module. Unlike the audit client singleton (§4.3/§9), this is plain,
//! non-global state -- there is exactly one `Config` per process and it
//! never needs to be rebuilt.
use std::env;
use std::net::{IpAddr, SocketAddr};

use clap::Parser;

/// UDP port the audit sink listens on for incoming events.
const AUDIT_SINK_PORT: u16 = 9000;

const MIN_PORT: u16 = 1024;

#[derive(Debug, Parser)]
#[command(name = "peerhubd", about = "Peer-directory rendezvous server")]
pub struct Cli {
    /// TCP port to listen on for peer connections. Must be >= 1024.
    pub port: u16,

    /// IPv4 address of the audit sink. Overrides LOG_RPC_IP when given.
    #[arg(long = "log-rpc-ip")]
    pub log_rpc_ip: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("port {0} is below the minimum of {MIN_PORT}")]
    PortTooLow(u16),
    #[error("'{0}' is not a valid IPv4 address for the audit sink")]
    InvalidAuditAddress(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub audit_sink: Option<SocketAddr>,
}

impl Config {
    /// Builds a [`Config`] from parsed CLI arguments and the process
    /// environment. The CLI flag wins over `LOG_RPC_IP` when both are set;
    /// absence of either leaves audit disabled.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.port < MIN_PORT {
            return Err(ConfigError::PortTooLow(cli.port));
        }

        let raw_ip = cli.log_rpc_ip.or_else(|| env::var("LOG_RPC_IP").ok());
        let audit_sink = match raw_ip {
            Some(ip) => {
                let addr: IpAddr = ip
                    .parse()
                    .map_err(|_| ConfigError::InvalidAuditAddress(ip))?;
                Some(SocketAddr::new(addr, AUDIT_SINK_PORT))
            }
            None => None,
        };

        Ok(Self {
            port: cli.port,
            audit_sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(port: u16, log_rpc_ip: Option<&str>) -> Cli {
        Cli {
            port,
            log_rpc_ip: log_rpc_ip.map(str::to_string),
        }
    }

    #[test]
    fn rejects_port_below_1024() {
        let err = Config::from_cli(cli(80, None)).unwrap_err();
        assert!(matches!(err, ConfigError::PortTooLow(80)));
    }

    #[test]
    fn cli_flag_wins_over_log_rpc_ip_when_both_present() {
        // SAFETY: tests in this crate do not run with other threads racing
        // on this specific variable.
        unsafe { env::set_var("LOG_RPC_IP", "10.0.0.9") };
        let cfg = Config::from_cli(cli(2000, Some("10.0.0.1"))).unwrap();
        unsafe { env::remove_var("LOG_RPC_IP") };

        assert_eq!(cfg.audit_sink.unwrap().ip().to_string(), "10.0.0.1");
    }

    #[test]
    fn missing_audit_address_disables_audit() {
        unsafe { env::remove_var("LOG_RPC_IP") };
        let cfg = Config::from_cli(cli(2000, None)).unwrap();
        assert!(cfg.audit_sink.is_none());
    }

    #[test]
    fn invalid_audit_address_is_rejected() {
        let err = Config::from_cli(cli(2000, Some("not-an-ip"))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAuditAddress(_)));
    }
}
