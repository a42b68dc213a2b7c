use std::future::Future;
use std::net::Ipv4Addr;

use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

/// Address advertised when resolution fails.
pub const FALLBACK_HOST_ADDRESS: &str = "localhost";

pub trait ResolveHost {
    fn resolve(&self) -> impl Future<Output = Result<String>>;
}

/// Where the advertised host address comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResolver {
    /// Address fixed in configuration.
    Fixed(String),
    /// First address reported by `hostname -I`.
    Hostname,
}

impl HostResolver {
    pub fn from_override(address: Option<String>) -> Self {
        match address {
            Some(address) if !address.trim().is_empty() => HostResolver::Fixed(address),
            _ => HostResolver::Hostname,
        }
    }
}

impl ResolveHost for HostResolver {
    async fn resolve(&self) -> Result<String> {
        match self {
            HostResolver::Fixed(address) => Ok(address.clone()),
            HostResolver::Hostname => {
                let output = Command::new("hostname")
                    .arg("-I")
                    .output()
                    .await
                    .map_err(|e| {
                        OrchestratorError::AddressResolution(format!("failed to run hostname: {e}"))
                    })?;
                if !output.status.success() {
                    return Err(OrchestratorError::AddressResolution(format!(
                        "hostname -I failed (exit {})",
                        output.status.code().unwrap_or(-1)
                    )));
                }
                parse_hostname_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(
                    || OrchestratorError::AddressResolution("hostname -I returned no address".into()),
                )
            }
        }
    }
}

/// Pick the first IPv4 address from `hostname -I` output, else the first token.
pub fn parse_hostname_output(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace().peekable();
    let first = tokens.peek().map(|t| t.to_string());
    tokens
        .find(|t| t.parse::<Ipv4Addr>().is_ok())
        .map(str::to_string)
        .or(first)
}

/// Resolve the host address, falling back to [`FALLBACK_HOST_ADDRESS`].
pub async fn resolve_or_default<R: ResolveHost>(resolver: &R) -> String {
    match resolver.resolve().await {
        Ok(address) => address,
        Err(e) => {
            tracing::warn!(error = %e, fallback = FALLBACK_HOST_ADDRESS, "could not resolve host address");
            FALLBACK_HOST_ADDRESS.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unresolvable;

    impl ResolveHost for Unresolvable {
        async fn resolve(&self) -> Result<String> {
            Err(OrchestratorError::AddressResolution("no network".into()))
        }
    }

    #[test]
    fn parse_prefers_ipv4() {
        assert_eq!(
            parse_hostname_output("fe80::42:acff:fe11:2 172.17.0.2 \n").as_deref(),
            Some("172.17.0.2")
        );
    }

    #[test]
    fn parse_falls_back_to_first_token() {
        assert_eq!(
            parse_hostname_output("fe80::1 fe80::2\n").as_deref(),
            Some("fe80::1")
        );
    }

    #[test]
    fn parse_empty_output() {
        assert!(parse_hostname_output("  \n").is_none());
    }

    #[test]
    fn blank_override_uses_hostname() {
        assert_eq!(HostResolver::from_override(Some(" ".into())), HostResolver::Hostname);
        assert_eq!(HostResolver::from_override(None), HostResolver::Hostname);
        assert_eq!(
            HostResolver::from_override(Some("10.0.0.5".into())),
            HostResolver::Fixed("10.0.0.5".into())
        );
    }

    #[tokio::test]
    async fn fixed_address_is_returned_verbatim() {
        let resolver = HostResolver::Fixed("192.168.1.20".into());
        assert_eq!(resolve_or_default(&resolver).await, "192.168.1.20");
    }

    #[tokio::test]
    async fn failure_falls_back_to_localhost() {
        assert_eq!(resolve_or_default(&Unresolvable).await, "localhost");
    }
}
