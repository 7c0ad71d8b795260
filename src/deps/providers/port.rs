//! Port reachability.
//!
//! Wait expressions look like `[host]:port[/TCP|/UDP]`. The host defaults to
//! `127.0.0.1` and the protocol to TCP. A TCP check succeeds when a
//! connection is accepted within one second; a UDP check only proves that the
//! address resolves and a socket can be connected to it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::deps::{Broker, CheckOutcome, Depender, StringMap};
use crate::error::{CynoError, Result};

pub const KIND: &str = "port";

const DEFAULT_HOST: &str = "127.0.0.1";
const DIAL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

pub fn create(_config: &StringMap) -> Result<Arc<dyn Broker>> {
    Ok(Arc::new(PortBroker))
}

struct PortBroker;

impl Broker for PortBroker {
    fn kind(&self) -> &str {
        KIND
    }

    fn dep(&self, wait: &str) -> Result<Arc<dyn Depender>> {
        Ok(Arc::new(parse_target(wait)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PortTarget {
    host: String,
    port: u16,
    protocol: Protocol,
}

fn parse_target(wait: &str) -> Result<PortTarget> {
    let wait = wait.trim();
    let invalid = |reason: &str| CynoError::Config(format!("invalid port '{}': {}", wait, reason));

    let (address, protocol) = match wait.rsplit_once('/') {
        Some((address, proto)) if proto.eq_ignore_ascii_case("tcp") => (address, Protocol::Tcp),
        Some((address, proto)) if proto.eq_ignore_ascii_case("udp") => (address, Protocol::Udp),
        Some((_, proto)) => return Err(invalid(&format!("unknown protocol {}", proto))),
        None => (wait, Protocol::Tcp),
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, port) = rest
            .split_once("]:")
            .ok_or_else(|| invalid("missing port after bracketed host"))?;
        (host, port)
    } else {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.contains(':') {
            return Err(invalid("too many colons in address"));
        }
        (host, port)
    };

    let port: u16 = port
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(&e.to_string()))?;
    let host = if host.is_empty() { DEFAULT_HOST } else { host };

    Ok(PortTarget {
        host: host.to_string(),
        port,
        protocol,
    })
}

impl PortTarget {
    async fn probe(&self) -> std::result::Result<(), String> {
        match self.protocol {
            Protocol::Tcp => {
                match timeout(DIAL_TIMEOUT, TcpStream::connect((self.host.as_str(), self.port))).await
                {
                    Ok(Ok(_stream)) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("timeout".to_string()),
                }
            }
            Protocol::Udp => {
                let lookup = timeout(DIAL_TIMEOUT, lookup_host((self.host.as_str(), self.port)))
                    .await
                    .map_err(|_| "timeout".to_string())?;
                let addr = lookup
                    .map_err(|e| e.to_string())?
                    .next()
                    .ok_or_else(|| "no address".to_string())?;
                let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let socket = UdpSocket::bind(local).await.map_err(|e| e.to_string())?;
                socket.connect(addr).await.map_err(|e| e.to_string())
            }
        }
    }
}

#[async_trait]
impl Depender for PortTarget {
    async fn check(&self) -> CheckOutcome {
        let message = format!("{} {}:{}/{}", KIND, self.host, self.port, self.protocol);
        match self.probe().await {
            Ok(()) => CheckOutcome::ready(format!("{} open", message)),
            Err(reason) => CheckOutcome::waiting(format!("{} {}", message, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_defaults() {
        let target = parse_target(":5432").unwrap();
        assert_eq!(target.host, "127.0.0.1");
        assert_eq!(target.port, 5432);
        assert_eq!(target.protocol, Protocol::Tcp);
    }

    #[test]
    fn test_parse_host_and_protocol() {
        let target = parse_target("db.local:53/UDP").unwrap();
        assert_eq!(target.host, "db.local");
        assert_eq!(target.port, 53);
        assert_eq!(target.protocol, Protocol::Udp);

        let target = parse_target("db.local:80/TCP").unwrap();
        assert_eq!(target.protocol, Protocol::Tcp);
    }

    #[test]
    fn test_parse_ipv6() {
        let target = parse_target("[::1]:8080").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.port, 8080);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_target("5432").is_err());
        assert!(parse_target(":http").is_err());
        assert!(parse_target(":70000").is_err());
        assert!(parse_target(":80/SCTP").is_err());
        assert!(parse_target("::1:80").is_err());
    }

    #[tokio::test]
    async fn test_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = create(&StringMap::new()).unwrap();
        let outcome = broker.dep(&format!(":{}", port)).unwrap().check().await;
        assert!(outcome.satisfied, "{}", outcome.message);
        assert_eq!(outcome.message, format!("port 127.0.0.1:{}/TCP open", port));
    }

    #[tokio::test]
    async fn test_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let broker = create(&StringMap::new()).unwrap();
        let outcome = broker.dep(&format!(":{}", port)).unwrap().check().await;
        assert!(!outcome.satisfied);
        assert!(outcome.message.starts_with(&format!("port 127.0.0.1:{}/TCP ", port)));
    }

    #[tokio::test]
    async fn test_udp_loopback() {
        let broker = create(&StringMap::new()).unwrap();
        let outcome = broker.dep("127.0.0.1:9/UDP").unwrap().check().await;
        assert!(outcome.satisfied, "{}", outcome.message);
    }
}
