//! Inspection of the host's active TCP listeners.
//!
//! The prober asks a [`ListenerProbe`] once per attempt whether anything is
//! bound to a port. The default implementation reads the kernel socket
//! tables; [`ConnectProbe`] is available for hosts where `/proc` is not
//! readable. Inspections are async so a slow `/proc` read or connect never
//! stalls the runtime.

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::models::ProbeMethod;

/// TCP state code for LISTEN in `/proc/net/tcp`.
const TCP_LISTEN: &str = "0A";

pub trait ListenerProbe: Send + Sync {
    /// Whether a TCP listener is currently bound to `port`.
    fn is_listening(&self, port: u16) -> impl Future<Output = io::Result<bool>> + Send;
}

impl<P: ListenerProbe> ListenerProbe for &P {
    fn is_listening(&self, port: u16) -> impl Future<Output = io::Result<bool>> + Send {
        (**self).is_listening(port)
    }
}

/// The probe selected in configuration.
pub enum HostProbe {
    SocketTable(SocketTableProbe),
    Connect(ConnectProbe),
}

impl HostProbe {
    pub fn for_method(method: ProbeMethod) -> Self {
        match method {
            ProbeMethod::SocketTable => Self::SocketTable(SocketTableProbe::default()),
            ProbeMethod::Connect => Self::Connect(ConnectProbe::default()),
        }
    }
}

impl ListenerProbe for HostProbe {
    async fn is_listening(&self, port: u16) -> io::Result<bool> {
        match self {
            Self::SocketTable(probe) => probe.is_listening(port).await,
            Self::Connect(probe) => probe.is_listening(port).await,
        }
    }
}

/// Reads `/proc/net/tcp` and `/proc/net/tcp6`.
pub struct SocketTableProbe {
    tables: Vec<PathBuf>,
}

impl SocketTableProbe {
    pub fn new(tables: Vec<PathBuf>) -> Self {
        Self { tables }
    }
}

impl Default for SocketTableProbe {
    fn default() -> Self {
        Self::new(vec!["/proc/net/tcp".into(), "/proc/net/tcp6".into()])
    }
}

impl ListenerProbe for SocketTableProbe {
    async fn is_listening(&self, port: u16) -> io::Result<bool> {
        let mut last_error = None;
        let mut read_any = false;
        for table in &self.tables {
            match tokio::fs::read_to_string(table).await {
                Ok(contents) => {
                    read_any = true;
                    if listening_ports(&contents).contains(&port) {
                        return Ok(true);
                    }
                }
                // tcp6 is absent on kernels without IPv6
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => last_error = Some(e),
            }
        }
        match (read_any, last_error) {
            (true, _) => Ok(false),
            (false, Some(e)) => Err(e),
            (false, None) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no TCP socket table available",
            )),
        }
    }
}

/// Extract the local ports of all LISTEN sockets from a `/proc/net/tcp*` table.
pub fn listening_ports(table: &str) -> HashSet<u16> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let local = fields.nth(1)?;
            let state = fields.nth(1)?;
            if state != TCP_LISTEN {
                return None;
            }
            let (_, port_hex) = local.rsplit_once(':')?;
            u16::from_str_radix(port_hex, 16).ok()
        })
        .collect()
}

/// Connects to `127.0.0.1:<port>`; a refused connection means nothing listens.
pub struct ConnectProbe {
    timeout: Duration,
}

impl ConnectProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ConnectProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl ListenerProbe for ConnectProbe {
    async fn is_listening(&self, port: u16) -> io::Result<bool> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let Ok(connected) = tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await
        else {
            return Ok(false);
        };
        match connected {
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
