//! Network strategy: raw bytes over a TCP socket (JetDirect, port 9100)
//!
//! One connection per job: connect, write everything, half-close. Refused
//! connections, timeouts and short writes all surface as a [`PrintError`].

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use crate::error::{PrintError, PrintResult};

/// Receipt printer reachable at `IPv4:port`
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Octets outside `0..=255` are rejected here, not by the route classifier
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let ip: Ipv4Addr = host
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid IPv4 address: {host}")))?;

        Ok(Self {
            addr: SocketAddr::V4(SocketAddrV4::new(ip, port)),
            timeout: Duration::from_secs(5),
        })
    }

    /// Applies to the connect and to the whole write separately
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    pub async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("connect {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;
        debug!("Socket open");

        let send = async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| PrintError::Timeout(format!("write {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: write failed: {}", self.addr, e)))?;

        info!("Receipt bytes delivered");
        Ok(())
    }
}
