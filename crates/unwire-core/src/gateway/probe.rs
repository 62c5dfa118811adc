// ── TCP reachability probe ──

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

use super::ReachabilityProber;

/// Probes a host with a TCP connect. A completed handshake and an
/// explicit refusal (RST) both prove the host is up; silence does not.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    port: u16,
}

impl TcpProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Default for TcpProber {
    /// Echo port.
    fn default() -> Self {
        Self::new(7)
    }
}

#[async_trait]
impl ReachabilityProber for TcpProber {
    async fn is_reachable(&self, addr: IpAddr, timeout: Duration) -> bool {
        let target = SocketAddr::new(addr, self.port);
        let reachable = match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => e.kind() == ErrorKind::ConnectionRefused,
            Err(_) => false,
        };
        trace!(%addr, reachable, "probe");
        reachable
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_host_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let prober = TcpProber::new(port);
        assert!(
            prober
                .is_reachable("127.0.0.1".parse().unwrap(), Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn refused_connection_still_counts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let prober = TcpProber::new(port);
        assert!(
            prober
                .is_reachable("127.0.0.1".parse().unwrap(), Duration::from_secs(1))
                .await
        );
    }
}
