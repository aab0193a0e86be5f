//! UDP sockets wrapped in netcode, shared by the match host and native clients.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use renet::RenetServer;
use renet_netcode::{NetcodeServerTransport, ServerAuthentication};
use thiserror::Error;
use tracing::{error, info};

use crate::config::ServerConfig;

/// Netcode handshakes fail unless both ends agree on this.
pub const PROTOCOL_ID: u64 = 0x6A2D_0001;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket setup failed: {0}")]
    Socket(#[from] io::Error),

    #[error("netcode: {0}")]
    Netcode(String),
}

impl TransportError {
    /// Sandboxes without network access refuse the bind itself.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Bind { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
    }
}

/// Netcode tokens are stamped with time since the Unix epoch.
pub(crate) fn netcode_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

pub(crate) fn bind_udp(addr: SocketAddr) -> Result<UdpSocket, TransportError> {
    let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Where and how the match host listens.
#[derive(Clone, Debug)]
pub struct ListenConfig {
    pub addr: SocketAddr,
    /// Seats plus headroom for clients reclaiming a seat.
    pub max_clients: usize,
    /// Connect-token key; without one any client may connect.
    pub private_key: Option<[u8; 32]>,
}

impl ListenConfig {
    pub fn from_server(config: &ServerConfig) -> Self {
        Self {
            addr: config.bind_address,
            max_clients: config.max_clients,
            private_key: None,
        }
    }

    fn authentication(&self) -> ServerAuthentication {
        match self.private_key {
            Some(private_key) => ServerAuthentication::Secure { private_key },
            None => ServerAuthentication::Unsecure,
        }
    }
}

/// The host's end of the wire. Drives a [`RenetServer`] once per tick.
pub struct ServerRunner {
    transport: NetcodeServerTransport,
    addr: SocketAddr,
}

impl ServerRunner {
    pub fn bind(config: &ListenConfig) -> Result<Self, TransportError> {
        let socket = bind_udp(config.addr)?;
        // Port 0 resolves here.
        let addr = socket.local_addr()?;

        let netcode = renet_netcode::ServerConfig {
            current_time: netcode_clock(),
            max_clients: config.max_clients,
            protocol_id: PROTOCOL_ID,
            public_addresses: vec![addr],
            authentication: config.authentication(),
        };
        let transport = NetcodeServerTransport::new(netcode, socket)
            .map_err(|e| TransportError::Netcode(e.to_string()))?;

        info!(%addr, max_clients = config.max_clients, "match host listening");
        Ok(Self { transport, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Pull in datagrams that arrived since the last tick.
    pub fn receive(&mut self, server: &mut RenetServer, delta: Duration) {
        if let Err(e) = self.transport.update(delta, server) {
            error!("netcode update failed: {}", e);
        }
    }

    /// Flush whatever the host queued this tick.
    pub fn send(&mut self, server: &mut RenetServer) {
        self.transport.send_packets(server);
    }
}
