//! Native client: a [`SyncClient`] driven over renet.

use std::net::SocketAddr;
use std::time::Duration;

use gazdalkodj_core::SyncClient;
use gazdalkodj_protocol::{deserialize_server_frame, serialize_client_message};
use renet::RenetClient;
use renet_netcode::{ClientAuthentication, NetcodeClientTransport};
use tracing::{debug, warn};

use crate::channels::{channel_id, connection_config};
use crate::transport::{bind_udp, netcode_clock, TransportError, PROTOCOL_ID};

pub struct ClientRunner {
    client: RenetClient,
    transport: NetcodeClientTransport,
    sync: SyncClient,
}

impl ClientRunner {
    pub fn connect(
        server_addr: SocketAddr,
        client_id: u64,
        sync: SyncClient,
    ) -> Result<Self, TransportError> {
        let local = match server_addr {
            SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
            SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
        };
        let socket = bind_udp(local)?;

        let authentication = ClientAuthentication::Unsecure {
            client_id,
            protocol_id: PROTOCOL_ID,
            server_addr,
            user_data: None,
        };

        let transport = NetcodeClientTransport::new(netcode_clock(), authentication, socket)
            .map_err(|e| TransportError::Netcode(e.to_string()))?;

        Ok(Self {
            client: RenetClient::new(connection_config()),
            transport,
            sync,
        })
    }

    pub fn sync(&self) -> &SyncClient {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncClient {
        &mut self.sync
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// One client tick: receive frames, send queued intents, let timers run.
    pub fn update(&mut self, delta: Duration) -> Result<(), TransportError> {
        self.client.update(delta);
        self.transport
            .update(delta, &mut self.client)
            .map_err(|e| TransportError::Netcode(e.to_string()))?;

        if self.client.is_connected() {
            while let Some(data) = self.client.receive_message(channel_id::COMMANDS) {
                match deserialize_server_frame(&data) {
                    Ok(frame) => self.sync.handle_frame(frame),
                    Err(e) => warn!("Failed to deserialize server frame: {}", e),
                }
            }

            for intent in self.sync.drain_outbox() {
                match serialize_client_message(&intent) {
                    Ok(data) => {
                        debug!(kind = intent.kind(), "sending intent");
                        self.client.send_message(channel_id::COMMANDS, data);
                    }
                    Err(e) => warn!("Failed to serialize {}: {}", intent.kind(), e),
                }
            }
        }

        self.sync.advance(delta);

        let _ = self.transport.send_packets(&mut self.client);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }
}
