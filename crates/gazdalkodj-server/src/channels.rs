//! Renet channel configuration.
//!
//! A match is a strict sequence of results, so everything travels on a
//! single reliable, ordered channel.

use std::time::Duration;

use renet::ChannelConfig;

/// Channel IDs
pub mod channel_id {
    /// Intents, results and state sync - must arrive in order
    pub const COMMANDS: u8 = 0;
}

/// Maximum bytes per channel
const MAX_CHANNEL_MEMORY: usize = 5 * 1024 * 1024; // 5 MB

/// Channel configurations shared by server and clients
pub fn create_channel_configs() -> Vec<ChannelConfig> {
    vec![ChannelConfig {
        channel_id: channel_id::COMMANDS,
        max_memory_usage_bytes: MAX_CHANNEL_MEMORY,
        send_type: renet::SendType::ReliableOrdered {
            resend_time: Duration::from_millis(300),
        },
    }]
}

/// Connection config used on both ends
pub fn connection_config() -> renet::ConnectionConfig {
    renet::ConnectionConfig {
        available_bytes_per_tick: 60_000,
        server_channels_config: create_channel_configs(),
        client_channels_config: create_channel_configs(),
    }
}
