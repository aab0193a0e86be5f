//! Gazdálkodj Multiplayer Server
//!
//! Hosts one match for up to eight seats.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use gazdalkodj_core::saves::{new_game, new_game_with};
use gazdalkodj_core::{DirSaveStore, SaveStore};
use gazdalkodj_protocol::{serialize_server_frame, GameData, ServerFrame};
use renet::RenetServer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gazdalkodj_server::{
    channel_id, connection_config, ListenConfig, MatchHost, Outgoing, ServerConfig, ServerRunner,
    PROTOCOL_ID,
};

/// Server state
struct Server {
    /// Renet server
    renet: RenetServer,
    host: MatchHost,
}

impl Server {
    fn new(host: MatchHost) -> Self {
        Self {
            renet: RenetServer::new(connection_config()),
            host,
        }
    }

    /// Main server loop tick
    fn update(&mut self) {
        while let Some(event) = self.renet.get_event() {
            self.handle_server_event(event);
        }

        for client_id in self.renet.clients_id() {
            while let Some(message) = self.renet.receive_message(client_id, channel_id::COMMANDS) {
                let outgoing = self.host.handle_message(client_id, &message);
                self.dispatch(outgoing);
            }
        }

        self.host.tick();
    }

    fn handle_server_event(&mut self, event: renet::ServerEvent) {
        match event {
            renet::ServerEvent::ClientConnected { client_id } => {
                info!("Client {:?} connected", client_id);
            }
            renet::ServerEvent::ClientDisconnected { client_id, reason } => {
                info!("Client {:?} disconnected: {:?}", client_id, reason);
                self.host.client_disconnected(client_id);
            }
        }
    }

    fn dispatch(&mut self, outgoing: Vec<Outgoing>) {
        for out in outgoing {
            match out {
                Outgoing::To { client_id, frame } => self.send_message(client_id, &frame),
                Outgoing::Broadcast(frame) => self.broadcast_message(&frame),
            }
        }
    }

    fn send_message(&mut self, client_id: u64, frame: &ServerFrame) {
        match serialize_server_frame(frame) {
            Ok(data) => self.renet.send_message(client_id, channel_id::COMMANDS, data),
            Err(e) => warn!("Failed to serialize {}: {}", frame.message.kind(), e),
        }
    }

    fn broadcast_message(&mut self, frame: &ServerFrame) {
        match serialize_server_frame(frame) {
            Ok(data) => self.renet.broadcast_message(channel_id::COMMANDS, data),
            Err(e) => warn!("Failed to serialize {}: {}", frame.message.kind(), e),
        }
    }
}

/// A new match as configured: explicit seats, else default players.
fn fresh_match(config: &ServerConfig) -> GameData {
    let name = config.game_name.as_deref();
    match config.initial_players() {
        Some(players) => new_game_with(name, players),
        None => new_game(name, config.players),
    }
}

/// Resume the configured save, or start a fresh match.
fn open_match(config: &ServerConfig) -> anyhow::Result<(GameData, Option<DirSaveStore>)> {
    let Some(dir) = &config.save_dir else {
        if config.resume_game.is_some() {
            warn!("resume_game is ignored without save_dir");
        }
        return Ok((fresh_match(config), None));
    };

    let mut store = DirSaveStore::open(dir)
        .with_context(|| format!("opening save directory {}", dir.display()))?;
    let data = match &config.resume_game {
        Some(id) => store
            .load(id)
            .with_context(|| format!("loading saved match {id}"))?,
        None => {
            let data = fresh_match(config);
            store.save(&data).context("creating match")?;
            data
        }
    };
    Ok((data, Some(store)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gazdalkodj_server=info,gazdalkodj_core=info")),
        )
        .init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    };

    let (data, saves) = open_match(&config)?;
    let mut server = Server::new(MatchHost::new(data, &config, saves));

    let mut transport =
        ServerRunner::bind(&ListenConfig::from_server(&config)).context("creating transport")?;

    info!("Gazdálkodj Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", transport.local_addr());
    info!("Protocol ID: {:016x}", PROTOCOL_ID);

    let mut ticker = tokio::time::interval(config.tick());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta: Duration = now - last_tick;
                last_tick = now;

                server.renet.update(delta);
                transport.receive(&mut server.renet, delta);
                server.update();
                transport.send(&mut server.renet);
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                server.host.persist();
                server.renet.disconnect_all();
                transport.send(&mut server.renet);
                break;
            }
        }
    }

    Ok(())
}
