use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::{ClientMessage, GameData, GameState, ServerFrame};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

// Match traffic is JSON so browser peers and native peers share one envelope.

pub fn serialize_client_message(msg: &ClientMessage) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(msg)?)
}

pub fn deserialize_client_message(bytes: &[u8]) -> Result<ClientMessage, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn serialize_server_frame(frame: &ServerFrame) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(frame)?)
}

pub fn deserialize_server_frame(bytes: &[u8]) -> Result<ServerFrame, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn serialize_game_data_json(data: &GameData) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn deserialize_game_data_json(json: &str) -> Result<GameData, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_state(state: &GameState) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec(state)?)
}

pub fn deserialize_state(bytes: &[u8]) -> Result<GameState, WireError> {
    Ok(decode::from_slice(bytes)?)
}

/// Deterministic state hash for convergence checks between peers.
///
/// Hashes the MessagePack-serialized state using FNV-1a 64-bit.
pub fn state_hash(state: &GameState) -> Result<u64, WireError> {
    let bytes = serialize_state(state)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
