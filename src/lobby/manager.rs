use std::collections::BTreeMap;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::info;

use crate::game::SessionSettings;
use crate::lobby::room::{Lobby, LobbyError, LobbyInfo, LobbyState};
use crate::net::outbox::Outbox;
use crate::net::protocol::ClientMessage;

/// Longest lobby name kept, in characters
pub const MAX_NAME_LEN: usize = 12;
/// Highest difficulty tier
pub const MAX_DIFFICULTY: u8 = 2;

/// Owns every lobby and the client-to-lobby routing map
pub struct LobbyManager {
    lobbies: BTreeMap<i32, Lobby>,
    client_lobbies: FxHashMap<u32, i32>,
    next_id: i32,
    max_lobbies: usize,
    default_capacity: usize,
}

impl LobbyManager {
    pub fn new(max_lobbies: usize, default_capacity: usize) -> Self {
        Self {
            lobbies: BTreeMap::new(),
            client_lobbies: FxHashMap::default(),
            next_id: 1,
            max_lobbies,
            default_capacity,
        }
    }

    /// Create a lobby, returning its id
    pub fn create_lobby(
        &mut self,
        name: Option<&str>,
        settings: SessionSettings,
    ) -> Result<i32, LobbyError> {
        if self.lobbies.len() >= self.max_lobbies {
            return Err(LobbyError::TooManyLobbies);
        }
        let id = self.next_id;
        self.next_id += 1;

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.chars().take(MAX_NAME_LEN).collect(),
            None => format!("Lobby {}", id),
        };
        let settings = SessionSettings {
            difficulty: settings.difficulty.min(MAX_DIFFICULTY),
            ..settings
        };
        info!(
            "Lobby {} '{}' created (friendly fire: {}, difficulty: {})",
            id, name, settings.friendly_fire, settings.difficulty
        );
        self.lobbies
            .insert(id, Lobby::new(id, name, self.default_capacity, settings));
        Ok(id)
    }

    /// Move a client into `lobby_id`, leaving any lobby they were in
    pub fn join_lobby(
        &mut self,
        client_id: u32,
        lobby_id: i32,
        outbox: &mut Outbox,
    ) -> Result<(), LobbyError> {
        let lobby = self.lobbies.get(&lobby_id).ok_or(LobbyError::NotFound)?;
        if lobby.contains(client_id) {
            return Err(LobbyError::AlreadyMember);
        }
        if lobby.is_full() {
            return Err(LobbyError::Full);
        }

        if self.client_lobbies.contains_key(&client_id) {
            self.leave_lobby(client_id, outbox)?;
        }
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound)?;
        lobby.add_player(client_id, outbox)?;
        self.client_lobbies.insert(client_id, lobby_id);
        Ok(())
    }

    /// Take a client out of their lobby, returning its id
    pub fn leave_lobby(&mut self, client_id: u32, outbox: &mut Outbox) -> Result<i32, LobbyError> {
        let lobby_id = self
            .client_lobbies
            .remove(&client_id)
            .ok_or(LobbyError::NotInLobby)?;
        if let Some(lobby) = self.lobbies.get_mut(&lobby_id) {
            lobby.remove_player(client_id, outbox);
        }
        Ok(lobby_id)
    }

    pub fn client_lobby(&self, client_id: u32) -> Option<i32> {
        self.client_lobbies.get(&client_id).copied()
    }

    pub fn lobby(&self, lobby_id: i32) -> Option<&Lobby> {
        self.lobbies.get(&lobby_id)
    }

    pub fn lobby_mut(&mut self, lobby_id: i32) -> Option<&mut Lobby> {
        self.lobbies.get_mut(&lobby_id)
    }

    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    /// Joinable and running lobbies
    pub fn list_lobbies(&self) -> Vec<LobbyInfo> {
        self.lobbies
            .values()
            .filter(|l| l.state() != LobbyState::Finished)
            .map(Lobby::info)
            .collect()
    }

    /// Route a gameplay message to the sender's lobby; false when they have none
    pub fn dispatch(&mut self, client_id: u32, msg: &ClientMessage, outbox: &mut Outbox) -> bool {
        let Some(lobby) = self
            .client_lobbies
            .get(&client_id)
            .and_then(|id| self.lobbies.get_mut(id))
        else {
            return false;
        };
        lobby.handle_message(client_id, msg, outbox);
        true
    }

    /// Tick every lobby
    pub fn update_all(&mut self, dt: f32, outbox: &mut Outbox) {
        for lobby in self.lobbies.values_mut() {
            lobby.update(dt, outbox);
        }
    }

    /// Drop lobbies that are empty or idle, unless a game is running
    pub fn cleanup_inactive(&mut self, timeout: Duration) -> Vec<i32> {
        let stale: Vec<i32> = self
            .lobbies
            .values()
            .filter(|l| l.state() != LobbyState::InGame)
            .filter(|l| l.is_empty() || l.idle_time() > timeout)
            .map(Lobby::id)
            .collect();
        for &id in &stale {
            self.remove_lobby(id);
        }
        stale
    }

    pub fn handle_client_disconnect(&mut self, client_id: u32, outbox: &mut Outbox) {
        if let Ok(lobby_id) = self.leave_lobby(client_id, outbox) {
            info!("Client {} disconnected from lobby {}", client_id, lobby_id);
        }
    }

    pub fn remove_lobby(&mut self, lobby_id: i32) -> Option<Lobby> {
        let lobby = self.lobbies.remove(&lobby_id)?;
        for client_id in lobby.members() {
            self.client_lobbies.remove(client_id);
        }
        info!("Lobby {} removed", lobby_id);
        Some(lobby)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// Clients currently in any lobby
    pub fn client_count(&self) -> usize {
        self.client_lobbies.len()
    }
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self::new(64, 4)
    }
}
