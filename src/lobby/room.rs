use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::game::{GamePhase, GameSession, SessionEvent, SessionSettings};
use crate::net::broadcast;
use crate::net::outbox::Outbox;
use crate::net::protocol::ClientMessage;

/// Lobby state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LobbyState {
    /// Open, session in its waiting-room phase
    Waiting = 0,
    /// Session ticking gameplay
    InGame = 1,
    /// Game ended or everyone left; eligible for cleanup once empty
    Finished = 2,
}

/// Summary shown in lobby lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyInfo {
    pub id: i32,
    pub name: String,
    pub current_players: usize,
    pub max_players: usize,
    pub state: LobbyState,
}

/// Lobby errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby is full")]
    Full,
    #[error("Client already in this lobby")]
    AlreadyMember,
    #[error("Lobby not found")]
    NotFound,
    #[error("Lobby limit reached")]
    TooManyLobbies,
    #[error("Client is not in a lobby")]
    NotInLobby,
}

/// A room of connected clients sharing one game session
pub struct Lobby {
    id: i32,
    name: String,
    max_players: usize,
    state: LobbyState,
    members: Vec<u32>,
    session: GameSession,
    created_at: Instant,
    last_activity: Instant,
}

impl Lobby {
    pub fn new(id: i32, name: String, max_players: usize, settings: SessionSettings) -> Self {
        Self::with_session(id, name, max_players, GameSession::new(settings))
    }

    pub fn with_session(id: i32, name: String, max_players: usize, session: GameSession) -> Self {
        let now = Instant::now();
        Self {
            id,
            name,
            max_players: max_players.max(1),
            state: LobbyState::Waiting,
            members: Vec::new(),
            session,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn members(&self) -> &[u32] {
        &self.members
    }

    pub fn contains(&self, client_id: u32) -> bool {
        self.members.contains(&client_id)
    }

    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn info(&self) -> LobbyInfo {
        LobbyInfo {
            id: self.id,
            name: self.name.clone(),
            current_players: self.members.len(),
            max_players: self.max_players,
            state: self.state,
        }
    }

    fn broadcast_status(&self, outbox: &mut Outbox) {
        let total = self.members.len().min(u8::MAX as usize) as u8;
        let ready = self.session.ready_count(&self.members).min(u8::MAX as usize) as u8;
        outbox.broadcast(&self.members, &broadcast::lobby_status(total, ready));
    }

    /// Add a member; joining a running game spawns them straight in
    pub fn add_player(&mut self, client_id: u32, outbox: &mut Outbox) -> Result<(), LobbyError> {
        if self.contains(client_id) {
            return Err(LobbyError::AlreadyMember);
        }
        if self.is_full() {
            return Err(LobbyError::Full);
        }

        self.members.push(client_id);
        self.touch();
        info!(
            "Client {} joined lobby {} ({}/{})",
            client_id,
            self.id,
            self.members.len(),
            self.max_players
        );

        if self.state == LobbyState::InGame {
            self.session.add_player_mid_game(client_id, outbox);
        } else {
            self.broadcast_status(outbox);
        }
        Ok(())
    }

    /// Remove a member; false when they were not in this lobby
    pub fn remove_player(&mut self, client_id: u32, outbox: &mut Outbox) -> bool {
        let Some(pos) = self.members.iter().position(|&c| c == client_id) else {
            return false;
        };
        self.members.remove(pos);
        self.session.remove_player(client_id);
        self.touch();
        info!("Client {} left lobby {}", client_id, self.id);

        if self.members.is_empty() {
            if self.session.phase() == GamePhase::InGame {
                self.session.reset_game();
            }
            self.state = LobbyState::Finished;
        } else if self.state != LobbyState::InGame {
            self.broadcast_status(outbox);
        }
        true
    }

    /// Start the session for every member; no-op when empty or already running
    pub fn start_game(&mut self, outbox: &mut Outbox) -> bool {
        if self.members.is_empty() || self.state == LobbyState::InGame {
            return false;
        }
        self.session.start_game(&self.members, outbox);
        self.state = LobbyState::InGame;
        self.touch();
        info!("Lobby {} started a game", self.id);
        true
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::GameStarted => {
                self.state = LobbyState::InGame;
                info!("Lobby {} started a game", self.id);
            }
            SessionEvent::GameReset => {
                self.state = LobbyState::Finished;
                info!("Lobby {} finished its game", self.id);
            }
        }
    }

    pub fn handle_message(&mut self, client_id: u32, msg: &ClientMessage, outbox: &mut Outbox) {
        if !self.contains(client_id) {
            debug!("Client {} is not a member of lobby {}", client_id, self.id);
            return;
        }
        self.touch();
        if matches!(msg, ClientMessage::StartGame) {
            self.start_game(outbox);
            return;
        }
        if let Some(event) = self
            .session
            .handle_message(client_id, msg, &self.members, outbox)
        {
            self.apply_event(event);
        }
    }

    /// Advance the session one tick
    pub fn update(&mut self, dt: f32, outbox: &mut Outbox) {
        for event in self.session.update(dt, &self.members, outbox) {
            self.apply_event(event);
        }
    }
}
