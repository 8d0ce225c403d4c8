//! Lobbies: rooms of clients that share one game session

pub mod manager;
pub mod room;

pub use manager::LobbyManager;
pub use room::{Lobby, LobbyError, LobbyInfo, LobbyState};
