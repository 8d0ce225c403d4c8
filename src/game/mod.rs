pub mod boss;
pub mod components;
pub mod constants;
pub mod level;
pub mod powerup;
pub mod session;
pub mod systems;

pub use session::{GamePhase, GameSession, SessionEvent, SessionSettings};
