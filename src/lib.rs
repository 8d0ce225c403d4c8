//! R-Type Server Library
//!
//! Server-authoritative core for a cooperative side-scrolling shooter over UDP.
//!
//! # Features
//!
//! - `admin` - Password-protected admin commands over the game socket (enabled by default)

pub mod codec;
pub mod config;
pub mod ecs;
pub mod game;
pub mod lobby;
pub mod metrics;
pub mod net;
pub mod server;

#[cfg(feature = "admin")]
pub mod admin;
