//! Password-protected admin commands over the game socket
//!
//! Replies are plain strings prefixed with `OK:` or `ERROR:`; the caller
//! wraps them in an `AdminResponse` packet.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::lobby::{LobbyManager, LobbyState};
use crate::net::broadcast;
use crate::net::connection::ConnectionTable;
use crate::net::outbox::Outbox;

/// Admin sessions idle longer than this are dropped
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const HELP: &str = "OK: help | status | players | lobbies | kick <client> | close <lobby>";

#[derive(Debug, Serialize)]
struct StatusReport {
    uptime_seconds: u64,
    clients: usize,
    lobbies: usize,
    lobbies_in_game: usize,
    players_in_lobbies: usize,
}

/// Authenticated admin sessions, keyed by client id
pub struct AdminManager {
    password: String,
    sessions: FxHashMap<u32, Instant>,
    started_at: Instant,
}

impl AdminManager {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            sessions: FxHashMap::default(),
            started_at: Instant::now(),
        }
    }

    pub fn authenticate(&mut self, client_id: u32, password: &str) -> bool {
        if password != self.password {
            warn!("Failed admin login from client {}", client_id);
            return false;
        }
        self.sessions.insert(client_id, Instant::now());
        info!("Client {} authenticated as admin", client_id);
        true
    }

    pub fn is_admin(&self, client_id: u32) -> bool {
        self.sessions.contains_key(&client_id)
    }

    pub fn logout(&mut self, client_id: u32) -> bool {
        let was_admin = self.sessions.remove(&client_id).is_some();
        if was_admin {
            info!("Admin client {} logged out", client_id);
        }
        was_admin
    }

    /// Drop sessions idle past `timeout`
    pub fn cleanup_inactive(&mut self, timeout: Duration) -> Vec<u32> {
        let stale: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, last)| last.elapsed() > timeout)
            .map(|(&id, _)| id)
            .collect();
        for id in &stale {
            self.sessions.remove(id);
        }
        stale
    }

    /// Run one command line on behalf of `client_id`
    pub fn execute(
        &mut self,
        client_id: u32,
        command: &str,
        lobbies: &mut LobbyManager,
        connections: &mut ConnectionTable,
        outbox: &mut Outbox,
    ) -> String {
        let Some(last) = self.sessions.get_mut(&client_id) else {
            return "ERROR: Not authenticated".to_string();
        };
        *last = Instant::now();

        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or("help").to_ascii_lowercase();
        let arg = words.next();
        info!("Admin {} ran '{}'", client_id, command.trim());

        match name.as_str() {
            "help" => HELP.to_string(),
            "status" => self.status(lobbies, connections),
            "players" => players(connections, lobbies),
            "lobbies" => list_lobbies(lobbies),
            "kick" => match arg.map(str::parse::<u32>) {
                Some(Ok(target)) => self.kick(target, lobbies, connections, outbox),
                Some(Err(_)) => "ERROR: Invalid client id".to_string(),
                None => "ERROR: Usage: kick <client>".to_string(),
            },
            "close" => match arg.map(str::parse::<i32>) {
                Some(Ok(lobby_id)) => close(lobby_id, lobbies, outbox),
                Some(Err(_)) => "ERROR: Invalid lobby id".to_string(),
                None => "ERROR: Usage: close <lobby>".to_string(),
            },
            other => format!("ERROR: Unknown command '{}', try 'help'", other),
        }
    }

    fn status(&self, lobbies: &LobbyManager, connections: &ConnectionTable) -> String {
        let report = StatusReport {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            clients: connections.len(),
            lobbies: lobbies.lobby_count(),
            lobbies_in_game: lobbies
                .lobbies()
                .filter(|l| l.state() == LobbyState::InGame)
                .count(),
            players_in_lobbies: lobbies.client_count(),
        };
        match serde_json::to_string(&report) {
            Ok(json) => format!("OK: {}", json),
            Err(e) => format!("ERROR: {}", e),
        }
    }

    fn kick(
        &mut self,
        target: u32,
        lobbies: &mut LobbyManager,
        connections: &mut ConnectionTable,
        outbox: &mut Outbox,
    ) -> String {
        lobbies.handle_client_disconnect(target, outbox);
        self.sessions.remove(&target);
        match connections.remove(target) {
            Some(conn) => {
                info!("Client {} ({}) kicked", target, conn.remote_addr);
                format!("OK: Client {} kicked", target)
            }
            None => format!("ERROR: Client {} not connected", target),
        }
    }
}

fn players(connections: &ConnectionTable, lobbies: &LobbyManager) -> String {
    let mut ids = connections.ids();
    ids.sort_unstable();
    let mut out = format!("OK: {} clients", ids.len());
    for id in ids {
        let Some(conn) = connections.get(id) else {
            continue;
        };
        match lobbies.client_lobby(id) {
            Some(lobby) => out.push_str(&format!(" | {} {} lobby {}", id, conn.remote_addr, lobby)),
            None => out.push_str(&format!(" | {} {}", id, conn.remote_addr)),
        }
    }
    out
}

fn list_lobbies(lobbies: &LobbyManager) -> String {
    let mut out = format!("OK: {} lobbies", lobbies.lobby_count());
    for lobby in lobbies.lobbies() {
        let info = lobby.info();
        out.push_str(&format!(
            " | {} '{}' {}/{} {:?}",
            info.id, info.name, info.current_players, info.max_players, info.state
        ));
    }
    out
}

fn close(lobby_id: i32, lobbies: &mut LobbyManager, outbox: &mut Outbox) -> String {
    let Some(lobby) = lobbies.remove_lobby(lobby_id) else {
        return "ERROR: Lobby not found".to_string();
    };
    for &member in lobby.members() {
        outbox.send(member, broadcast::lobby_left(true));
    }
    format!("OK: Lobby {} closed", lobby_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::SessionSettings;
    use std::net::SocketAddr;

    struct Fixture {
        admin: AdminManager,
        lobbies: LobbyManager,
        connections: ConnectionTable,
        outbox: Outbox,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                admin: AdminManager::new("secret"),
                lobbies: LobbyManager::new(8, 4),
                connections: ConnectionTable::new(),
                outbox: Outbox::default(),
            }
        }

        fn connect(&mut self, port: u16) -> u32 {
            let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
            self.connections.register(addr).0
        }

        fn run(&mut self, client_id: u32, command: &str) -> String {
            self.admin.execute(
                client_id,
                command,
                &mut self.lobbies,
                &mut self.connections,
                &mut self.outbox,
            )
        }
    }

    #[test]
    fn test_authentication() {
        let mut f = Fixture::new();
        assert!(!f.admin.authenticate(1, "wrong"));
        assert!(!f.admin.is_admin(1));
        assert!(f.run(1, "status").starts_with("ERROR"));

        assert!(f.admin.authenticate(1, "secret"));
        assert!(f.admin.is_admin(1));
        assert!(f.admin.logout(1));
        assert!(!f.admin.logout(1));
        assert!(f.run(1, "help").starts_with("ERROR"));
    }

    #[test]
    fn test_status_is_json() {
        let mut f = Fixture::new();
        let admin = f.connect(9000);
        f.admin.authenticate(admin, "secret");
        f.lobbies.create_lobby(None, SessionSettings::default()).unwrap();

        let reply = f.run(admin, "STATUS");
        let json: serde_json::Value = serde_json::from_str(reply.trim_start_matches("OK: ")).unwrap();
        assert_eq!(json["clients"], 1);
        assert_eq!(json["lobbies"], 1);
        assert_eq!(json["lobbies_in_game"], 0);
    }

    #[test]
    fn test_kick_removes_client_everywhere() {
        let mut f = Fixture::new();
        let admin = f.connect(9000);
        let victim = f.connect(9001);
        f.admin.authenticate(admin, "secret");
        let lobby = f.lobbies.create_lobby(None, SessionSettings::default()).unwrap();
        f.lobbies.join_lobby(victim, lobby, &mut f.outbox).unwrap();

        assert_eq!(f.run(admin, &format!("kick {}", victim)), "OK: Client 2 kicked");
        assert_eq!(f.lobbies.client_lobby(victim), None);
        assert!(f.connections.get(victim).is_none());

        assert!(f.run(admin, "kick 2").starts_with("ERROR"));
        assert!(f.run(admin, "kick abc").starts_with("ERROR: Invalid"));
        assert!(f.run(admin, "kick").starts_with("ERROR: Usage"));
    }

    #[test]
    fn test_close_lobby_notifies_members() {
        let mut f = Fixture::new();
        let admin = f.connect(9000);
        f.admin.authenticate(admin, "secret");
        let lobby = f.lobbies.create_lobby(Some("Doomed"), SessionSettings::default()).unwrap();
        f.lobbies.join_lobby(5, lobby, &mut f.outbox).unwrap();
        f.outbox.drain();

        assert!(f.run(admin, "lobbies").contains("'Doomed'"));
        assert_eq!(f.run(admin, &format!("close {}", lobby)), "OK: Lobby 1 closed");
        assert_eq!(f.lobbies.lobby_count(), 0);
        assert_eq!(f.lobbies.client_lobby(5), None);
        assert_eq!(f.outbox.payloads_for(5), vec![broadcast::lobby_left(true)]);
        assert!(f.run(admin, "close 1").starts_with("ERROR"));
    }

    #[test]
    fn test_players_and_unknown_command() {
        let mut f = Fixture::new();
        let admin = f.connect(9000);
        f.connect(9001);
        f.admin.authenticate(admin, "secret");

        let reply = f.run(admin, "players");
        assert!(reply.starts_with("OK: 2 clients"));
        assert!(reply.contains("127.0.0.1:9001"));
        assert!(f.run(admin, "reboot").starts_with("ERROR: Unknown"));
        assert_eq!(f.run(admin, "   "), HELP);
    }

    #[test]
    fn test_session_timeout() {
        let mut f = Fixture::new();
        f.admin.authenticate(3, "secret");
        assert!(f.admin.cleanup_inactive(SESSION_TIMEOUT).is_empty());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(f.admin.cleanup_inactive(Duration::from_millis(1)), vec![3]);
        assert!(!f.admin.is_admin(3));
    }
}
