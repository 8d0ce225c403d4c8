//! Server core: opcode dispatch and the fixed-timestep simulation lane

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[cfg(feature = "admin")]
use crate::admin::{self, AdminManager};
use crate::codec::compression::CompressionConfig;
use crate::config::ServerConfig;
use crate::game::SessionSettings;
use crate::lobby::LobbyManager;
use crate::metrics::Metrics;
use crate::net::broadcast;
use crate::net::connection::ConnectionTable;
use crate::net::inbound::{InboundPacket, InboundQueue, InboundSender};
use crate::net::outbox::{OutboundPacket, Outbox};
#[cfg(feature = "admin")]
use crate::net::protocol::OpCode;
use crate::net::protocol::ClientMessage;
use crate::net::transport;

/// Ticks run per wake before lag is discarded
pub const MAX_CATCH_UP_STEPS: u32 = 5;
/// Client timeout and lobby sweep period, seconds
pub const HOUSEKEEPING_INTERVAL: f32 = 5.0;
/// LobbyList push to clients outside any lobby, seconds
pub const LOBBY_LIST_INTERVAL: f32 = 2.0;
/// Metrics log period, seconds
pub const METRICS_LOG_INTERVAL: f32 = 30.0;

/// Advance `timer` by `dt`; true (and reset) once `period` has passed
fn due(timer: &mut f32, dt: f32, period: f32) -> bool {
    *timer += dt;
    if *timer >= period {
        *timer = 0.0;
        true
    } else {
        false
    }
}

/// Compressed LobbyList to every connected client not in a lobby
fn push_lobby_list(lobbies: &LobbyManager, connections: &ConnectionTable, outbox: &mut Outbox) {
    let mut idle: Vec<u32> = connections
        .ids()
        .into_iter()
        .filter(|&id| lobbies.client_lobby(id).is_none())
        .collect();
    if idle.is_empty() {
        return;
    }
    idle.sort_unstable();
    outbox.broadcast(&idle, &broadcast::lobby_list(&lobbies.list_lobbies()));
}

/// State owned by the simulation lane
pub struct Server {
    config: ServerConfig,
    lobbies: Arc<Mutex<LobbyManager>>,
    connections: Arc<Mutex<ConnectionTable>>,
    inbound: InboundQueue,
    #[cfg(feature = "admin")]
    admin: AdminManager,
    metrics: Arc<Metrics>,
    outbox: Outbox,
    housekeeping_timer: f32,
    lobby_list_timer: f32,
    metrics_timer: f32,
}

impl Server {
    pub fn new(config: ServerConfig, metrics: Arc<Metrics>) -> Self {
        let lobbies = LobbyManager::new(config.max_lobbies, config.max_players_per_lobby);
        let outbox = Outbox::new(CompressionConfig {
            min_size: config.compression_min_size,
            enabled: true,
        });
        Self {
            lobbies: Arc::new(Mutex::new(lobbies)),
            connections: Arc::new(Mutex::new(ConnectionTable::new())),
            inbound: InboundQueue::new(config.inbound_queue_capacity),
            #[cfg(feature = "admin")]
            admin: AdminManager::new(config.admin_password.clone()),
            metrics,
            outbox,
            housekeeping_timer: 0.0,
            lobby_list_timer: 0.0,
            metrics_timer: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn inbound_sender(&self) -> InboundSender {
        self.inbound.sender()
    }

    pub fn connections(&self) -> Arc<Mutex<ConnectionTable>> {
        self.connections.clone()
    }

    pub fn lobbies(&self) -> Arc<Mutex<LobbyManager>> {
        self.lobbies.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// One fixed step: drain input, tick every lobby, housekeeping
    ///
    /// Returns the packets to hand to the send task.
    pub fn tick(&mut self, dt: f32) -> Vec<OutboundPacket> {
        let started = Instant::now();

        for packet in self.inbound.drain() {
            self.handle_packet(packet);
        }
        self.lobbies.lock().update_all(dt, &mut self.outbox);
        self.housekeeping(dt);

        self.metrics.record_tick_time(started.elapsed());
        self.outbox.drain()
    }

    fn handle_packet(&mut self, packet: InboundPacket) {
        match ClientMessage::decode(&packet.data) {
            Ok(msg) => self.dispatch(packet.client_id, msg),
            Err(e) => {
                debug!("Dropping packet from client {}: {}", packet.client_id, e);
                self.metrics.record_decode_error();
            }
        }
    }

    /// Route one decoded message
    pub fn dispatch(&mut self, client_id: u32, msg: ClientMessage) {
        let mut lobbies = self.lobbies.lock();
        let outbox = &mut self.outbox;

        match msg {
            ClientMessage::Login => {
                info!("Client {} logged in", client_id);
                outbox.send(client_id, broadcast::login_ack(client_id));
            }
            // Activity was refreshed when the datagram arrived
            ClientMessage::Keepalive => {}
            ClientMessage::ListLobbies => {
                outbox.send_compressed(client_id, &broadcast::lobby_list(&lobbies.list_lobbies()));
            }
            ClientMessage::CreateLobby {
                name,
                friendly_fire,
                difficulty,
            } => {
                let settings = SessionSettings {
                    friendly_fire,
                    difficulty,
                };
                let reply = match lobbies.create_lobby(name.as_deref(), settings) {
                    Ok(lobby_id) => match lobbies.join_lobby(client_id, lobby_id, outbox) {
                        Ok(()) => broadcast::lobby_joined(true, lobby_id),
                        Err(e) => {
                            warn!("Client {} could not join new lobby {}: {}", client_id, lobby_id, e);
                            broadcast::lobby_joined(false, lobby_id)
                        }
                    },
                    Err(e) => {
                        warn!("Client {} could not create a lobby: {}", client_id, e);
                        broadcast::lobby_joined(false, -1)
                    }
                };
                outbox.send(client_id, reply);
                push_lobby_list(&lobbies, &self.connections.lock(), outbox);
            }
            ClientMessage::JoinLobby(lobby_id) => {
                let joined = match lobbies.join_lobby(client_id, lobby_id, outbox) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("Client {} could not join lobby {}: {}", client_id, lobby_id, e);
                        false
                    }
                };
                outbox.send(client_id, broadcast::lobby_joined(joined, lobby_id));
                if joined {
                    push_lobby_list(&lobbies, &self.connections.lock(), outbox);
                }
            }
            ClientMessage::LeaveLobby => {
                let left = lobbies.leave_lobby(client_id, outbox).is_ok();
                outbox.send(client_id, broadcast::lobby_left(left));
                if left {
                    push_lobby_list(&lobbies, &self.connections.lock(), outbox);
                }
            }
            #[cfg(feature = "admin")]
            ClientMessage::AdminLogin(password) => {
                let reply = if self.admin.authenticate(client_id, &password) {
                    "OK: Authenticated"
                } else {
                    "ERROR: Invalid password"
                };
                outbox.send(client_id, broadcast::admin_text(OpCode::AdminLoginAck, reply));
            }
            #[cfg(feature = "admin")]
            ClientMessage::AdminCommand(command) => {
                let reply = self.admin.execute(
                    client_id,
                    &command,
                    &mut lobbies,
                    &mut self.connections.lock(),
                    outbox,
                );
                outbox.send(client_id, broadcast::admin_text(OpCode::AdminResponse, &reply));
            }
            #[cfg(feature = "admin")]
            ClientMessage::AdminLogout => {
                self.admin.logout(client_id);
            }
            #[cfg(not(feature = "admin"))]
            ClientMessage::AdminLogin(_)
            | ClientMessage::AdminCommand(_)
            | ClientMessage::AdminLogout => {
                debug!("Admin surface disabled, ignoring client {}", client_id);
            }
            other => {
                if !lobbies.dispatch(client_id, &other, outbox) {
                    debug!("Client {} sent {:?} outside a lobby", client_id, other.opcode());
                }
            }
        }
    }

    fn housekeeping(&mut self, dt: f32) {
        if due(&mut self.housekeeping_timer, dt, HOUSEKEEPING_INTERVAL) {
            let stale = self
                .connections
                .lock()
                .remove_inactive(self.config.client_timeout);
            let mut lobbies = self.lobbies.lock();
            for client_id in stale {
                info!("Client {} timed out", client_id);
                lobbies.handle_client_disconnect(client_id, &mut self.outbox);
                #[cfg(feature = "admin")]
                self.admin.logout(client_id);
            }
            for lobby_id in lobbies.cleanup_inactive(self.config.lobby_timeout) {
                debug!("Swept lobby {}", lobby_id);
            }
            #[cfg(feature = "admin")]
            self.admin.cleanup_inactive(admin::SESSION_TIMEOUT);
        }

        if due(&mut self.lobby_list_timer, dt, LOBBY_LIST_INTERVAL) {
            push_lobby_list(&self.lobbies.lock(), &self.connections.lock(), &mut self.outbox);
        }

        self.metrics
            .set_population(self.lobbies.lock().lobby_count(), self.connections.lock().len());
        if due(&mut self.metrics_timer, dt, METRICS_LOG_INTERVAL) {
            self.metrics.log_summary();
        }
    }

    /// Simulation lane: whole fixed steps driven by a wall-clock accumulator
    pub async fn run(mut self, outbound: mpsc::Sender<OutboundPacket>, shutdown: Arc<AtomicBool>) {
        let step = self.config.tick_duration();
        let mut ticker = interval(Duration::from_secs_f32(step));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Simulation lane started at {} Hz", self.config.tick_rate);
        let mut last = Instant::now();
        let mut accumulator = 0.0f32;

        while !shutdown.load(Ordering::Relaxed) {
            ticker.tick().await;
            let now = Instant::now();
            accumulator += now.duration_since(last).as_secs_f32();
            last = now;

            let mut steps = 0;
            while accumulator >= step && steps < MAX_CATCH_UP_STEPS {
                for packet in self.tick(step) {
                    match outbound.try_send(packet) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!("Outbound queue full, dropping packet");
                            self.metrics.record_dropped();
                        }
                        Err(TrySendError::Closed(_)) => {
                            info!("Send lane closed, stopping simulation");
                            return;
                        }
                    }
                }
                accumulator -= step;
                steps += 1;
            }
            if accumulator >= step {
                warn!(
                    "Simulation {:.1} ms behind, discarding lag",
                    accumulator * 1000.0
                );
                accumulator = 0.0;
            }
        }
        info!("Simulation lane stopped");
    }
}

/// Running server: bound address plus the three lane tasks
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Raise the shutdown flag and wait for every lane to exit
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Lane task failed: {}", e);
            }
        }
    }
}

/// Bind the socket and spawn the receive, simulation, and send lanes
pub async fn start(config: ServerConfig) -> std::io::Result<ServerHandle> {
    let socket = Arc::new(UdpSocket::bind(config.socket_addr()).await?);
    let local_addr = socket.local_addr()?;
    let metrics = Arc::new(Metrics::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    let server = Server::new(config, metrics.clone());
    let (outbound_tx, outbound_rx) = mpsc::channel(server.config().outbound_queue_capacity);
    let connections = server.connections();

    let receive = tokio::spawn(transport::receive_loop(
        socket.clone(),
        connections.clone(),
        server.inbound_sender(),
        metrics.clone(),
        shutdown.clone(),
    ));
    let simulate = tokio::spawn(server.run(outbound_tx, shutdown.clone()));
    // Ends once the simulation lane drops its sender
    let send = tokio::spawn(transport::send_loop(
        socket,
        connections,
        outbound_rx,
        metrics.clone(),
    ));

    info!("Listening on udp://{}", local_addr);
    Ok(ServerHandle {
        local_addr,
        shutdown,
        metrics,
        tasks: vec![receive, simulate, send],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compression::decompress;
    use crate::lobby::LobbyState;
    use crate::net::protocol::{marker, parse_header, OpCode};

    const DT: f32 = 1.0 / 60.0;

    fn server() -> Server {
        Server::new(ServerConfig::default(), Arc::new(Metrics::new()))
    }

    fn push(server: &Server, client_id: u32, msg: &ClientMessage) {
        server
            .inbound_sender()
            .try_push(InboundPacket {
                client_id,
                data: msg.encode(),
            })
            .unwrap();
    }

    fn payloads_for(packets: &[OutboundPacket], client_id: u32) -> Vec<Vec<u8>> {
        packets
            .iter()
            .filter(|p| p.targets.contains(&client_id))
            .filter_map(|p| p.payload().ok())
            .collect()
    }

    fn opcodes_for(packets: &[OutboundPacket], client_id: u32) -> Vec<u8> {
        payloads_for(packets, client_id).iter().map(|p| p[2]).collect()
    }

    fn connect(server: &Server, port: u16) -> u32 {
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        server.connections().lock().register(addr).0
    }

    #[test]
    fn test_login_ack_carries_client_id() {
        let mut server = server();
        push(&server, 7, &ClientMessage::Login);
        let out = server.tick(DT);

        let packet = out.iter().find(|p| p.targets.contains(&7)).unwrap();
        assert!(!packet.framed);
        let (opcode, mut r) = parse_header(&packet.data).unwrap();
        assert_eq!(opcode, OpCode::LoginAck);
        assert_eq!(r.read_u32().unwrap(), 7);
    }

    #[test]
    fn test_create_then_join() {
        let mut server = server();
        push(
            &server,
            1,
            &ClientMessage::CreateLobby {
                name: Some("Alpha".to_string()),
                friendly_fire: false,
                difficulty: 1,
            },
        );
        push(&server, 2, &ClientMessage::JoinLobby(1));
        push(&server, 3, &ClientMessage::JoinLobby(99));
        let out = server.tick(DT);

        assert!(payloads_for(&out, 1).contains(&broadcast::lobby_joined(true, 1)));
        assert!(payloads_for(&out, 2).contains(&broadcast::lobby_joined(true, 1)));
        assert!(payloads_for(&out, 3).contains(&broadcast::lobby_joined(false, 99)));

        let lobbies = server.lobbies();
        let lobbies = lobbies.lock();
        assert_eq!(lobbies.client_lobby(1), Some(1));
        assert_eq!(lobbies.client_lobby(2), Some(1));
        assert_eq!(lobbies.lobby(1).unwrap().name(), "Alpha");
    }

    #[test]
    fn test_leave_lobby_ack() {
        let mut server = server();
        push(&server, 1, &ClientMessage::LeaveLobby);
        let out = server.tick(DT);
        assert_eq!(payloads_for(&out, 1), vec![broadcast::lobby_left(false)]);

        push(
            &server,
            1,
            &ClientMessage::CreateLobby {
                name: None,
                friendly_fire: false,
                difficulty: 0,
            },
        );
        server.tick(DT);
        push(&server, 1, &ClientMessage::LeaveLobby);
        let out = server.tick(DT);
        assert!(payloads_for(&out, 1).contains(&broadcast::lobby_left(true)));
    }

    #[test]
    fn test_ready_starts_game() {
        let mut server = server();
        push(
            &server,
            1,
            &ClientMessage::CreateLobby {
                name: None,
                friendly_fire: false,
                difficulty: 1,
            },
        );
        server.tick(DT);
        push(&server, 1, &ClientMessage::PlayerReady(true));
        let out = server.tick(DT);

        assert!(opcodes_for(&out, 1).contains(&(OpCode::StartGame as u8)));
        assert_eq!(
            server.lobbies().lock().lobby(1).unwrap().state(),
            LobbyState::InGame
        );
    }

    #[test]
    fn test_bad_packets_counted() {
        let mut server = server();
        // Server-to-client opcode and a truncated JoinLobby
        for data in [marker(OpCode::LoginAck), marker(OpCode::JoinLobby)] {
            server
                .inbound_sender()
                .try_push(InboundPacket { client_id: 1, data })
                .unwrap();
        }
        let out = server.tick(DT);
        assert!(out.is_empty());
        assert_eq!(server.metrics().snapshot().decode_errors, 2);
    }

    #[test]
    fn test_gameplay_outside_lobby_ignored() {
        let mut server = server();
        push(&server, 4, &ClientMessage::Input { keys: 1, sequence: 0 });
        assert!(server.tick(DT).is_empty());
    }

    #[test]
    fn test_lobby_list_pushed_to_idle_clients() {
        let mut server = server();
        let idle = connect(&server, 5000);
        let busy = connect(&server, 5001);
        push(
            &server,
            busy,
            &ClientMessage::CreateLobby {
                name: None,
                friendly_fire: false,
                difficulty: 1,
            },
        );
        server.tick(DT);

        let out = server.tick(LOBBY_LIST_INTERVAL);
        let idle_ops = opcodes_for(&out, idle);
        assert!(idle_ops.contains(&(OpCode::LobbyList as u8)));
        assert!(!opcodes_for(&out, busy).contains(&(OpCode::LobbyList as u8)));

        let list = payloads_for(&out, idle)
            .into_iter()
            .find(|p| p[2] == OpCode::LobbyList as u8)
            .unwrap();
        assert_eq!(list[3], 1);
    }

    #[test]
    fn test_client_timeout_leaves_lobby() {
        let config = ServerConfig {
            client_timeout: Duration::from_millis(1),
            ..ServerConfig::default()
        };
        let mut server = Server::new(config, Arc::new(Metrics::new()));
        let a = connect(&server, 6000);
        let b = connect(&server, 6001);
        push(&server, a, &ClientMessage::CreateLobby {
            name: None,
            friendly_fire: false,
            difficulty: 1,
        });
        push(&server, b, &ClientMessage::JoinLobby(1));
        server.tick(DT);

        std::thread::sleep(Duration::from_millis(5));
        server.tick(HOUSEKEEPING_INTERVAL);

        assert!(server.connections().lock().is_empty());
        assert_eq!(server.lobbies().lock().client_count(), 0);
        assert_eq!(server.metrics().snapshot().clients, 0);
    }

    #[cfg(feature = "admin")]
    #[test]
    fn test_admin_login_and_command() {
        let mut server = server();
        push(&server, 1, &ClientMessage::AdminCommand("status".to_string()));
        push(&server, 1, &ClientMessage::AdminLogin("nope".to_string()));
        push(&server, 1, &ClientMessage::AdminLogin("admin123".to_string()));
        push(&server, 1, &ClientMessage::AdminCommand("status".to_string()));
        let out = server.tick(DT);

        let texts: Vec<(OpCode, String)> = payloads_for(&out, 1)
            .iter()
            .map(|p| {
                let (opcode, mut r) = parse_header(p).unwrap();
                (opcode, r.read_string().unwrap())
            })
            .collect();
        assert_eq!(texts[0], (OpCode::AdminResponse, "ERROR: Not authenticated".to_string()));
        assert_eq!(texts[1], (OpCode::AdminLoginAck, "ERROR: Invalid password".to_string()));
        assert_eq!(texts[2], (OpCode::AdminLoginAck, "OK: Authenticated".to_string()));
        assert_eq!(texts[3].0, OpCode::AdminResponse);
        assert!(texts[3].1.starts_with("OK: {"));
    }

    async fn recv_opcode(socket: &UdpSocket, opcode: OpCode) -> Vec<u8> {
        let mut buf = vec![0u8; transport::MAX_DATAGRAM_SIZE];
        loop {
            let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
                .await
                .expect("no reply from server")
                .unwrap();
            let data = &buf[..len];
            let payload = if data[0] <= 1 {
                decompress(data).unwrap()
            } else {
                data.to_vec()
            };
            if payload[2] == opcode as u8 {
                return payload;
            }
        }
    }

    #[tokio::test]
    async fn test_end_to_end_over_udp() {
        let config = ServerConfig {
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 0,
            ..ServerConfig::default()
        };
        let handle = start(config).await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(handle.local_addr()).await.unwrap();

        client.send(&ClientMessage::Login.encode()).await.unwrap();
        let ack = recv_opcode(&client, OpCode::LoginAck).await;
        let (_, mut r) = parse_header(&ack).unwrap();
        assert_eq!(r.read_u32().unwrap(), 1);

        let create = ClientMessage::CreateLobby {
            name: Some("Net".to_string()),
            friendly_fire: false,
            difficulty: 1,
        };
        client.send(&create.encode()).await.unwrap();
        let joined = recv_opcode(&client, OpCode::LobbyJoined).await;
        assert_eq!(joined, broadcast::lobby_joined(true, 1));

        assert!(handle.metrics().snapshot().packets_received >= 2);
        handle.shutdown().await;
    }
}
