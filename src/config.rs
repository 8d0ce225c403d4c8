use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the UDP socket to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Maximum number of concurrent lobbies
    pub max_lobbies: usize,
    /// Capacity given to new lobbies
    pub max_players_per_lobby: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Datagrams buffered between the receive task and the simulation
    pub inbound_queue_capacity: usize,
    /// Packets buffered between the simulation and the send task
    pub outbound_queue_capacity: usize,
    /// Silence after which a client is dropped
    pub client_timeout: Duration,
    /// Idle time after which a lobby not in game is removed
    pub lobby_timeout: Duration,
    /// Smallest payload the compression layer tries to shrink
    pub compression_min_size: usize,
    /// Password for the admin surface
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4242,
            max_lobbies: 64,
            max_players_per_lobby: 4,
            tick_rate: 60,
            inbound_queue_capacity: 4096,
            outbound_queue_capacity: 8192,
            client_timeout: Duration::from_secs(300),
            lobby_timeout: Duration::from_secs(300),
            compression_min_size: 128,
            admin_password: "admin123".to_string(),
        }
    }
}

/// Parse `name` from the environment; `None` (with a warning) when invalid
fn env_value<T: FromStr>(name: &str, accept: impl Fn(&T) -> bool, expected: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be {}, using default", name, expected);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_value::<IpAddr>("BIND_ADDRESS", |_| true, "an IP address") {
            config.bind_address = addr;
        }
        if let Some(port) = env_value::<u16>("PORT", |&p| p > 0, "> 0") {
            config.port = port;
        }
        if let Some(n) = env_value("MAX_LOBBIES", |&n: &usize| (1..=10_000).contains(&n), "1-10000") {
            config.max_lobbies = n;
        }
        if let Some(n) = env_value(
            "MAX_PLAYERS_PER_LOBBY",
            |&n: &usize| (1..=255).contains(&n),
            "1-255",
        ) {
            config.max_players_per_lobby = n;
        }
        if let Some(n) = env_value("TICK_RATE", |&n: &u32| (1..=240).contains(&n), "1-240") {
            config.tick_rate = n;
        }
        if let Some(n) = env_value("INBOUND_QUEUE_CAPACITY", |&n: &usize| n > 0, "> 0") {
            config.inbound_queue_capacity = n;
        }
        if let Some(n) = env_value("OUTBOUND_QUEUE_CAPACITY", |&n: &usize| n > 0, "> 0") {
            config.outbound_queue_capacity = n;
        }
        if let Some(secs) = env_value("CLIENT_TIMEOUT_SECS", |&n: &u64| n > 0, "> 0") {
            config.client_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_value("LOBBY_TIMEOUT_SECS", |&n: &u64| n > 0, "> 0") {
            config.lobby_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_value::<usize>("COMPRESSION_MIN_SIZE", |_| true, "a size in bytes") {
            config.compression_min_size = n;
        }
        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            if password.is_empty() {
                tracing::warn!("ADMIN_PASSWORD is empty, using default");
            } else {
                config.admin_password = password;
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.max_lobbies == 0 {
            return Err("max_lobbies must be at least 1".to_string());
        }
        if self.max_players_per_lobby == 0 || self.max_players_per_lobby > 255 {
            return Err("max_players_per_lobby must be 1-255".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        if self.inbound_queue_capacity == 0 || self.outbound_queue_capacity == 0 {
            return Err("queue capacities must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Fixed simulation step in seconds
    pub fn tick_duration(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
