//! Packet envelope and opcode table
//!
//! Every datagram (after compression framing is removed) starts with
//! `[u16 magic][u8 opcode]`, little-endian. Packets with the wrong magic are
//! dropped before opcode dispatch.

use crate::codec::binary::{BinaryReader, BinaryWriter, DecodeError};

/// Envelope magic, on the wire as `0x42 0xB5`
pub const MAGIC: u16 = 0xB542;
/// Magic plus opcode
pub const HEADER_SIZE: usize = 3;

/// Network id bases, added to the registry index of non-player entities
pub mod network_id {
    pub const ENEMY_OFFSET: u32 = 10_000;
    pub const PROJECTILE_OFFSET: u32 = 20_000;
    pub const OTHER_OFFSET: u32 = 30_000;
}

/// Protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Packet too short: {0} bytes")]
    TooShort(usize),
    #[error("Bad magic: {0:#06x}")]
    BadMagic(u16),
    #[error("Unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

macro_rules! opcodes {
    ($($name:ident = $value:literal),* $(,)?) => {
        /// One-byte packet tag
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $($name = $value),*
        }

        impl TryFrom<u8> for OpCode {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(OpCode::$name),)*
                    other => Err(ProtocolError::UnknownOpcode(other)),
                }
            }
        }
    };
}

opcodes! {
    Login = 0x01,
    LoginAck = 0x02,
    Keepalive = 0x03,
    Input = 0x10,
    EntityPosition = 0x13,
    PlayerReady = 0x20,
    LobbyStatus = 0x21,
    StartGame = 0x22,
    LevelStart = 0x30,
    LevelComplete = 0x31,
    WeaponUpgradeChoice = 0x32,
    LevelProgress = 0x33,
    PowerUpChoice = 0x34,
    PowerUpActivate = 0x35,
    PowerUpStatus = 0x36,
    PowerUpCards = 0x37,
    ActivableSlots = 0x38,
    GameOver = 0x40,
    BossSpawn = 0x50,
    ListLobbies = 0x61,
    LobbyList = 0x62,
    CreateLobby = 0x63,
    JoinLobby = 0x64,
    LobbyJoined = 0x65,
    LeaveLobby = 0x66,
    LobbyLeft = 0x67,
    AdminLogin = 0x70,
    AdminLoginAck = 0x71,
    AdminCommand = 0x72,
    AdminResponse = 0x73,
    AdminLogout = 0x74,
}

/// Entity category tag carried in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntityType {
    Player = 0x01,
    Enemy = 0x02,
    Projectile = 0x03,
    Powerup = 0x04,
    Obstacle = 0x05,
    Enemy2 = 0x06,
    EnemyProjectile = 0x07,
    Boss = 0x08,
    HomingEnemy = 0x09,
    SerpentHead = 0x0A,
    SerpentBody = 0x0B,
    SerpentScale = 0x0C,
    SerpentTail = 0x0D,
    Explosion = 0x0E,
}

impl EntityType {
    pub fn is_enemy(self) -> bool {
        matches!(
            self,
            EntityType::Enemy | EntityType::Enemy2 | EntityType::HomingEnemy | EntityType::Boss
        )
    }

    pub fn is_projectile(self) -> bool {
        matches!(self, EntityType::Projectile | EntityType::EnemyProjectile)
    }

    pub fn is_serpent(self) -> bool {
        matches!(
            self,
            EntityType::SerpentHead
                | EntityType::SerpentBody
                | EntityType::SerpentScale
                | EntityType::SerpentTail
        )
    }

    /// Base added to the registry index to form the network id
    ///
    /// Homing enemies share the enemy range since clients treat them as enemies.
    pub fn network_offset(self) -> u32 {
        if self.is_enemy() {
            network_id::ENEMY_OFFSET
        } else if self.is_projectile() {
            network_id::PROJECTILE_OFFSET
        } else {
            network_id::OTHER_OFFSET
        }
    }
}

/// Start a packet: magic followed by `opcode`
pub fn packet(opcode: OpCode) -> BinaryWriter {
    let mut writer = BinaryWriter::with_capacity(64);
    writer.write_u16(MAGIC).write_u8(opcode as u8);
    writer
}

/// Header-only packet
pub fn marker(opcode: OpCode) -> Vec<u8> {
    packet(opcode).into_inner()
}

/// Validate the envelope and return the opcode plus a reader over the payload
pub fn parse_header(data: &[u8]) -> Result<(OpCode, BinaryReader<'_>), ProtocolError> {
    if data.len() < HEADER_SIZE {
        return Err(ProtocolError::TooShort(data.len()));
    }
    let mut reader = BinaryReader::new(data);
    let magic = reader.read_u16()?;
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }
    let opcode = OpCode::try_from(reader.read_u8()?)?;
    Ok((opcode, reader))
}

/// Cheap magic check used by the receive lane
#[inline]
pub fn has_magic(data: &[u8]) -> bool {
    data.len() >= 2 && u16::from_le_bytes([data[0], data[1]]) == MAGIC
}

/// Decoded client-to-server message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Login,
    Keepalive,
    Input { keys: u8, sequence: u32 },
    PlayerReady(bool),
    StartGame,
    WeaponUpgradeChoice(u8),
    /// 1-based card index
    PowerUpChoice(u8),
    PowerUpActivate(u8),
    ListLobbies,
    CreateLobby {
        name: Option<String>,
        friendly_fire: bool,
        difficulty: u8,
    },
    JoinLobby(i32),
    LeaveLobby,
    AdminLogin(String),
    AdminCommand(String),
    AdminLogout,
}

impl ClientMessage {
    /// Decode a full packet (envelope included)
    ///
    /// Server-to-client opcodes are reported as unknown.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (opcode, mut r) = parse_header(data)?;

        let message = match opcode {
            OpCode::Login => ClientMessage::Login,
            OpCode::Keepalive => ClientMessage::Keepalive,
            OpCode::Input => {
                let keys = r.read_u8()?;
                // Older clients omit the sequence number
                let sequence = if r.remaining_len() >= 4 { r.read_u32()? } else { 0 };
                ClientMessage::Input { keys, sequence }
            }
            OpCode::PlayerReady => ClientMessage::PlayerReady(r.read_bool()?),
            OpCode::StartGame => ClientMessage::StartGame,
            OpCode::WeaponUpgradeChoice => ClientMessage::WeaponUpgradeChoice(r.read_u8()?),
            OpCode::PowerUpChoice => ClientMessage::PowerUpChoice(r.read_u8()?),
            OpCode::PowerUpActivate => ClientMessage::PowerUpActivate(r.read_u8()?),
            OpCode::ListLobbies => ClientMessage::ListLobbies,
            OpCode::CreateLobby => {
                let name = if r.has_remaining() {
                    Some(r.read_string()?).filter(|n| !n.is_empty())
                } else {
                    None
                };
                let friendly_fire = if r.has_remaining() { r.read_bool()? } else { false };
                let difficulty = if r.has_remaining() { r.read_u8()? } else { 1 };
                ClientMessage::CreateLobby {
                    name,
                    friendly_fire,
                    difficulty,
                }
            }
            OpCode::JoinLobby => ClientMessage::JoinLobby(r.read_i32()?),
            OpCode::LeaveLobby => ClientMessage::LeaveLobby,
            OpCode::AdminLogin => ClientMessage::AdminLogin(r.read_string()?),
            OpCode::AdminCommand => ClientMessage::AdminCommand(r.read_string()?),
            OpCode::AdminLogout => ClientMessage::AdminLogout,
            other => return Err(ProtocolError::UnknownOpcode(other as u8)),
        };
        Ok(message)
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            ClientMessage::Login => OpCode::Login,
            ClientMessage::Keepalive => OpCode::Keepalive,
            ClientMessage::Input { .. } => OpCode::Input,
            ClientMessage::PlayerReady(_) => OpCode::PlayerReady,
            ClientMessage::StartGame => OpCode::StartGame,
            ClientMessage::WeaponUpgradeChoice(_) => OpCode::WeaponUpgradeChoice,
            ClientMessage::PowerUpChoice(_) => OpCode::PowerUpChoice,
            ClientMessage::PowerUpActivate(_) => OpCode::PowerUpActivate,
            ClientMessage::ListLobbies => OpCode::ListLobbies,
            ClientMessage::CreateLobby { .. } => OpCode::CreateLobby,
            ClientMessage::JoinLobby(_) => OpCode::JoinLobby,
            ClientMessage::LeaveLobby => OpCode::LeaveLobby,
            ClientMessage::AdminLogin(_) => OpCode::AdminLogin,
            ClientMessage::AdminCommand(_) => OpCode::AdminCommand,
            ClientMessage::AdminLogout => OpCode::AdminLogout,
        }
    }

    /// Encode as a client would send it
    pub fn encode(&self) -> Vec<u8> {
        let mut w = packet(self.opcode());
        match self {
            ClientMessage::Input { keys, sequence } => {
                w.write_u8(*keys).write_u32(*sequence);
            }
            ClientMessage::PlayerReady(ready) => {
                w.write_bool(*ready);
            }
            ClientMessage::WeaponUpgradeChoice(v)
            | ClientMessage::PowerUpChoice(v)
            | ClientMessage::PowerUpActivate(v) => {
                w.write_u8(*v);
            }
            ClientMessage::CreateLobby {
                name,
                friendly_fire,
                difficulty,
            } => {
                w.write_string(name.as_deref().unwrap_or(""))
                    .write_bool(*friendly_fire)
                    .write_u8(*difficulty);
            }
            ClientMessage::JoinLobby(id) => {
                w.write_i32(*id);
            }
            ClientMessage::AdminLogin(s) | ClientMessage::AdminCommand(s) => {
                w.write_string(s);
            }
            ClientMessage::Login
            | ClientMessage::Keepalive
            | ClientMessage::StartGame
            | ClientMessage::ListLobbies
            | ClientMessage::LeaveLobby
            | ClientMessage::AdminLogout => {}
        }
        w.into_inner()
    }
}
