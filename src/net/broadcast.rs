//! Server-to-client packet builders
//!
//! Everything here returns a complete envelope (magic, opcode, payload).
//! Whether a packet is compressed is decided by the [`Outbox`] call used to
//! queue it.
//!
//! [`Outbox`]: crate::net::outbox::Outbox

use std::collections::BTreeMap;

use crate::codec::{BinaryWriter, QuantizedWrite};
use crate::ecs::{Entity, Registry};
use crate::game::components::{
    EntityTag, Health, Invulnerable, Player, Position, SerpentPart, Velocity,
};
use crate::game::powerup::{ActivableSlot, PowerupCard, PowerupId};
use crate::lobby::LobbyInfo;
use crate::net::protocol::{marker, network_id, packet, EntityType, OpCode};

/// Most entities a single snapshot can describe
pub const MAX_SNAPSHOT_ENTITIES: usize = u8::MAX as usize;

/// Bytes of 0xFF after the GameOver opcode
const GAME_OVER_PADDING: usize = 20;

fn write_motion(w: &mut BinaryWriter, reg: &Registry, e: Entity) {
    let pos = reg.get::<Position>(e).copied().unwrap_or_default();
    let vel = reg.get::<Velocity>(e).copied().unwrap_or_default();
    w.write_position(pos.x, pos.y).write_velocity(vel.vx, vel.vy);
}

/// Reported for a player or boss that carries no Health component
const FALLBACK_HEALTH: i32 = 100;

fn write_health(w: &mut BinaryWriter, reg: &Registry, e: Entity) {
    let (current, maximum) = reg
        .get::<Health>(e)
        .map(|h| (h.current, h.maximum))
        .unwrap_or((FALLBACK_HEALTH, FALLBACK_HEALTH));
    w.write_quantized_health(current, maximum);
}

/// EntityPosition snapshot of every player and tagged entity
///
/// Players are keyed by client id, everything else by category offset plus
/// registry index. `None` when there is nothing to describe.
pub fn entity_snapshot(reg: &Registry, clients: &BTreeMap<u32, Entity>) -> Option<Vec<u8>> {
    let mut w = packet(OpCode::EntityPosition);
    let count_at = w.len();
    w.write_u8(0);
    let mut count = 0usize;

    for (&client_id, &e) in clients {
        if count == MAX_SNAPSHOT_ENTITIES {
            break;
        }
        if !reg.is_alive(e) || !reg.has::<Position>(e) {
            continue;
        }
        let index = reg.get::<Player>(e).map(|p| p.index).unwrap_or_default();
        w.write_u32(client_id)
            .write_u8(EntityType::Player as u8)
            .write_u8(index);
        write_motion(&mut w, reg, e);
        write_health(&mut w, reg, e);
        count += 1;
    }

    for e in reg.join2::<EntityTag, Position>() {
        if count == MAX_SNAPSHOT_ENTITIES {
            break;
        }
        let Some(kind) = reg.get::<EntityTag>(e).map(|t| t.0) else {
            continue;
        };
        if kind == EntityType::Player {
            continue;
        }
        w.write_u32(kind.network_offset() + e.index() as u32)
            .write_u8(kind as u8);
        write_motion(&mut w, reg, e);

        if kind == EntityType::Boss || kind.is_serpent() {
            write_health(&mut w, reg, e);
            w.write_bool(reg.has::<Invulnerable>(e));
        }
        if let Some(part) = reg.get::<SerpentPart>(e) {
            w.write_f32(part.rotation);
            if kind == EntityType::SerpentScale {
                let attached = part
                    .attached_body
                    .filter(|b| reg.is_alive(*b))
                    .map_or(0, |b| network_id::OTHER_OFFSET + b.index() as u32);
                w.write_u32(attached);
            }
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }
    w.patch_u8(count_at, count as u8);
    Some(w.into_inner())
}

pub fn login_ack(client_id: u32) -> Vec<u8> {
    let mut w = packet(OpCode::LoginAck);
    w.write_u32(client_id);
    w.into_inner()
}

pub fn lobby_status(total: u8, ready: u8) -> Vec<u8> {
    let mut w = packet(OpCode::LobbyStatus);
    w.write_u8(total).write_u8(ready);
    w.into_inner()
}

pub fn lobby_list(lobbies: &[LobbyInfo]) -> Vec<u8> {
    let shown = &lobbies[..lobbies.len().min(u8::MAX as usize)];
    let mut w = packet(OpCode::LobbyList);
    w.write_u8(shown.len() as u8);
    for info in shown {
        w.write_i32(info.id)
            .write_string(&info.name)
            .write_i32(info.current_players as i32)
            .write_i32(info.max_players as i32)
            .write_u8(info.state as u8);
    }
    w.into_inner()
}

pub fn lobby_joined(success: bool, lobby_id: i32) -> Vec<u8> {
    let mut w = packet(OpCode::LobbyJoined);
    w.write_bool(success).write_i32(lobby_id);
    w.into_inner()
}

pub fn lobby_left(success: bool) -> Vec<u8> {
    let mut w = packet(OpCode::LobbyLeft);
    w.write_bool(success);
    w.into_inner()
}

pub fn start_game() -> Vec<u8> {
    marker(OpCode::StartGame)
}

pub fn boss_spawn() -> Vec<u8> {
    marker(OpCode::BossSpawn)
}

pub fn game_over() -> Vec<u8> {
    let mut w = packet(OpCode::GameOver);
    w.write_bytes(&[0xFF; GAME_OVER_PADDING]);
    w.into_inner()
}

pub fn level_start(level: u8) -> Vec<u8> {
    let mut w = packet(OpCode::LevelStart);
    // Empty level-id string
    w.write_u8(level).write_u8(0);
    w.into_inner()
}

pub fn level_progress(level: u8, kills: u16, needed: u16) -> Vec<u8> {
    let mut w = packet(OpCode::LevelProgress);
    w.write_u8(level).write_u16(kills).write_u16(needed.max(1));
    w.into_inner()
}

pub fn level_complete(completed: u8, next: u8) -> Vec<u8> {
    let mut w = packet(OpCode::LevelComplete);
    w.write_u8(completed).write_u8(next);
    w.into_inner()
}

/// Opens the between-level choice screen
pub fn powerup_selection() -> Vec<u8> {
    let mut w = packet(OpCode::PowerUpChoice);
    w.write_u8(1);
    w.into_inner()
}

pub fn powerup_cards(cards: &[PowerupCard]) -> Vec<u8> {
    let mut w = packet(OpCode::PowerUpCards);
    w.write_u8(cards.len() as u8);
    for card in cards {
        w.write_u8(card.id as u8).write_u8(card.level);
    }
    w.into_inner()
}

pub fn powerup_status(client_id: u32, id: PowerupId, time_remaining: f32) -> Vec<u8> {
    let mut w = packet(OpCode::PowerUpStatus);
    w.write_u32(client_id)
        .write_u8(id as u8)
        .write_f32(time_remaining);
    w.into_inner()
}

pub fn activable_slots(slots: &[ActivableSlot]) -> Vec<u8> {
    let mut w = packet(OpCode::ActivableSlots);
    for slot in slots {
        match slot.powerup {
            Some(id) => {
                w.write_bool(true)
                    .write_u8(id as u8)
                    .write_u8(slot.level)
                    .write_f32(slot.time_remaining)
                    .write_f32(slot.cooldown_remaining)
                    .write_bool(slot.active);
            }
            None => {
                w.write_bool(false);
            }
        }
    }
    w.into_inner()
}

/// AdminLoginAck or AdminResponse carrying a text message
pub fn admin_text(opcode: OpCode, message: &str) -> Vec<u8> {
    let mut w = packet(opcode);
    w.write_string(message);
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BinaryReader, QuantizedRead};
    use crate::game::components::{CollisionBox, SerpentPartKind};
    use crate::net::protocol::parse_header;

    fn player(reg: &mut Registry, client_id: u32, index: u8) -> Entity {
        let e = reg.spawn_entity();
        reg.add_component(e, Position::new(100.0, 300.0));
        reg.add_component(e, Velocity::new(300.0, 0.0));
        reg.add_component(e, Health::new(100));
        reg.add_component(e, EntityTag(EntityType::Player));
        reg.add_component(
            e,
            Player {
                client_id,
                index,
                keys: 0,
            },
        );
        e
    }

    #[test]
    fn test_empty_snapshot_suppressed() {
        let reg = Registry::new();
        assert!(entity_snapshot(&reg, &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_player_record() {
        let mut reg = Registry::new();
        let e = player(&mut reg, 7, 2);
        let clients = BTreeMap::from([(7, e)]);

        let data = entity_snapshot(&reg, &clients).unwrap();
        let (op, mut r) = parse_header(&data).unwrap();
        assert_eq!(op, OpCode::EntityPosition);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_u8().unwrap(), EntityType::Player as u8);
        assert_eq!(r.read_u8().unwrap(), 2);
        assert_eq!(r.read_position().unwrap(), (100.0, 300.0));
        assert_eq!(r.read_velocity().unwrap(), (300.0, 0.0));
        assert_eq!(r.read_quantized_health().unwrap(), (100, 100));
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_network_ids_and_boss_extras() {
        let mut reg = Registry::new();
        let enemy = reg.spawn_entity();
        reg.add_component(enemy, Position::new(1900.0, 500.0));
        reg.add_component(enemy, EntityTag(EntityType::Enemy));

        let boss = reg.spawn_entity();
        reg.add_component(boss, Position::new(1500.0, 540.0));
        reg.add_component(boss, Health::new(2000));
        reg.add_component(boss, CollisionBox::new(350.0, 500.0));
        reg.add_component(boss, EntityTag(EntityType::Boss));
        reg.add_component(boss, Invulnerable);

        let shot = reg.spawn_entity();
        reg.add_component(shot, Position::new(10.0, 10.0));
        reg.add_component(shot, EntityTag(EntityType::EnemyProjectile));

        let data = entity_snapshot(&reg, &BTreeMap::new()).unwrap();
        let (_, mut r) = parse_header(&data).unwrap();
        assert_eq!(r.read_u8().unwrap(), 3);

        assert_eq!(r.read_u32().unwrap(), 10_000);
        assert_eq!(r.read_u8().unwrap(), EntityType::Enemy as u8);
        r.read_position().unwrap();
        r.read_velocity().unwrap();

        assert_eq!(r.read_u32().unwrap(), 10_001);
        assert_eq!(r.read_u8().unwrap(), EntityType::Boss as u8);
        r.read_position().unwrap();
        r.read_velocity().unwrap();
        assert_eq!(r.read_quantized_health().unwrap(), (100, 100));
        assert!(r.read_bool().unwrap());

        assert_eq!(r.read_u32().unwrap(), 20_002);
        assert_eq!(r.read_u8().unwrap(), EntityType::EnemyProjectile as u8);
        r.read_position().unwrap();
        r.read_velocity().unwrap();
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_serpent_scale_extras() {
        let mut reg = Registry::new();
        let body = reg.spawn_entity();
        reg.add_component(body, Position::new(500.0, 500.0));
        reg.add_component(body, Health::new(100));
        reg.add_component(body, EntityTag(EntityType::SerpentBody));
        let mut part = SerpentPart::new(SerpentPartKind::Body, 2);
        part.rotation = 90.0;
        reg.add_component(body, part);

        let scale = reg.spawn_entity();
        reg.add_component(scale, Position::new(500.0, 500.0));
        reg.add_component(scale, Health::new(150));
        reg.add_component(scale, EntityTag(EntityType::SerpentScale));
        let mut part = SerpentPart::new(SerpentPartKind::Scale, 2);
        part.attached_body = Some(body);
        reg.add_component(scale, part);

        let data = entity_snapshot(&reg, &BTreeMap::new()).unwrap();
        let (_, mut r) = parse_header(&data).unwrap();
        assert_eq!(r.read_u8().unwrap(), 2);

        assert_eq!(r.read_u32().unwrap(), 30_000);
        assert_eq!(r.read_u8().unwrap(), EntityType::SerpentBody as u8);
        r.read_position().unwrap();
        r.read_velocity().unwrap();
        r.read_quantized_health().unwrap();
        assert!(!r.read_bool().unwrap());
        assert_eq!(r.read_f32().unwrap(), 90.0);

        assert_eq!(r.read_u32().unwrap(), 30_001);
        assert_eq!(r.read_u8().unwrap(), EntityType::SerpentScale as u8);
        r.read_position().unwrap();
        r.read_velocity().unwrap();
        r.read_quantized_health().unwrap();
        r.read_bool().unwrap();
        r.read_f32().unwrap();
        assert_eq!(r.read_u32().unwrap(), 30_000);
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_snapshot_count_capped() {
        let mut reg = Registry::new();
        for i in 0..300 {
            let e = reg.spawn_entity();
            reg.add_component(e, Position::new(i as f32, 0.0));
            reg.add_component(e, EntityTag(EntityType::Projectile));
        }
        let data = entity_snapshot(&reg, &BTreeMap::new()).unwrap();
        assert_eq!(data[3], 255);
    }

    #[test]
    fn test_fixed_layouts() {
        assert_eq!(game_over().len(), 3 + 20);
        assert_eq!(&lobby_status(3, 1)[3..], &[3, 1]);
        assert_eq!(&level_progress(2, 1, 0)[3..], &[2, 1, 0, 1, 0]);

        let slots = [ActivableSlot::default(); 2];
        assert_eq!(&activable_slots(&slots)[3..], &[0, 0]);

        let data = admin_text(OpCode::AdminResponse, "ok");
        let mut r = BinaryReader::new(&data[3..]);
        assert_eq!(r.read_string().unwrap(), "ok");
    }

    #[test]
    fn test_missing_health_reports_full() {
        let mut reg = Registry::new();
        let boss = reg.spawn_entity();
        reg.add_component(boss, Position::new(1500.0, 540.0));
        reg.add_component(boss, EntityTag(EntityType::Boss));

        let data = entity_snapshot(&reg, &BTreeMap::new()).unwrap();
        let (_, mut r) = parse_header(&data).unwrap();
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u32().unwrap(), 10_000);
        assert_eq!(r.read_u8().unwrap(), EntityType::Boss as u8);
        r.read_position().unwrap();
        r.read_velocity().unwrap();
        assert_eq!(r.read_quantized_health().unwrap(), (100, 100));
        assert!(!r.read_bool().unwrap());
    }
}
