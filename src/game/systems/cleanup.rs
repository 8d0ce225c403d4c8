//! End-of-tick removal of dead, expired and out-of-bounds entities

use crate::ecs::{Entity, Registry};
use crate::game::components::{EntityTag, Health, Lifetime, Player, Position};
use crate::game::constants::{enemy, world};
use crate::net::protocol::EntityType;

pub fn spawn_explosion(reg: &mut Registry, pos: Position, lifetime: f32) -> Entity {
    let e = reg.spawn_entity();
    reg.add_component(e, pos);
    reg.add_component(e, Lifetime(lifetime));
    reg.add_component(e, EntityTag(EntityType::Explosion));
    e
}

/// Count down lifetimes without removing anything
pub fn tick_lifetimes(reg: &mut Registry, dt: f32) {
    for e in reg.view::<Lifetime>() {
        if let Some(life) = reg.get_mut::<Lifetime>(e) {
            life.0 -= dt;
        }
    }
}

fn out_of_bounds(pos: &Position) -> bool {
    pos.x < world::CLEANUP_MIN_X
        || pos.x > world::CLEANUP_MAX_X
        || pos.y < world::CLEANUP_MIN_Y
        || pos.y > world::CLEANUP_MAX_Y
}

/// Boss and serpent parts are removed by their own controllers
fn managed_elsewhere(kind: EntityType) -> bool {
    kind == EntityType::Boss || kind.is_serpent()
}

/// Returns how many entities were removed
pub fn update(reg: &mut Registry) -> usize {
    let mut doomed: Vec<Entity> = Vec::new();
    let mut explosions: Vec<Position> = Vec::new();

    for e in reg.view::<EntityTag>() {
        if reg.has::<Player>(e) {
            continue;
        }
        let Some(kind) = reg.get::<EntityTag>(e).map(|t| t.0) else {
            continue;
        };
        if managed_elsewhere(kind) {
            continue;
        }

        if reg.get::<Health>(e).is_some_and(Health::is_dead) {
            if kind.is_enemy() {
                if let Some(pos) = reg.get::<Position>(e) {
                    explosions.push(*pos);
                }
            }
            doomed.push(e);
            continue;
        }
        if kind.is_enemy() || kind.is_projectile() {
            if reg.get::<Position>(e).is_some_and(out_of_bounds) {
                doomed.push(e);
                continue;
            }
        }
        if reg.get::<Lifetime>(e).is_some_and(|l| l.0 <= 0.0) {
            doomed.push(e);
        }
    }

    let removed = doomed.len();
    for e in doomed {
        reg.kill_entity(e);
    }
    for pos in explosions {
        spawn_explosion(reg, pos, enemy::EXPLOSION_LIFETIME);
    }
    removed
}
