//! Centre-based AABB collision between projectiles, enemies and players
//!
//! Hits only change health. Removal is left to cleanup so that no entity
//! disappears while another pass of this tick still refers to it.

use rustc_hash::FxHashSet;

use crate::ecs::{Entity, Registry};
use crate::game::components::{
    CollisionBox, ContactDamage, EntityTag, Health, Invulnerable, Player, Position, Projectile,
    ProjectileOwner,
};
use crate::game::powerup::PlayerPowerups;
use crate::net::protocol::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionOutcome {
    /// Regular enemies killed by player fire this tick
    pub kills: u32,
}

#[derive(Clone, Copy)]
struct Body {
    entity: Entity,
    pos: Position,
    size: CollisionBox,
}

fn body(reg: &Registry, e: Entity) -> Option<Body> {
    Some(Body {
        entity: e,
        pos: *reg.get::<Position>(e)?,
        size: *reg.get::<CollisionBox>(e)?,
    })
}

fn alive(reg: &Registry, e: Entity) -> bool {
    reg.get::<Health>(e).is_some_and(|h| !h.is_dead())
}

fn is_hostile(kind: EntityType) -> bool {
    kind.is_enemy() || kind.is_serpent()
}

fn counts_as_kill(kind: EntityType) -> bool {
    matches!(
        kind,
        EntityType::Enemy | EntityType::Enemy2 | EntityType::HomingEnemy
    )
}

fn shielded(reg: &Registry, e: Entity) -> bool {
    reg.get::<PlayerPowerups>(e)
        .is_some_and(PlayerPowerups::is_shielded)
}

fn hurt_player(reg: &mut Registry, e: Entity, amount: i32) {
    if shielded(reg, e) {
        return;
    }
    if let Some(hp) = reg.get_mut::<Health>(e) {
        hp.damage(amount);
    }
}

fn spend(reg: &mut Registry, spent: &mut FxHashSet<Entity>, e: Entity) {
    spent.insert(e);
    if let Some(hp) = reg.get_mut::<Health>(e) {
        hp.current = 0;
    }
}

pub fn update(reg: &mut Registry, friendly_fire: bool) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();
    let mut spent: FxHashSet<Entity> = FxHashSet::default();

    let players: Vec<Body> = reg
        .join3::<Player, Position, CollisionBox>()
        .into_iter()
        .filter(|&e| alive(reg, e))
        .filter_map(|e| body(reg, e))
        .collect();

    let hostiles: Vec<(Body, EntityType)> = reg
        .join3::<EntityTag, Position, CollisionBox>()
        .into_iter()
        .filter_map(|e| {
            let kind = reg.get::<EntityTag>(e)?.0;
            if !is_hostile(kind) || reg.has::<Invulnerable>(e) {
                return None;
            }
            Some((body(reg, e)?, kind))
        })
        .collect();

    let projectiles: Vec<(Body, Projectile)> = reg
        .join3::<Projectile, Position, CollisionBox>()
        .into_iter()
        .filter(|&e| alive(reg, e))
        .filter_map(|e| Some((body(reg, e)?, *reg.get::<Projectile>(e)?)))
        .collect();

    for (shot, projectile) in &projectiles {
        match projectile.owner {
            ProjectileOwner::Player(shooter) => {
                for (target, kind) in &hostiles {
                    if !alive(reg, target.entity)
                        || !shot.size.overlaps(&shot.pos, &target.size, &target.pos)
                    {
                        continue;
                    }
                    let killed = reg
                        .get_mut::<Health>(target.entity)
                        .is_some_and(|hp| hp.damage(projectile.damage));
                    if killed && counts_as_kill(*kind) {
                        outcome.kills += 1;
                    }
                    spend(reg, &mut spent, shot.entity);
                    break;
                }
                if spent.contains(&shot.entity) || !friendly_fire {
                    continue;
                }
                for p in &players {
                    let own = reg
                        .get::<Player>(p.entity)
                        .is_some_and(|pl| pl.client_id == shooter);
                    if own
                        || !alive(reg, p.entity)
                        || !shot.size.overlaps(&shot.pos, &p.size, &p.pos)
                    {
                        continue;
                    }
                    hurt_player(reg, p.entity, projectile.damage);
                    spend(reg, &mut spent, shot.entity);
                    break;
                }
            }
            ProjectileOwner::Enemy => {
                for p in &players {
                    if !alive(reg, p.entity) || !shot.size.overlaps(&shot.pos, &p.size, &p.pos) {
                        continue;
                    }
                    hurt_player(reg, p.entity, projectile.damage);
                    spend(reg, &mut spent, shot.entity);
                    break;
                }
            }
        }
    }

    // Body contact: the dealer dies whatever happens to the player
    for e in reg.join3::<ContactDamage, Position, CollisionBox>() {
        if !alive(reg, e) {
            continue;
        }
        let (Some(dealer), Some(amount)) = (body(reg, e), reg.get::<ContactDamage>(e).map(|c| c.0))
        else {
            continue;
        };
        for p in &players {
            if !alive(reg, p.entity) || !dealer.size.overlaps(&dealer.pos, &p.size, &p.pos) {
                continue;
            }
            hurt_player(reg, p.entity, amount);
            if let Some(hp) = reg.get_mut::<Health>(e) {
                hp.current = 0;
            }
            break;
        }
    }

    outcome
}
