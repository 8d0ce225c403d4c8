//! Player and enemy firing
//!
//! Shots are collected during the walk and spawned afterwards so the joined
//! index lists stay valid.

use smallvec::SmallVec;

use crate::ecs::{Entity, Registry};
use crate::game::components::{
    CollisionBox, EnemyWeapon, EntityTag, Health, Player, Position, Projectile, ProjectileOwner,
    Velocity, Weapon, WeaponUpgrade,
};
use crate::game::constants::{enemy, weapon};
use crate::game::powerup::PlayerPowerups;
use crate::net::protocol::EntityType;

/// Everything needed to spawn one projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub position: Position,
    pub velocity: Velocity,
    pub damage: i32,
    pub owner: ProjectileOwner,
    pub size: CollisionBox,
}

pub fn spawn_projectile(reg: &mut Registry, shot: Shot) -> Entity {
    let kind = match shot.owner {
        ProjectileOwner::Player(_) => EntityType::Projectile,
        ProjectileOwner::Enemy => EntityType::EnemyProjectile,
    };
    let e = reg.spawn_entity();
    reg.add_component(e, shot.position);
    reg.add_component(e, shot.velocity);
    reg.add_component(e, Health::new(1));
    reg.add_component(e, shot.size);
    reg.add_component(
        e,
        Projectile {
            damage: shot.damage,
            owner: shot.owner,
        },
    );
    reg.add_component(e, EntityTag(kind));
    e
}

pub fn update(reg: &mut Registry, dt: f32) {
    let mut shots: Vec<Shot> = Vec::new();
    player_fire(reg, dt, &mut shots);
    enemy_fire(reg, dt, &mut shots);
    for shot in shots {
        spawn_projectile(reg, shot);
    }
}

fn player_fire(reg: &mut Registry, dt: f32, shots: &mut Vec<Shot>) {
    for e in reg.join3::<Player, Weapon, Position>() {
        if reg.get::<Health>(e).is_some_and(Health::is_dead) {
            continue;
        }
        let Some(client_id) = reg.get::<Player>(e).map(|p| p.client_id) else {
            continue;
        };
        let Some(pos) = reg.get::<Position>(e).copied() else {
            continue;
        };
        let (rate_mult, damage_mult, cannon) = match reg.get::<PlayerPowerups>(e) {
            Some(p) => (p.fire_rate_multiplier(), p.damage_multiplier(), p.cannon_damage()),
            None => (1.0, 1.0, None),
        };

        let Some(w) = reg.get_mut::<Weapon>(e) else {
            continue;
        };
        w.cooldown = (w.cooldown - dt).max(0.0);
        if !w.firing || w.cooldown > 0.0 {
            continue;
        }
        w.cooldown = 1.0 / (w.fire_rate * rate_mult).max(f32::EPSILON);

        let mut damage = cannon.unwrap_or(w.damage);
        if w.upgrade == WeaponUpgrade::PowerShot {
            damage *= weapon::POWER_SHOT_MULTIPLIER;
        }
        let damage = (damage as f32 * damage_mult).round() as i32;

        let spreads: SmallVec<[f32; 3]> = match w.upgrade {
            WeaponUpgrade::TripleShot => SmallVec::from_slice(&[
                -weapon::TRIPLE_SPREAD_VY,
                0.0,
                weapon::TRIPLE_SPREAD_VY,
            ]),
            _ => SmallVec::from_slice(&[0.0]),
        };
        let speed = w.projectile_speed;
        let origin = Position::new(pos.x + weapon::MUZZLE_OFFSET_X, pos.y + weapon::MUZZLE_OFFSET_Y);
        shots.extend(spreads.into_iter().map(|vy| Shot {
            position: origin,
            velocity: Velocity::new(speed, vy),
            damage,
            owner: ProjectileOwner::Player(client_id),
            size: CollisionBox::new(weapon::PROJECTILE_WIDTH, weapon::PROJECTILE_HEIGHT),
        }));
    }
}

fn enemy_fire(reg: &mut Registry, dt: f32, shots: &mut Vec<Shot>) {
    for e in reg.join2::<EnemyWeapon, Position>() {
        let Some(pos) = reg.get::<Position>(e).copied() else {
            continue;
        };
        let Some(w) = reg.get_mut::<EnemyWeapon>(e) else {
            continue;
        };
        w.timer += dt;
        if w.timer < w.interval {
            continue;
        }
        w.timer = 0.0;
        shots.push(Shot {
            position: Position::new(pos.x - enemy::WIDTH / 2.0, pos.y),
            velocity: Velocity::new(-w.speed, 0.0),
            damage: w.damage,
            owner: ProjectileOwner::Enemy,
            size: CollisionBox::new(enemy::PROJECTILE_SIZE, enemy::PROJECTILE_SIZE),
        });
    }
}
