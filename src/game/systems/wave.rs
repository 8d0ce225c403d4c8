//! Timed enemy waves

use rand::Rng;

use crate::ecs::{Entity, Registry};
use crate::game::components::{
    CollisionBox, ContactDamage, EnemyWeapon, EntityTag, Health, Position, Velocity,
};
use crate::game::constants::{difficulty, enemy, wave};
use crate::net::protocol::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveState {
    timer: f32,
    spawned: u32,
}

impl WaveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enemies spawned since the last reset
    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Health after difficulty and level scaling
pub fn scaled_health(base: i32, tier: u8, level: u8) -> i32 {
    let level_factor = 1.0 + difficulty::LEVEL_HEALTH_STEP * f32::from(level.saturating_sub(1));
    let scaled = base as f32 * difficulty::multiplier(tier) * level_factor;
    (scaled.round() as i32).max(1)
}

pub fn spawn_enemy(reg: &mut Registry, kind: EntityType, y: f32, tier: u8, level: u8) -> Entity {
    let (speed, base_health) = match kind {
        EntityType::Enemy2 => (enemy::ENEMY2_SPEED, enemy::ENEMY2_HEALTH),
        _ => (enemy::SPEED, enemy::HEALTH),
    };
    let e = reg.spawn_entity();
    reg.add_component(e, Position::new(enemy::SPAWN_X, y));
    reg.add_component(e, Velocity::new(-speed, 0.0));
    reg.add_component(e, Health::new(scaled_health(base_health, tier, level)));
    reg.add_component(e, CollisionBox::new(enemy::WIDTH, enemy::HEIGHT));
    reg.add_component(e, ContactDamage(enemy::CONTACT_DAMAGE));
    reg.add_component(
        e,
        EnemyWeapon {
            interval: enemy::FIRE_INTERVAL,
            timer: 0.0,
            speed: enemy::PROJECTILE_SPEED,
            damage: enemy::PROJECTILE_DAMAGE,
        },
    );
    reg.add_component(e, EntityTag(kind));
    e
}

/// Spawn a wave every [`wave::INTERVAL`] seconds
pub fn update<R: Rng + ?Sized>(
    reg: &mut Registry,
    state: &mut WaveState,
    rng: &mut R,
    tier: u8,
    level: u8,
    dt: f32,
) {
    state.timer += dt;
    if state.timer < wave::INTERVAL {
        return;
    }
    state.timer -= wave::INTERVAL;

    for _ in 0..wave::SIZE {
        let y = rng.gen_range(enemy::SPAWN_Y_MIN..=enemy::SPAWN_Y_MAX);
        let kind = if level >= enemy::ENEMY2_MIN_LEVEL && rng.gen_bool(0.5) {
            EntityType::Enemy2
        } else {
            EntityType::Enemy
        };
        spawn_enemy(reg, kind, y, tier, level);
        state.spawned += 1;
    }
}
