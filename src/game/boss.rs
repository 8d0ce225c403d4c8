//! Boss fights: the level-5 gunship and the level-10 serpent
//!
//! Both controllers hold entity ids only and look everything up through the
//! registry each tick. Their parts are skipped by the generic cleanup pass;
//! the controllers remove them and report when the fight is over.

use crate::ecs::{Entity, Registry};
use crate::game::components::{
    CollisionBox, ContactDamage, EntityTag, Health, Homing, Invulnerable, Player, Position,
    ProjectileOwner, SerpentPart, SerpentPartKind, Velocity,
};
use crate::game::constants::{boss, enemy, serpent};
use crate::game::systems::cleanup::spawn_explosion;
use crate::game::systems::wave::scaled_health;
use crate::game::systems::weapon::{spawn_projectile, Shot};
use crate::net::protocol::EntityType;

/// Positions of living players
fn living_players(reg: &Registry) -> Vec<Position> {
    reg.join2::<Player, Position>()
        .into_iter()
        .filter(|&e| reg.get::<Health>(e).is_some_and(|h| !h.is_dead()))
        .filter_map(|e| reg.get::<Position>(e).copied())
        .collect()
}

fn nearest(from: &Position, targets: &[Position]) -> Option<Position> {
    targets
        .iter()
        .min_by(|a, b| from.distance_to(a).total_cmp(&from.distance_to(b)))
        .copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BossPhase {
    /// Sliding in from the right edge
    Entering,
    Intro { remaining: f32 },
    Fighting,
    Dying { remaining: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossState {
    entity: Entity,
    phase: BossPhase,
    fire_timer: f32,
    volleys: u32,
    tier: u8,
}

impl BossState {
    pub fn spawn(reg: &mut Registry, tier: u8) -> Self {
        let health = scaled_health(boss::HEALTH, tier, 1);
        let e = reg.spawn_entity();
        reg.add_component(e, Position::new(boss::SPAWN_X, boss::SPAWN_Y));
        reg.add_component(e, Velocity::new(-boss::ENTRY_SPEED, 0.0));
        reg.add_component(e, Health::new(health));
        reg.add_component(e, CollisionBox::new(boss::WIDTH, boss::HEIGHT));
        reg.add_component(e, EntityTag(EntityType::Boss));
        reg.add_component(e, Invulnerable);
        tracing::info!("Boss spawned with {} HP", health);
        Self {
            entity: e,
            phase: BossPhase::Entering,
            fire_timer: 0.0,
            volleys: 0,
            tier,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn phase(&self) -> BossPhase {
        self.phase
    }

    /// Advance the fight; true once the boss is gone
    pub fn update(&mut self, reg: &mut Registry, dt: f32) -> bool {
        if !reg.is_alive(self.entity) {
            return true;
        }
        let Some(pos) = reg.get::<Position>(self.entity).copied() else {
            return true;
        };

        if !matches!(self.phase, BossPhase::Dying { .. })
            && reg.get::<Health>(self.entity).is_some_and(Health::is_dead)
        {
            reg.remove_component::<CollisionBox>(self.entity);
            reg.add_component(self.entity, Velocity::default());
            spawn_explosion(reg, pos, boss::DEATH_DURATION);
            self.phase = BossPhase::Dying {
                remaining: boss::DEATH_DURATION,
            };
            tracing::info!("Boss destroyed");
        }

        match self.phase {
            BossPhase::Entering => {
                if pos.x <= boss::TARGET_X {
                    if let Some(p) = reg.get_mut::<Position>(self.entity) {
                        p.x = boss::TARGET_X;
                    }
                    reg.add_component(self.entity, Velocity::default());
                    self.phase = BossPhase::Intro {
                        remaining: boss::INTRO_DURATION,
                    };
                }
            }
            BossPhase::Intro { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    reg.remove_component::<Invulnerable>(self.entity);
                    self.phase = BossPhase::Fighting;
                } else {
                    self.phase = BossPhase::Intro { remaining };
                }
            }
            BossPhase::Fighting => {
                self.fire_timer += dt;
                if self.fire_timer >= boss::FIRE_INTERVAL {
                    self.fire_timer = 0.0;
                    self.volley(reg, pos);
                }
            }
            BossPhase::Dying { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    reg.kill_entity(self.entity);
                    return true;
                }
                self.phase = BossPhase::Dying { remaining };
            }
        }
        false
    }

    fn volley(&mut self, reg: &mut Registry, pos: Position) {
        for target in living_players(reg) {
            spawn_projectile(
                reg,
                Shot {
                    position: pos,
                    velocity: Velocity::toward(&pos, &target, boss::PROJECTILE_SPEED),
                    damage: boss::PROJECTILE_DAMAGE,
                    owner: ProjectileOwner::Enemy,
                    size: CollisionBox::new(boss::PROJECTILE_SIZE, boss::PROJECTILE_SIZE),
                },
            );
        }
        self.volleys += 1;
        if self.volleys % boss::HOMING_EVERY == 0 {
            spawn_homing(reg, Position::new(pos.x - 50.0, pos.y + 300.0), self.tier);
        }
    }

    /// Remove the boss immediately (level cleared or game reset)
    pub fn despawn(&self, reg: &mut Registry) {
        reg.kill_entity(self.entity);
    }
}

pub fn spawn_homing(reg: &mut Registry, pos: Position, tier: u8) -> Entity {
    let e = reg.spawn_entity();
    reg.add_component(e, pos);
    reg.add_component(e, Velocity::new(-150.0, 0.0));
    reg.add_component(e, Health::new(scaled_health(boss::HOMING_HEALTH, tier, 1)));
    reg.add_component(e, CollisionBox::new(boss::HOMING_SIZE, boss::HOMING_SIZE));
    reg.add_component(e, ContactDamage(boss::HOMING_CONTACT_DAMAGE));
    reg.add_component(
        e,
        Homing {
            speed: boss::HOMING_SPEED,
            turn_rate: boss::HOMING_TURN_RATE,
        },
    );
    reg.add_component(e, EntityTag(EntityType::HomingEnemy));
    e
}

/// Steer homing enemies toward the nearest living player
pub fn update_homing(reg: &mut Registry, dt: f32) {
    let players = living_players(reg);
    if players.is_empty() {
        return;
    }
    for e in reg.join3::<Homing, Position, Velocity>() {
        let (Some(homing), Some(pos)) = (
            reg.get::<Homing>(e).copied(),
            reg.get::<Position>(e).copied(),
        ) else {
            continue;
        };
        let Some(target) = nearest(&pos, &players) else {
            continue;
        };
        if pos.distance_to(&target) <= 10.0 {
            continue;
        }
        let desired = Velocity::toward(&pos, &target, homing.speed);
        let blend = (homing.turn_rate * dt).min(1.0);
        if let Some(v) = reg.get_mut::<Velocity>(e) {
            v.vx += (desired.vx - v.vx) * blend;
            v.vy += (desired.vy - v.vy) * blend;
        }
    }
}

fn spawn_part(
    reg: &mut Registry,
    kind: SerpentPartKind,
    index: usize,
    y: f32,
    health: i32,
) -> Entity {
    let e = reg.spawn_entity();
    reg.add_component(e, Position::new(serpent::SPAWN_X, y));
    reg.add_component(e, Velocity::default());
    reg.add_component(e, Health::new(health));
    reg.add_component(e, CollisionBox::new(serpent::PART_SIZE, serpent::PART_SIZE));
    reg.add_component(e, EntityTag(kind.entity_type()));
    reg.add_component(e, SerpentPart::new(kind, index));
    e
}

/// Head-to-tail chain steering between waypoints
#[derive(Debug, Clone, PartialEq)]
pub struct SerpentState {
    head: Entity,
    /// Body parts then the tail, in follow order
    chain: Vec<Entity>,
    scales: Vec<Entity>,
    waypoint: usize,
    elapsed: f32,
}

impl SerpentState {
    pub fn spawn(reg: &mut Registry, tier: u8) -> Self {
        let hp = |base: i32| scaled_health(base, tier, 1);

        let head = spawn_part(reg, SerpentPartKind::Head, 0, serpent::SPAWN_Y, hp(serpent::HEAD_HEALTH));
        let mut chain = Vec::with_capacity(serpent::BODY_PARTS + 1);
        let mut scales = Vec::new();
        let mut previous = head;

        for i in 0..serpent::BODY_PARTS {
            let y = serpent::SPAWN_Y + (i + 1) as f32 * serpent::SEGMENT_SPACING;
            let body = spawn_part(reg, SerpentPartKind::Body, i, y, hp(serpent::BODY_HEALTH));
            if let Some(sp) = reg.get_mut::<SerpentPart>(body) {
                sp.parent = Some(previous);
            }
            if (i + 1) % serpent::SCALE_EVERY == 0 {
                let scale = spawn_part(reg, SerpentPartKind::Scale, i, y, hp(serpent::SCALE_HEALTH));
                reg.add_component(scale, CollisionBox::new(serpent::SCALE_SIZE, serpent::SCALE_SIZE));
                if let Some(sp) = reg.get_mut::<SerpentPart>(scale) {
                    sp.attached_body = Some(body);
                    sp.parent = Some(body);
                }
                reg.add_component(body, Invulnerable);
                scales.push(scale);
            }
            chain.push(body);
            previous = body;
        }

        let tail_y = serpent::SPAWN_Y + (serpent::BODY_PARTS + 1) as f32 * serpent::SEGMENT_SPACING;
        let tail = spawn_part(
            reg,
            SerpentPartKind::Tail,
            serpent::BODY_PARTS,
            tail_y,
            hp(serpent::TAIL_HEALTH),
        );
        if let Some(sp) = reg.get_mut::<SerpentPart>(tail) {
            sp.parent = Some(previous);
        }
        chain.push(tail);

        tracing::info!("Serpent spawned with {} parts", chain.len() + scales.len() + 1);
        Self {
            head,
            chain,
            scales,
            waypoint: 0,
            elapsed: 0.0,
        }
    }

    pub fn head(&self) -> Entity {
        self.head
    }

    /// Every part still registered, head first
    pub fn parts(&self) -> impl Iterator<Item = Entity> + '_ {
        std::iter::once(self.head)
            .chain(self.chain.iter().copied())
            .chain(self.scales.iter().copied())
    }

    /// Advance the serpent; true once the head has died
    pub fn update(&mut self, reg: &mut Registry, dt: f32) -> bool {
        if reg
            .get::<Health>(self.head)
            .map_or(true, Health::is_dead)
        {
            if let Some(pos) = reg.get::<Position>(self.head).copied() {
                spawn_explosion(reg, pos, boss::DEATH_DURATION);
            }
            self.despawn(reg);
            tracing::info!("Serpent defeated");
            return true;
        }

        self.elapsed += dt;
        self.remove_dead_parts(reg);
        self.steer_head(reg);
        self.follow(reg, dt);
        self.fire_scales(reg, dt);
        false
    }

    fn remove_dead_parts(&mut self, reg: &mut Registry) {
        let mut dead: Vec<Entity> = Vec::new();
        for &scale in &self.scales {
            let body_gone = reg
                .get::<SerpentPart>(scale)
                .and_then(|sp| sp.attached_body)
                .map_or(true, |b| {
                    !reg.is_alive(b) || reg.get::<Health>(b).map_or(true, Health::is_dead)
                });
            let scale_dead = reg.get::<Health>(scale).map_or(true, Health::is_dead);
            if scale_dead || body_gone {
                dead.push(scale);
            }
        }
        // A body part loses its armour once its scale is gone
        for &scale in &dead {
            if let Some(body) = reg.get::<SerpentPart>(scale).and_then(|sp| sp.attached_body) {
                reg.remove_component::<Invulnerable>(body);
            }
        }
        dead.extend(
            self.chain
                .iter()
                .copied()
                .filter(|&e| reg.get::<Health>(e).map_or(true, Health::is_dead)),
        );

        for e in dead {
            if let Some(pos) = reg.get::<Position>(e).copied() {
                spawn_explosion(reg, pos, enemy::EXPLOSION_LIFETIME);
            }
            reg.kill_entity(e);
        }
        self.chain.retain(|&e| reg.is_alive(e));
        self.scales.retain(|&e| reg.is_alive(e));
    }

    fn steer_head(&mut self, reg: &mut Registry) {
        let Some(pos) = reg.get::<Position>(self.head).copied() else {
            return;
        };
        let (wx, wy) = serpent::WAYPOINTS[self.waypoint];
        let mut target = Position::new(wx, wy);
        if pos.distance_to(&target) < serpent::WAYPOINT_RADIUS {
            self.waypoint = (self.waypoint + 1) % serpent::WAYPOINTS.len();
            let (wx, wy) = serpent::WAYPOINTS[self.waypoint];
            target = Position::new(wx, wy);
        }

        let dir = Velocity::toward(&pos, &target, 1.0);
        let wobble = (self.elapsed * serpent::WAVE_FREQUENCY).sin()
            * serpent::WAVE_AMPLITUDE
            * serpent::WAVE_STRENGTH
            * serpent::WAVE_FREQUENCY;
        let vel = Velocity::new(
            dir.vx * serpent::SPEED - dir.vy * wobble,
            dir.vy * serpent::SPEED + dir.vx * wobble,
        );
        let rotation = vel.vy.atan2(vel.vx).to_degrees();
        reg.add_component(self.head, vel);
        if let Some(sp) = reg.get_mut::<SerpentPart>(self.head) {
            sp.rotation = rotation;
        }
    }

    fn follow(&self, reg: &mut Registry, dt: f32) {
        let mut leader = self.head;
        for &e in &self.chain {
            let (Some(lead), Some(pos)) = (
                reg.get::<Position>(leader).copied(),
                reg.get::<Position>(e).copied(),
            ) else {
                continue;
            };
            let dir = Velocity::toward(&pos, &lead, 1.0);
            let target = Position::new(
                lead.x - dir.vx * serpent::SEGMENT_SPACING,
                lead.y - dir.vy * serpent::SEGMENT_SPACING,
            );
            let next = if pos.distance_to(&lead) > serpent::SNAP_DISTANCE {
                target
            } else {
                let t = (serpent::FOLLOW_RATE * dt).min(1.0);
                Position::new(pos.x + (target.x - pos.x) * t, pos.y + (target.y - pos.y) * t)
            };
            let vel = if dt > 0.0 {
                Velocity::new((next.x - pos.x) / dt, (next.y - pos.y) / dt)
            } else {
                Velocity::default()
            };

            // Movement integrates the velocity; the stored position is left as is
            reg.add_component(e, vel);
            if let Some(sp) = reg.get_mut::<SerpentPart>(e) {
                sp.parent = Some(leader);
                sp.rotation = (lead.y - pos.y).atan2(lead.x - pos.x).to_degrees();
            }
            leader = e;
        }

        for &scale in &self.scales {
            let Some(body) = reg.get::<SerpentPart>(scale).and_then(|sp| sp.attached_body) else {
                continue;
            };
            let (Some(body_vel), Some(body_rot)) = (
                reg.get::<Velocity>(body).copied(),
                reg.get::<SerpentPart>(body).map(|sp| sp.rotation),
            ) else {
                continue;
            };
            if let Some(body_pos) = reg.get::<Position>(body).copied() {
                reg.add_component(scale, body_pos);
            }
            reg.add_component(scale, body_vel);
            if let Some(sp) = reg.get_mut::<SerpentPart>(scale) {
                sp.rotation = body_rot;
            }
        }
    }

    fn fire_scales(&self, reg: &mut Registry, dt: f32) {
        let players = living_players(reg);
        let mut shots: Vec<Shot> = Vec::new();
        for &scale in &self.scales {
            let Some(pos) = reg.get::<Position>(scale).copied() else {
                continue;
            };
            let Some(sp) = reg.get_mut::<SerpentPart>(scale) else {
                continue;
            };
            sp.fire_timer += dt;
            if sp.fire_timer < serpent::SCALE_FIRE_INTERVAL {
                continue;
            }
            sp.fire_timer = 0.0;
            if let Some(target) = nearest(&pos, &players) {
                shots.push(Shot {
                    position: pos,
                    velocity: Velocity::toward(&pos, &target, serpent::SCALE_PROJECTILE_SPEED),
                    damage: serpent::SCALE_PROJECTILE_DAMAGE,
                    owner: ProjectileOwner::Enemy,
                    size: CollisionBox::new(enemy::PROJECTILE_SIZE, enemy::PROJECTILE_SIZE),
                });
            }
        }
        for shot in shots {
            spawn_projectile(reg, shot);
        }
    }

    /// Remove every remaining part
    pub fn despawn(&mut self, reg: &mut Registry) {
        for e in self.parts().collect::<Vec<_>>() {
            reg.kill_entity(e);
        }
        self.chain.clear();
        self.scales.clear();
    }
}
