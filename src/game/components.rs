//! Plain-data components stored in the session registry
//!
//! Cross-entity links (serpent parent, attached body) are stored as
//! [`Entity`] ids and resolved through the registry each time; the target
//! may have died since.

use crate::ecs::Entity;
use crate::game::constants::weapon;
use crate::net::protocol::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    /// `speed` along the direction from `from` to `to` (zero when they coincide)
    pub fn toward(from: &Position, to: &Position, speed: f32) -> Self {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let distance = dx.hypot(dy);
        if distance < f32::EPSILON {
            return Self::default();
        }
        Self::new(dx / distance * speed, dy / distance * speed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub current: i32,
    pub maximum: i32,
}

impl Health {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }

    /// Apply damage; true when this hit took the entity from alive to dead
    pub fn damage(&mut self, amount: i32) -> bool {
        let was_alive = !self.is_dead();
        self.current -= amount;
        was_alive && self.is_dead()
    }
}

/// Axis-aligned box centred on the position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBox {
    pub width: f32,
    pub height: f32,
}

impl CollisionBox {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn overlaps(&self, pos: &Position, other: &CollisionBox, other_pos: &Position) -> bool {
        (pos.x - other_pos.x).abs() * 2.0 < self.width + other.width
            && (pos.y - other_pos.y).abs() * 2.0 < self.height + other.height
    }
}

/// Snapshot category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTag(pub EntityType);

/// Controlled by a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub client_id: u32,
    /// Slot in the lobby, used by clients to pick a ship sprite
    pub index: u8,
    pub keys: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeaponUpgrade {
    #[default]
    None,
    PowerShot,
    TripleShot,
}

impl WeaponUpgrade {
    /// Choice byte of a WeaponUpgradeChoice packet
    pub fn from_choice(choice: u8) -> Option<Self> {
        match choice {
            1 => Some(WeaponUpgrade::PowerShot),
            2 => Some(WeaponUpgrade::TripleShot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weapon {
    pub fire_rate: f32,
    pub cooldown: f32,
    pub damage: i32,
    pub projectile_speed: f32,
    pub firing: bool,
    pub upgrade: WeaponUpgrade,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            fire_rate: weapon::FIRE_RATE,
            cooldown: 0.0,
            damage: weapon::DAMAGE,
            projectile_speed: weapon::PROJECTILE_SPEED,
            firing: false,
            upgrade: WeaponUpgrade::None,
        }
    }
}

/// Periodic forward fire for regular enemies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyWeapon {
    pub interval: f32,
    pub timer: f32,
    pub speed: f32,
    pub damage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileOwner {
    Player(u32),
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    pub damage: i32,
    pub owner: ProjectileOwner,
}

/// Damage dealt to a player on body contact; the dealer dies on impact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactDamage(pub i32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homing {
    pub speed: f32,
    pub turn_rate: f32,
}

/// Remaining lifetime in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime(pub f32);

/// Takes no damage; rendered grayscale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Invulnerable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerpentPartKind {
    Head,
    Body,
    Scale,
    Tail,
}

impl SerpentPartKind {
    pub fn entity_type(self) -> EntityType {
        match self {
            SerpentPartKind::Head => EntityType::SerpentHead,
            SerpentPartKind::Body => EntityType::SerpentBody,
            SerpentPartKind::Scale => EntityType::SerpentScale,
            SerpentPartKind::Tail => EntityType::SerpentTail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerpentPart {
    pub kind: SerpentPartKind,
    pub index: usize,
    /// Part this one trails behind
    pub parent: Option<Entity>,
    /// Body part a scale rides on
    pub attached_body: Option<Entity>,
    /// Degrees
    pub rotation: f32,
    pub fire_timer: f32,
}

impl SerpentPart {
    pub fn new(kind: SerpentPartKind, index: usize) -> Self {
        Self {
            kind,
            index,
            parent: None,
            attached_body: None,
            rotation: 0.0,
            fire_timer: 0.0,
        }
    }
}
