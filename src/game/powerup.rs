//! Power-up catalogue, card draws and per-player power-up state
//!
//! Activable powers (cannon, shield) occupy one of two slots and run for a
//! level-dependent duration before a cooldown. Stat powers apply passively
//! through the multipliers on [`PlayerPowerups`].

use rand::seq::SliceRandom;
use rand::Rng;
use smallvec::SmallVec;

pub const MAX_LEVEL: u8 = 3;
pub const CARDS_PER_CHOICE: usize = 3;
pub const SLOT_COUNT: usize = 2;
/// Seconds before an expired activable can be used again
pub const ACTIVABLE_COOLDOWN: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PowerupId {
    PowerCannon = 1,
    Shield = 2,
    DamageUp = 20,
    SpeedUp = 21,
    HealthUp = 22,
    FireRateUp = 23,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerupCategory {
    Activable,
    Stat,
}

/// Effect of one power-up level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelEffect {
    /// Active time for activables
    pub duration: f32,
    /// Projectile damage for the cannon, multiplier or bonus for stats
    pub value: f32,
}

const fn effect(duration: f32, value: f32) -> LevelEffect {
    LevelEffect { duration, value }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerupDef {
    pub id: PowerupId,
    pub name: &'static str,
    pub category: PowerupCategory,
    pub levels: [LevelEffect; MAX_LEVEL as usize],
}

pub const CATALOGUE: [PowerupDef; 6] = [
    PowerupDef {
        id: PowerupId::PowerCannon,
        name: "Power Cannon",
        category: PowerupCategory::Activable,
        levels: [effect(10.0, 50.0), effect(12.0, 75.0), effect(15.0, 100.0)],
    },
    PowerupDef {
        id: PowerupId::Shield,
        name: "Energy Shield",
        category: PowerupCategory::Activable,
        levels: [effect(10.0, 80.0), effect(15.0, 100.0), effect(20.0, 120.0)],
    },
    PowerupDef {
        id: PowerupId::DamageUp,
        name: "Attack Power",
        category: PowerupCategory::Stat,
        levels: [effect(0.0, 1.2), effect(0.0, 1.5), effect(0.0, 2.0)],
    },
    PowerupDef {
        id: PowerupId::SpeedUp,
        name: "Speed Boost",
        category: PowerupCategory::Stat,
        levels: [effect(0.0, 1.2), effect(0.0, 1.4), effect(0.0, 1.7)],
    },
    PowerupDef {
        id: PowerupId::HealthUp,
        name: "Max Health",
        category: PowerupCategory::Stat,
        levels: [effect(0.0, 30.0), effect(0.0, 50.0), effect(0.0, 80.0)],
    },
    PowerupDef {
        id: PowerupId::FireRateUp,
        name: "Rapid Fire",
        category: PowerupCategory::Stat,
        levels: [effect(0.0, 1.2), effect(0.0, 1.4), effect(0.0, 1.7)],
    },
];

impl PowerupId {
    pub fn def(self) -> &'static PowerupDef {
        // CATALOGUE lists every id
        match self {
            PowerupId::PowerCannon => &CATALOGUE[0],
            PowerupId::Shield => &CATALOGUE[1],
            PowerupId::DamageUp => &CATALOGUE[2],
            PowerupId::SpeedUp => &CATALOGUE[3],
            PowerupId::HealthUp => &CATALOGUE[4],
            PowerupId::FireRateUp => &CATALOGUE[5],
        }
    }

    /// Activation byte of a PowerUpActivate packet
    pub fn from_slot_type(kind: u8) -> Option<Self> {
        match kind {
            1 => Some(PowerupId::PowerCannon),
            2 => Some(PowerupId::Shield),
            _ => None,
        }
    }

    /// Effect at `level` (1-based), if in range
    pub fn effect(self, level: u8) -> Option<LevelEffect> {
        let index = usize::from(level).checked_sub(1)?;
        self.def().levels.get(index).copied()
    }
}

/// One offered card: the power-up and the level it would reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerupCard {
    pub id: PowerupId,
    pub level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActivableSlot {
    pub powerup: Option<PowerupId>,
    pub level: u8,
    pub time_remaining: f32,
    pub cooldown_remaining: f32,
    pub active: bool,
}

/// Component carried by player entities
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerPowerups {
    owned: SmallVec<[(PowerupId, u8); 6]>,
    slots: [ActivableSlot; SLOT_COUNT],
}

impl PlayerPowerups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level_of(&self, id: PowerupId) -> u8 {
        self.owned
            .iter()
            .find(|(owned, _)| *owned == id)
            .map(|(_, level)| *level)
            .unwrap_or(0)
    }

    /// Gain `id` or raise its level (capped), returning the new level
    pub fn add_or_upgrade(&mut self, id: PowerupId) -> u8 {
        let level = match self.owned.iter_mut().find(|(owned, _)| *owned == id) {
            Some((_, level)) => {
                *level = (*level + 1).min(MAX_LEVEL);
                *level
            }
            None => {
                self.owned.push((id, 1));
                1
            }
        };

        if id.def().category == PowerupCategory::Activable {
            if let Some(slot) = self.slot_for_mut(id) {
                slot.level = level;
            } else if let Some(slot) = self.slots.iter_mut().find(|s| s.powerup.is_none()) {
                slot.powerup = Some(id);
                slot.level = level;
            }
        }
        level
    }

    fn slot_for_mut(&mut self, id: PowerupId) -> Option<&mut ActivableSlot> {
        self.slots.iter_mut().find(|s| s.powerup == Some(id))
    }

    pub fn slot_for(&self, id: PowerupId) -> Option<&ActivableSlot> {
        self.slots.iter().find(|s| s.powerup == Some(id))
    }

    pub fn slots(&self) -> &[ActivableSlot; SLOT_COUNT] {
        &self.slots
    }

    /// Start an owned activable; false when missing, running or cooling down
    pub fn activate(&mut self, id: PowerupId) -> bool {
        let Some(slot) = self.slot_for_mut(id) else {
            return false;
        };
        if slot.active || slot.cooldown_remaining > 0.0 {
            return false;
        }
        let Some(effect) = id.effect(slot.level) else {
            return false;
        };
        slot.active = true;
        slot.time_remaining = effect.duration;
        true
    }

    /// Advance active and cooldown timers
    pub fn update(&mut self, dt: f32) {
        for slot in self.slots.iter_mut() {
            if slot.active {
                slot.time_remaining -= dt;
                if slot.time_remaining <= 0.0 {
                    slot.active = false;
                    slot.time_remaining = 0.0;
                    slot.cooldown_remaining = ACTIVABLE_COOLDOWN;
                }
            } else if slot.cooldown_remaining > 0.0 {
                slot.cooldown_remaining = (slot.cooldown_remaining - dt).max(0.0);
            }
        }
    }

    pub fn is_active(&self, id: PowerupId) -> bool {
        self.slot_for(id).is_some_and(|s| s.active)
    }

    /// Running activables with their remaining time
    pub fn active_powers(&self) -> impl Iterator<Item = (PowerupId, f32)> + '_ {
        self.slots
            .iter()
            .filter(|s| s.active)
            .filter_map(|s| s.powerup.map(|id| (id, s.time_remaining)))
    }

    pub fn is_shielded(&self) -> bool {
        self.is_active(PowerupId::Shield)
    }

    /// Projectile damage while the cannon runs
    pub fn cannon_damage(&self) -> Option<i32> {
        let slot = self.slot_for(PowerupId::PowerCannon)?;
        if !slot.active {
            return None;
        }
        PowerupId::PowerCannon
            .effect(slot.level)
            .map(|e| e.value as i32)
    }

    fn stat(&self, id: PowerupId, default: f32) -> f32 {
        id.effect(self.level_of(id)).map(|e| e.value).unwrap_or(default)
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.stat(PowerupId::DamageUp, 1.0)
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.stat(PowerupId::SpeedUp, 1.0)
    }

    pub fn fire_rate_multiplier(&self) -> f32 {
        self.stat(PowerupId::FireRateUp, 1.0)
    }

    pub fn max_health_bonus(&self) -> i32 {
        self.stat(PowerupId::HealthUp, 0.0) as i32
    }
}

/// Draw up to `count` distinct cards for power-ups not yet at max level
pub fn draw_cards<R: Rng + ?Sized>(
    powerups: &PlayerPowerups,
    rng: &mut R,
    count: usize,
) -> Vec<PowerupCard> {
    let mut pool: Vec<PowerupCard> = CATALOGUE
        .iter()
        .filter_map(|def| {
            let level = powerups.level_of(def.id);
            (level < MAX_LEVEL).then_some(PowerupCard {
                id: def.id,
                level: level + 1,
            })
        })
        .collect();
    pool.shuffle(rng);
    pool.truncate(count);
    pool
}
