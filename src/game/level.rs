//! Level progression and the between-level choice gate

use rustc_hash::FxHashSet;

use crate::game::constants::level::{BOSS_LEVEL, SERPENT_LEVEL, START_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossKind {
    Boss,
    Serpent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelState {
    current: u8,
    kills: u16,
    completed: bool,
    /// Seconds left in the post-LevelStart pause
    intro_timer: f32,
    awaiting_choice: bool,
    chosen: FxHashSet<u32>,
}

impl LevelState {
    pub fn new() -> Self {
        Self {
            current: 1,
            kills: 0,
            completed: false,
            intro_timer: START_DELAY,
            awaiting_choice: false,
            chosen: FxHashSet::default(),
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn kills(&self) -> u16 {
        self.kills
    }

    /// Kills required to finish the current level
    pub fn kills_needed(&self) -> u16 {
        u16::from(self.current).max(1)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Boss fought on the current level, if any
    pub fn boss(&self) -> Option<BossKind> {
        match self.current {
            BOSS_LEVEL => Some(BossKind::Boss),
            SERPENT_LEVEL => Some(BossKind::Serpent),
            _ => None,
        }
    }

    /// Regular waves spawn only on non-boss levels
    pub fn spawns_waves(&self) -> bool {
        self.boss().is_none()
    }

    pub fn on_enemy_killed(&mut self) {
        if self.completed {
            return;
        }
        self.kills = self.kills.saturating_add(1);
        if self.kills >= self.kills_needed() {
            self.completed = true;
        }
    }

    /// Award every kill still missing (boss defeated)
    pub fn credit_remaining(&mut self) {
        self.kills = self.kills.max(self.kills_needed());
        self.completed = true;
    }

    pub fn in_intro(&self) -> bool {
        self.intro_timer > 0.0
    }

    pub fn tick_intro(&mut self, dt: f32) {
        self.intro_timer = (self.intro_timer - dt).max(0.0);
    }

    pub fn is_awaiting_choice(&self) -> bool {
        self.awaiting_choice
    }

    /// Level finished: wait for every alive player to pick an upgrade
    pub fn begin_choice(&mut self) {
        self.awaiting_choice = true;
        self.chosen.clear();
    }

    /// Record a choice; true when this client had not chosen yet
    pub fn record_choice(&mut self, client_id: u32) -> bool {
        self.awaiting_choice && self.chosen.insert(client_id)
    }

    pub fn has_chosen(&self, client_id: u32) -> bool {
        self.chosen.contains(&client_id)
    }

    pub fn chosen_count(&self) -> usize {
        self.chosen.len()
    }

    /// Move to the next level and restart the intro pause
    pub fn advance(&mut self) {
        self.current = self.current.saturating_add(1);
        self.kills = 0;
        self.completed = false;
        self.awaiting_choice = false;
        self.chosen.clear();
        self.intro_timer = START_DELAY;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for LevelState {
    fn default() -> Self {
        Self::new()
    }
}
