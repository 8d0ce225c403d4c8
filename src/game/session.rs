//! Authoritative simulation for one lobby
//!
//! A session owns its registry and advances it on the fixed tick driven by
//! the lobby. It is reset, not dropped, on game over so the same room can
//! play again.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::ecs::{Entity, Registry};
use crate::game::boss::{self, BossState, SerpentState};
use crate::game::components::{
    CollisionBox, EntityTag, Health, Player, Position, Velocity, Weapon, WeaponUpgrade,
};
use crate::game::constants::{player, timing, world};
use crate::game::level::{BossKind, LevelState};
use crate::game::powerup::{draw_cards, PlayerPowerups, PowerupCard, PowerupId, CARDS_PER_CHOICE};
use crate::game::systems::{cleanup, collision, movement, wave, weapon};
use crate::net::broadcast;
use crate::net::outbox::Outbox;
use crate::net::protocol::{ClientMessage, EntityType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Lobby,
    InGame,
}

/// State changes the owning lobby must react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    GameStarted,
    GameReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSettings {
    pub friendly_fire: bool,
    /// 0 easy, 1 normal, 2 hard
    pub difficulty: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct GameOverWait {
    elapsed: f32,
    resend: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct BroadcastTimers {
    lobby_status: f32,
    positions: f32,
    level: f32,
    powerups: f32,
}

/// Advance `timer` by `dt`; true (and reset) once it reaches `interval`
fn elapsed(timer: &mut f32, dt: f32, interval: f32) -> bool {
    *timer += dt;
    if *timer >= interval {
        *timer = 0.0;
        true
    } else {
        false
    }
}

pub struct GameSession {
    registry: Registry,
    settings: SessionSettings,
    phase: GamePhase,
    /// Client id to player entity, ordered for deterministic snapshots
    clients: BTreeMap<u32, Entity>,
    ready: FxHashSet<u32>,
    level: LevelState,
    waves: wave::WaveState,
    boss: Option<BossState>,
    serpent: Option<SerpentState>,
    cards: FxHashMap<u32, Vec<PowerupCard>>,
    game_over: Option<GameOverWait>,
    timers: BroadcastTimers,
    rng: StdRng,
}

impl GameSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Deterministic wave and card draws
    pub fn with_seed(settings: SessionSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: SessionSettings, rng: StdRng) -> Self {
        Self {
            registry: Registry::new(),
            settings,
            phase: GamePhase::Lobby,
            clients: BTreeMap::new(),
            ready: FxHashSet::default(),
            level: LevelState::new(),
            waves: wave::WaveState::new(),
            boss: None,
            serpent: None,
            cards: FxHashMap::default(),
            game_over: None,
            timers: BroadcastTimers::default(),
            rng,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn level(&self) -> &LevelState {
        &self.level
    }

    pub fn player_entity(&self, client_id: u32) -> Option<Entity> {
        self.clients.get(&client_id).copied()
    }

    pub fn player_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_ready(&self, client_id: u32) -> bool {
        self.ready.contains(&client_id)
    }

    pub fn ready_count(&self, members: &[u32]) -> usize {
        members.iter().filter(|c| self.ready.contains(c)).count()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over.is_some()
    }

    /// Route a decoded gameplay message from `client_id`
    pub fn handle_message(
        &mut self,
        client_id: u32,
        msg: &ClientMessage,
        members: &[u32],
        outbox: &mut Outbox,
    ) -> Option<SessionEvent> {
        match msg {
            ClientMessage::PlayerReady(ready) => {
                return self.set_ready(client_id, *ready, members, outbox);
            }
            ClientMessage::Input { keys, .. } => self.apply_input(client_id, *keys),
            ClientMessage::WeaponUpgradeChoice(choice) => {
                self.choose_weapon(client_id, *choice, members, outbox)
            }
            ClientMessage::PowerUpChoice(index) => {
                self.choose_powerup(client_id, *index, members, outbox)
            }
            ClientMessage::PowerUpActivate(kind) => self.activate_powerup(client_id, *kind, outbox),
            other => debug!("Session ignoring {:?} from client {}", other.opcode(), client_id),
        }
        None
    }

    /// Update a ready flag; starts the game once every member is ready
    pub fn set_ready(
        &mut self,
        client_id: u32,
        ready: bool,
        members: &[u32],
        outbox: &mut Outbox,
    ) -> Option<SessionEvent> {
        if self.phase != GamePhase::Lobby {
            return None;
        }
        if ready {
            self.ready.insert(client_id);
        } else {
            self.ready.remove(&client_id);
        }
        outbox.broadcast(members, &self.lobby_status(members));

        let all_ready = !members.is_empty() && members.iter().all(|c| self.ready.contains(c));
        if all_ready {
            self.start_game(members, outbox);
            return Some(SessionEvent::GameStarted);
        }
        None
    }

    fn lobby_status(&self, members: &[u32]) -> Vec<u8> {
        let total = members.len().min(u8::MAX as usize) as u8;
        let ready = self.ready_count(members).min(u8::MAX as usize) as u8;
        broadcast::lobby_status(total, ready)
    }

    /// Spawn every member and enter level 1
    pub fn start_game(&mut self, members: &[u32], outbox: &mut Outbox) {
        if members.is_empty() || self.phase == GamePhase::InGame {
            return;
        }
        self.registry.clear();
        self.clients.clear();
        self.level.reset();
        self.waves.reset();
        self.timers = BroadcastTimers::default();

        for (i, &client_id) in members.iter().enumerate() {
            self.ready.insert(client_id);
            let x = player::SPAWN_X + i as f32 * player::SPAWN_SPACING;
            let e = self.spawn_player(client_id, i as u8, x);
            self.clients.insert(client_id, e);
        }
        self.phase = GamePhase::InGame;

        outbox.broadcast(members, &broadcast::start_game());
        outbox.broadcast(members, &broadcast::level_start(self.level.current()));
        info!("Game started with {} players", members.len());
    }

    fn spawn_player(&mut self, client_id: u32, index: u8, x: f32) -> Entity {
        let reg = &mut self.registry;
        let e = reg.spawn_entity();
        reg.add_component(e, Position::new(x.min(world::WIDTH), player::SPAWN_Y));
        reg.add_component(e, Velocity::default());
        reg.add_component(e, Health::new(player::MAX_HEALTH));
        reg.add_component(e, CollisionBox::new(player::WIDTH, player::HEIGHT));
        reg.add_component(
            e,
            Player {
                client_id,
                index,
                keys: 0,
            },
        );
        reg.add_component(e, Weapon::default());
        reg.add_component(e, PlayerPowerups::new());
        reg.add_component(e, EntityTag(EntityType::Player));
        e
    }

    /// Bring a client into a running game with an immediate full snapshot
    pub fn add_player_mid_game(&mut self, client_id: u32, outbox: &mut Outbox) {
        if self.phase != GamePhase::InGame || self.clients.contains_key(&client_id) {
            return;
        }
        let index = self.clients.len().min(u8::MAX as usize) as u8;
        let x = player::SPAWN_X + client_id as f32 * player::SPAWN_SPACING;
        let e = self.spawn_player(client_id, index, x);
        self.clients.insert(client_id, e);
        self.ready.insert(client_id);

        if let Some(snapshot) = broadcast::entity_snapshot(&self.registry, &self.clients) {
            outbox.send_compressed(client_id, &snapshot);
        }
        outbox.send_compressed(client_id, &broadcast::start_game());
        outbox.send_compressed(client_id, &broadcast::level_start(self.level.current()));
        info!("Client {} joined the game in progress", client_id);
    }

    pub fn remove_player(&mut self, client_id: u32) {
        if let Some(e) = self.clients.remove(&client_id) {
            self.registry.kill_entity(e);
        }
        self.ready.remove(&client_id);
        self.cards.remove(&client_id);
    }

    fn accepts_input(&self) -> bool {
        self.phase == GamePhase::InGame
            && self.game_over.is_none()
            && !self.level.is_awaiting_choice()
    }

    pub fn apply_input(&mut self, client_id: u32, keys: u8) {
        if !self.accepts_input() {
            return;
        }
        let e = match self.clients.get(&client_id) {
            Some(&e) => e,
            None => {
                let index = self.clients.len().min(u8::MAX as usize) as u8;
                let x = player::SPAWN_X + client_id as f32 * player::SPAWN_SPACING;
                let e = self.spawn_player(client_id, index, x);
                self.clients.insert(client_id, e);
                e
            }
        };
        if self.registry.get::<Health>(e).is_some_and(Health::is_dead) {
            movement::freeze(&mut self.registry, e);
            return;
        }
        let speed = self
            .registry
            .get::<PlayerPowerups>(e)
            .map_or(1.0, PlayerPowerups::speed_multiplier);
        movement::apply_input(&mut self.registry, e, keys, speed);
    }

    fn choose_weapon(&mut self, client_id: u32, choice: u8, members: &[u32], outbox: &mut Outbox) {
        if !self.level.is_awaiting_choice() || self.level.has_chosen(client_id) {
            return;
        }
        if let (Some(upgrade), Some(&e)) =
            (WeaponUpgrade::from_choice(choice), self.clients.get(&client_id))
        {
            if let Some(w) = self.registry.get_mut::<Weapon>(e) {
                w.upgrade = upgrade;
            }
            debug!("Client {} took weapon upgrade {:?}", client_id, upgrade);
        }
        self.level.record_choice(client_id);
        self.try_advance(members, outbox);
    }

    /// Apply a 1-based card pick; an invalid index still counts as a choice
    fn choose_powerup(&mut self, client_id: u32, index: u8, members: &[u32], outbox: &mut Outbox) {
        if !self.level.is_awaiting_choice() || self.level.has_chosen(client_id) {
            return;
        }
        let card = self
            .cards
            .get(&client_id)
            .and_then(|cards| cards.get(usize::from(index).wrapping_sub(1)))
            .copied();
        if let (Some(card), Some(&e)) = (card, self.clients.get(&client_id)) {
            self.grant_powerup(e, card.id);
            if let Some(p) = self.registry.get::<PlayerPowerups>(e) {
                outbox.send(client_id, broadcast::activable_slots(p.slots()));
            }
            debug!("Client {} picked {:?}", client_id, card.id);
        }
        self.cards.remove(&client_id);
        self.level.record_choice(client_id);
        self.try_advance(members, outbox);
    }

    fn grant_powerup(&mut self, e: Entity, id: PowerupId) {
        let Some(p) = self.registry.get_mut::<PlayerPowerups>(e) else {
            return;
        };
        let bonus_before = p.max_health_bonus();
        p.add_or_upgrade(id);
        let gained = p.max_health_bonus() - bonus_before;
        if gained > 0 {
            if let Some(hp) = self.registry.get_mut::<Health>(e) {
                hp.maximum += gained;
                hp.current += gained;
            }
        }
    }

    fn activate_powerup(&mut self, client_id: u32, kind: u8, outbox: &mut Outbox) {
        if !self.accepts_input() {
            return;
        }
        let (Some(id), Some(&e)) = (PowerupId::from_slot_type(kind), self.clients.get(&client_id))
        else {
            return;
        };
        let Some(p) = self.registry.get_mut::<PlayerPowerups>(e) else {
            return;
        };
        if p.activate(id) {
            debug!("Client {} activated {:?}", client_id, id);
        }
        outbox.send(client_id, broadcast::activable_slots(p.slots()));
    }

    fn alive_clients(&self) -> Vec<u32> {
        self.clients
            .iter()
            .filter(|(_, &e)| self.registry.get::<Health>(e).is_some_and(|h| !h.is_dead()))
            .map(|(&c, _)| c)
            .collect()
    }

    fn try_advance(&mut self, members: &[u32], outbox: &mut Outbox) {
        let waiting = self
            .alive_clients()
            .into_iter()
            .any(|c| !self.level.has_chosen(c));
        if !waiting {
            self.advance_level(members, outbox);
        }
    }

    /// One fixed tick
    pub fn update(&mut self, dt: f32, members: &[u32], outbox: &mut Outbox) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.phase {
            GamePhase::Lobby => {
                if elapsed(&mut self.timers.lobby_status, dt, timing::LOBBY_STATUS_INTERVAL) {
                    outbox.broadcast(members, &self.lobby_status(members));
                }
            }
            GamePhase::InGame => {
                if let Some(wait) = self.game_over.as_mut() {
                    wait.elapsed += dt;
                    let resend = elapsed(&mut wait.resend, dt, timing::GAME_OVER_RESEND);
                    let done = wait.elapsed >= timing::GAME_OVER_RESET;
                    if resend {
                        outbox.broadcast(members, &broadcast::game_over());
                    }
                    if done {
                        self.reset_game();
                        events.push(SessionEvent::GameReset);
                    }
                    return events;
                }

                if !self.clients.is_empty() && self.alive_clients().is_empty() {
                    outbox.broadcast(members, &broadcast::game_over());
                    self.game_over = Some(GameOverWait::default());
                    info!("Game over at level {}", self.level.current());
                    return events;
                }

                // A player who left mid-choice no longer holds up the others
                if self.level.is_awaiting_choice() {
                    self.try_advance(members, outbox);
                }

                self.simulate(dt);
                self.broadcast_periodic(dt, members, outbox);
            }
        }
        events
    }

    fn simulate(&mut self, dt: f32) {
        if self.level.in_intro() || self.level.is_awaiting_choice() {
            self.level.tick_intro(dt);
            movement::freeze_players(&mut self.registry);
            return;
        }

        let reg = &mut self.registry;
        weapon::update(reg, dt);
        if self.level.spawns_waves() {
            wave::update(
                reg,
                &mut self.waves,
                &mut self.rng,
                self.settings.difficulty,
                self.level.current(),
                dt,
            );
        }
        movement::update(reg, dt);

        let outcome = collision::update(reg, self.settings.friendly_fire);
        movement::freeze_dead_players(reg);
        for _ in 0..outcome.kills {
            self.level.on_enemy_killed();
        }

        if let Some(b) = self.boss.as_mut() {
            if b.update(reg, dt) {
                self.boss = None;
                self.level.credit_remaining();
            }
        }
        if let Some(s) = self.serpent.as_mut() {
            if s.update(reg, dt) {
                self.serpent = None;
                self.level.credit_remaining();
            }
        }
        boss::update_homing(reg, dt);

        for e in reg.view::<PlayerPowerups>() {
            if let Some(p) = reg.get_mut::<PlayerPowerups>(e) {
                p.update(dt);
            }
        }
        cleanup::tick_lifetimes(reg, dt);
        cleanup::update(reg);
    }

    fn broadcast_periodic(&mut self, dt: f32, members: &[u32], outbox: &mut Outbox) {
        if elapsed(&mut self.timers.positions, dt, timing::POSITION_INTERVAL) {
            if let Some(snapshot) = broadcast::entity_snapshot(&self.registry, &self.clients) {
                outbox.broadcast(members, &snapshot);
            }
        }
        if elapsed(&mut self.timers.level, dt, timing::LEVEL_INTERVAL) {
            outbox.broadcast(
                members,
                &broadcast::level_progress(
                    self.level.current(),
                    self.level.kills(),
                    self.level.kills_needed(),
                ),
            );
        }
        if self.level.is_completed() && !self.level.is_awaiting_choice() {
            self.complete_level(members, outbox);
        }
        if elapsed(&mut self.timers.powerups, dt, timing::POWERUP_INTERVAL) {
            for (&client_id, &e) in &self.clients {
                let Some(p) = self.registry.get::<PlayerPowerups>(e) else {
                    continue;
                };
                for (id, time) in p.active_powers() {
                    outbox.broadcast(members, &broadcast::powerup_status(client_id, id, time));
                }
            }
        }
    }

    fn clear_hostiles(&mut self) {
        if let Some(b) = self.boss.take() {
            b.despawn(&mut self.registry);
        }
        if let Some(mut s) = self.serpent.take() {
            s.despawn(&mut self.registry);
        }
        let reg = &mut self.registry;
        for e in reg.view::<EntityTag>() {
            let hostile = reg.get::<EntityTag>(e).is_some_and(|t| {
                t.0.is_enemy() || t.0.is_projectile() || t.0.is_serpent()
            });
            if hostile {
                reg.kill_entity(e);
            }
        }
    }

    fn complete_level(&mut self, members: &[u32], outbox: &mut Outbox) {
        let current = self.level.current();
        info!("Level {} complete", current);
        self.clear_hostiles();
        movement::freeze_players(&mut self.registry);

        outbox.broadcast(
            members,
            &broadcast::level_complete(current, current.saturating_add(1)),
        );
        outbox.broadcast(members, &broadcast::powerup_selection());
        self.level.begin_choice();

        self.cards.clear();
        for client_id in self.alive_clients() {
            let Some(p) = self
                .clients
                .get(&client_id)
                .and_then(|&e| self.registry.get::<PlayerPowerups>(e))
            else {
                continue;
            };
            let cards = draw_cards(p, &mut self.rng, CARDS_PER_CHOICE);
            outbox.send(client_id, broadcast::powerup_cards(&cards));
            self.cards.insert(client_id, cards);
        }
    }

    /// Next level: revive the fallen, spawn the level boss, announce it
    pub fn advance_level(&mut self, members: &[u32], outbox: &mut Outbox) {
        self.level.advance();
        self.waves.reset();
        self.cards.clear();

        for &e in self.clients.values() {
            if let Some(hp) = self.registry.get_mut::<Health>(e) {
                hp.current = hp.maximum;
            }
        }

        let tier = self.settings.difficulty;
        match self.level.boss() {
            Some(BossKind::Boss) => {
                self.boss = Some(BossState::spawn(&mut self.registry, tier));
                outbox.broadcast(members, &broadcast::boss_spawn());
            }
            Some(BossKind::Serpent) => {
                self.serpent = Some(SerpentState::spawn(&mut self.registry, tier));
                outbox.broadcast(members, &broadcast::boss_spawn());
            }
            None => {}
        }
        outbox.broadcast(members, &broadcast::level_start(self.level.current()));
        info!("Level {} started", self.level.current());
    }

    /// Back to the waiting room with an empty world
    pub fn reset_game(&mut self) {
        self.clients.clear();
        self.ready.clear();
        self.registry.clear();
        self.level.reset();
        self.waves.reset();
        self.boss = None;
        self.serpent = None;
        self.cards.clear();
        self.game_over = None;
        self.timers = BroadcastTimers::default();
        self.phase = GamePhase::Lobby;
        info!("Session reset to lobby");
    }
}
