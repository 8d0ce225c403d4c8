use crate::ecs::{Entity, Registry};
use crate::game::components::{Health, Player, Position, Velocity, Weapon};
use crate::game::constants::{input, player, world};

/// Integrate velocities; players stay inside the playfield
pub fn update(reg: &mut Registry, dt: f32) {
    for e in reg.join2::<Position, Velocity>() {
        let Some(vel) = reg.get::<Velocity>(e).copied() else {
            continue;
        };
        let is_player = reg.has::<Player>(e);
        let Some(pos) = reg.get_mut::<Position>(e) else {
            continue;
        };
        pos.x += vel.vx * dt;
        pos.y += vel.vy * dt;
        if is_player {
            pos.x = pos.x.clamp(0.0, world::WIDTH);
            pos.y = pos.y.clamp(0.0, world::HEIGHT);
        }
    }
}

/// Velocity for a key mask; diagonals are not normalized
pub fn velocity_for_keys(keys: u8, speed: f32) -> Velocity {
    let axis = |neg: u8, pos: u8| -> f32 {
        let mut v = 0.0;
        if keys & neg != 0 {
            v -= 1.0;
        }
        if keys & pos != 0 {
            v += 1.0;
        }
        v
    };
    Velocity::new(
        axis(input::LEFT, input::RIGHT) * speed,
        axis(input::UP, input::DOWN) * speed,
    )
}

/// Apply a client's key mask to its player entity
pub fn apply_input(reg: &mut Registry, e: Entity, keys: u8, speed_multiplier: f32) {
    if !reg.is_alive(e) {
        return;
    }
    if let Some(p) = reg.get_mut::<Player>(e) {
        p.keys = keys;
    }
    let vel = velocity_for_keys(keys, player::SPEED * speed_multiplier);
    reg.add_component(e, vel);
    if let Some(w) = reg.get_mut::<Weapon>(e) {
        w.firing = keys & input::SHOOT != 0;
    }
}

/// Stop one entity and release its trigger
pub fn freeze(reg: &mut Registry, e: Entity) {
    if let Some(v) = reg.get_mut::<Velocity>(e) {
        *v = Velocity::default();
    }
    if let Some(w) = reg.get_mut::<Weapon>(e) {
        w.firing = false;
    }
}

/// Zero every player's velocity and release triggers
pub fn freeze_players(reg: &mut Registry) {
    for e in reg.join2::<Player, Velocity>() {
        freeze(reg, e);
    }
}

/// Dead ships stay where they fell until revived
pub fn freeze_dead_players(reg: &mut Registry) {
    for e in reg.join2::<Player, Health>() {
        if reg.get::<Health>(e).is_some_and(Health::is_dead) {
            freeze(reg, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_player(reg: &mut Registry, x: f32, y: f32) -> Entity {
        let e = reg.spawn_entity();
        reg.add_component(e, Position::new(x, y));
        reg.add_component(e, Velocity::default());
        reg.add_component(
            e,
            Player {
                client_id: 1,
                index: 0,
                keys: 0,
            },
        );
        reg.add_component(e, Weapon::default());
        e
    }

    #[test]
    fn test_key_axes() {
        assert_eq!(velocity_for_keys(0, 300.0), Velocity::new(0.0, 0.0));
        assert_eq!(
            velocity_for_keys(input::UP | input::RIGHT, 300.0),
            Velocity::new(300.0, -300.0)
        );
        assert_eq!(
            velocity_for_keys(input::LEFT | input::RIGHT | input::DOWN, 300.0),
            Velocity::new(0.0, 300.0)
        );
    }

    #[test]
    fn test_apply_input_sets_trigger() {
        let mut reg = Registry::new();
        let e = spawn_player(&mut reg, 100.0, 100.0);

        apply_input(&mut reg, e, input::DOWN | input::SHOOT, 1.5);
        assert_eq!(reg.get::<Velocity>(e), Some(&Velocity::new(0.0, 450.0)));
        assert!(reg.get::<Weapon>(e).unwrap().firing);
        assert_eq!(reg.get::<Player>(e).unwrap().keys, input::DOWN | input::SHOOT);

        apply_input(&mut reg, e, 0, 1.0);
        assert!(!reg.get::<Weapon>(e).unwrap().firing);
    }

    #[test]
    fn test_players_clamped_others_not() {
        let mut reg = Registry::new();
        let p = spawn_player(&mut reg, 10.0, 1070.0);
        reg.add_component(p, Velocity::new(-300.0, 300.0));

        let enemy = reg.spawn_entity();
        reg.add_component(enemy, Position::new(10.0, 500.0));
        reg.add_component(enemy, Velocity::new(-150.0, 0.0));

        update(&mut reg, 0.5);
        assert_eq!(reg.get::<Position>(p), Some(&Position::new(0.0, 1080.0)));
        assert_eq!(reg.get::<Position>(enemy), Some(&Position::new(-65.0, 500.0)));
    }

    #[test]
    fn test_freeze() {
        let mut reg = Registry::new();
        let e = spawn_player(&mut reg, 100.0, 100.0);
        apply_input(&mut reg, e, input::RIGHT | input::SHOOT, 1.0);

        freeze_players(&mut reg);
        assert_eq!(reg.get::<Velocity>(e), Some(&Velocity::default()));
        assert!(!reg.get::<Weapon>(e).unwrap().firing);
    }

    #[test]
    fn test_freeze_dead_players_only() {
        let mut reg = Registry::new();
        let alive = spawn_player(&mut reg, 100.0, 100.0);
        let dead = spawn_player(&mut reg, 100.0, 400.0);
        reg.add_component(alive, Health::new(100));
        reg.add_component(dead, Health::new(0));
        apply_input(&mut reg, alive, input::RIGHT, 1.0);
        apply_input(&mut reg, dead, input::RIGHT | input::SHOOT, 1.0);

        freeze_dead_players(&mut reg);
        assert_eq!(reg.get::<Velocity>(dead), Some(&Velocity::default()));
        assert!(!reg.get::<Weapon>(dead).unwrap().firing);
        assert_ne!(reg.get::<Velocity>(alive), Some(&Velocity::default()));
    }
}
