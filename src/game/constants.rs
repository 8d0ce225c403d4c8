/// Playfield and cleanup bounds
pub mod world {
    pub const WIDTH: f32 = 1920.0;
    pub const HEIGHT: f32 = 1080.0;
    /// Entities outside this box are removed (players excepted)
    pub const CLEANUP_MIN_X: f32 = -200.0;
    pub const CLEANUP_MAX_X: f32 = 2200.0;
    pub const CLEANUP_MIN_Y: f32 = -200.0;
    pub const CLEANUP_MAX_Y: f32 = 1300.0;
}

/// Input key bits
pub mod input {
    pub const UP: u8 = 0x01;
    pub const DOWN: u8 = 0x02;
    pub const LEFT: u8 = 0x04;
    pub const RIGHT: u8 = 0x08;
    pub const SHOOT: u8 = 0x10;
}

pub mod player {
    /// Pixels per second per axis
    pub const SPEED: f32 = 300.0;
    pub const SPAWN_X: f32 = 100.0;
    pub const SPAWN_Y: f32 = 300.0;
    /// Horizontal gap between players spawned together
    pub const SPAWN_SPACING: f32 = 50.0;
    pub const MAX_HEALTH: i32 = 100;
    pub const WIDTH: f32 = 64.0;
    pub const HEIGHT: f32 = 32.0;
}

pub mod weapon {
    /// Shots per second
    pub const FIRE_RATE: f32 = 5.0;
    pub const PROJECTILE_SPEED: f32 = 500.0;
    pub const DAMAGE: i32 = 10;
    pub const MUZZLE_OFFSET_X: f32 = 50.0;
    pub const MUZZLE_OFFSET_Y: f32 = 10.0;
    pub const PROJECTILE_WIDTH: f32 = 16.0;
    pub const PROJECTILE_HEIGHT: f32 = 8.0;
    /// Vertical speed of the outer triple-shot projectiles
    pub const TRIPLE_SPREAD_VY: f32 = 100.0;
    pub const POWER_SHOT_MULTIPLIER: i32 = 2;
}

pub mod enemy {
    pub const SPAWN_X: f32 = 2000.0;
    pub const SPAWN_Y_MIN: f32 = 100.0;
    pub const SPAWN_Y_MAX: f32 = 980.0;
    pub const SPEED: f32 = 150.0;
    pub const HEALTH: i32 = 10;
    pub const ENEMY2_SPEED: f32 = 120.0;
    pub const ENEMY2_HEALTH: i32 = 15;
    /// First level where the tougher variant appears
    pub const ENEMY2_MIN_LEVEL: u8 = 3;
    pub const WIDTH: f32 = 64.0;
    pub const HEIGHT: f32 = 64.0;
    pub const FIRE_INTERVAL: f32 = 2.0;
    pub const PROJECTILE_SPEED: f32 = 300.0;
    pub const PROJECTILE_DAMAGE: i32 = 15;
    pub const PROJECTILE_SIZE: f32 = 16.0;
    pub const CONTACT_DAMAGE: i32 = 25;
    /// Seconds an explosion stays visible
    pub const EXPLOSION_LIFETIME: f32 = 0.5;
}

pub mod wave {
    pub const INTERVAL: f32 = 3.0;
    pub const SIZE: usize = 3;
}

pub mod difficulty {
    /// Extra enemy health per level above the first
    pub const LEVEL_HEALTH_STEP: f32 = 0.1;

    /// Health multiplier for a difficulty tier (0 easy, 1 normal, 2 hard)
    pub fn multiplier(tier: u8) -> f32 {
        match tier {
            0 => 1.0,
            1 => 1.5,
            _ => 2.0,
        }
    }
}

pub mod level {
    /// Pause after each LevelStart before combat resumes
    pub const START_DELAY: f32 = 2.0;
    pub const BOSS_LEVEL: u8 = 5;
    pub const SERPENT_LEVEL: u8 = 10;
}

pub mod boss {
    pub const SPAWN_X: f32 = 2400.0;
    pub const SPAWN_Y: f32 = 540.0;
    pub const ENTRY_SPEED: f32 = 150.0;
    pub const TARGET_X: f32 = 1500.0;
    pub const HEALTH: i32 = 2000;
    pub const WIDTH: f32 = 350.0;
    pub const HEIGHT: f32 = 500.0;
    /// Idle time after reaching the target before the first volley
    pub const INTRO_DURATION: f32 = 2.5;
    pub const FIRE_INTERVAL: f32 = 1.5;
    pub const PROJECTILE_SPEED: f32 = 400.0;
    pub const PROJECTILE_DAMAGE: i32 = 30;
    pub const PROJECTILE_SIZE: f32 = 50.0;
    /// A homing enemy follows every Nth volley
    pub const HOMING_EVERY: u32 = 3;
    pub const DEATH_DURATION: f32 = 1.2;

    pub const HOMING_SPEED: f32 = 250.0;
    pub const HOMING_TURN_RATE: f32 = 3.0;
    pub const HOMING_HEALTH: i32 = 10;
    pub const HOMING_SIZE: f32 = 35.0;
    pub const HOMING_CONTACT_DAMAGE: i32 = 30;
}

pub mod serpent {
    pub const HEAD_HEALTH: i32 = 300;
    pub const BODY_HEALTH: i32 = 100;
    pub const SCALE_HEALTH: i32 = 150;
    pub const TAIL_HEALTH: i32 = 80;
    pub const BODY_PARTS: usize = 18;
    /// Every Nth body part carries a scale
    pub const SCALE_EVERY: usize = 3;
    pub const PART_SIZE: f32 = 50.0;
    pub const SCALE_SIZE: f32 = 40.0;

    pub const SPEED: f32 = 350.0;
    pub const WAVE_FREQUENCY: f32 = 2.5;
    pub const WAVE_AMPLITUDE: f32 = 50.0;
    /// Share of the wobble amplitude applied to the heading each tick
    pub const WAVE_STRENGTH: f32 = 0.2;
    pub const WAYPOINTS: [(f32, f32); 4] = [(300.0, 200.0), (1620.0, 200.0), (1620.0, 800.0), (300.0, 800.0)];
    pub const WAYPOINT_RADIUS: f32 = 40.0;
    pub const SPAWN_X: f32 = 960.0;
    pub const SPAWN_Y: f32 = 1150.0;

    pub const SEGMENT_SPACING: f32 = 30.0;
    pub const FOLLOW_RATE: f32 = 15.0;
    /// Parts farther than this from their parent jump straight back
    pub const SNAP_DISTANCE: f32 = 90.0;

    pub const SCALE_FIRE_INTERVAL: f32 = 2.5;
    pub const SCALE_PROJECTILE_SPEED: f32 = 350.0;
    pub const SCALE_PROJECTILE_DAMAGE: i32 = 15;
}

/// Session timers in seconds
pub mod timing {
    pub const GAME_OVER_RESEND: f32 = 0.1;
    pub const GAME_OVER_RESET: f32 = 2.0;
    pub const LOBBY_STATUS_INTERVAL: f32 = 0.5;
    pub const POSITION_INTERVAL: f32 = 1.0 / 30.0;
    pub const LEVEL_INTERVAL: f32 = 0.5;
    pub const POWERUP_INTERVAL: f32 = 0.2;
}
