//! Gameplay systems, run by the session in this order each combat tick:
//! weapon, wave, movement, collision, boss, timers, cleanup.

pub mod cleanup;
pub mod collision;
pub mod movement;
pub mod wave;
pub mod weapon;
