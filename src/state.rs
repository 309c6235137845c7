//! Global game state definitions. Switching states updates an enum value and triggers the
//! on-enter/on-exit schedules that spawn and tear down the player.

use bevy::prelude::*;

/// High-level state machine for the game loop. `Loading` lasts until the level project and the
/// player atlas are both available.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
}

/// Named system sets to structure the Update schedule.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    /// Keyboard snapshot -> intent -> velocity/facing/animation requests.
    Input,
    /// Gravity, tile collision, world bounds, grounded flag.
    Movement,
    /// Everything that reacts to the new positions: coin pickups, animation frames, camera.
    Effects,
}
