//! High-level plugin composition.
//!
//! `CoinPlatformerPlugin` registers every gameplay plugin and fixes the per-frame order
//! Input → Movement → Effects while the game is playing.

use bevy::prelude::*;

use crate::animation::AnimationPlugin;
use crate::atlas::AtlasPlugin;
use crate::camera::CameraPlugin;
use crate::coins::CoinsPlugin;
use crate::input::InputPlugin;
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::player::PlayerPlugin;
use crate::state::{GameSet, GameState};
use crate::tiles::TilesPlugin;

pub struct CoinPlatformerPlugin;

impl Plugin for CoinPlatformerPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_plugins((
                AtlasPlugin,     // Named-frame sprite atlas asset + loader.
                LevelPlugin,     // LDtk project loading and level metadata.
                TilesPlugin,     // World/Coins grids mirrored from the level.
                PlayerPlugin,    // Player spawn/despawn and animation clips.
                InputPlugin,     // Keyboard → intent → velocity.
                MovementPlugin,  // Gravity, tile collision, world bounds.
                CoinsPlugin,     // Coin overlap dispatch and removal.
                AnimationPlugin, // Frame playback.
                CameraPlugin,    // Follow camera.
            ))
            // The coin overlap must see this frame's position, and the grounded flag read by
            // the next frame's input comes from this frame's movement step.
            .configure_sets(
                Update,
                (GameSet::Input, GameSet::Movement, GameSet::Effects)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            );
    }
}
