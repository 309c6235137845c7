//! Player entity lifecycle: loads the sprite atlas, builds the walk/idle clips from it, spawns the
//! avatar when gameplay starts and removes it when gameplay ends.

use bevy::asset::RecursiveDependencyLoadState;
use bevy::prelude::*;

use crate::animation::{frame_names, AnimationClip, AnimationLibrary, SpriteAnimation};
use crate::atlas::FrameAtlas;
use crate::input::{Facing, PlayerIntent, IDLE_ANIMATION, WALK_ANIMATION};
use crate::level::LevelAssets;
use crate::movement::{Body, Collider, Grounded, Velocity};
use crate::state::GameState;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerTuning>()
            .init_resource::<PlayerAssets>()
            .add_systems(OnEnter(GameState::Loading), load_player_assets)
            .add_systems(
                OnEnter(GameState::Playing),
                (build_player_animations, spawn_player).chain(),
            )
            .add_systems(OnExit(GameState::Playing), despawn_player);
    }
}

/// Marker for the controllable avatar.
#[derive(Component)]
pub struct Player;

/// Everything about the player that is data rather than behaviour.
#[derive(Resource, Debug, Clone)]
pub struct PlayerTuning {
    /// Horizontal speed while walking, px/s.
    pub run_speed: f32,
    /// Vertical speed given by a jump, px/s.
    pub jump_speed: f32,
    /// Spawn point in map pixels, measured from the level's top-left corner with y going down.
    pub spawn_point: Vec2,
    /// Hitbox size used when the atlas has no idle frame to measure.
    pub fallback_size: Vec2,
    pub atlas_path: String,
    pub walk_prefix: String,
    pub walk_frames: (u32, u32),
    pub walk_zero_pad: usize,
    pub walk_fps: f32,
    pub idle_frame: String,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            run_speed: 200.0,
            jump_speed: 800.0,
            spawn_point: Vec2::new(200.0, 200.0),
            fallback_size: Vec2::new(66.0, 92.0),
            atlas_path: "textures/player.atlas.json".to_owned(),
            walk_prefix: "p1_walk".to_owned(),
            walk_frames: (1, 11),
            walk_zero_pad: 2,
            walk_fps: 10.0,
            idle_frame: "p1_stand".to_owned(),
        }
    }
}

impl PlayerTuning {
    /// Converts `spawn_point` into world space for a level covering `bounds`.
    pub fn spawn_position(&self, bounds: Option<Rect>) -> Vec2 {
        match bounds {
            Some(bounds) => Vec2::new(
                bounds.min.x + self.spawn_point.x,
                bounds.max.y - self.spawn_point.y,
            ),
            None => Vec2::new(self.spawn_point.x, -self.spawn_point.y),
        }
    }
}

#[derive(Resource, Default)]
pub struct PlayerAssets {
    pub atlas: Option<Handle<FrameAtlas>>,
}

fn load_player_assets(
    asset_server: Res<AssetServer>,
    tuning: Res<PlayerTuning>,
    mut assets: ResMut<PlayerAssets>,
) {
    assets.atlas = Some(asset_server.load(tuning.atlas_path.clone()));
}

/// Fills the library with `walk` (looping) and `idle` (single frame). A clip whose frames are
/// missing from the atlas is skipped with a warning.
pub fn build_animation_library(atlas: &FrameAtlas, tuning: &PlayerTuning) -> AnimationLibrary {
    let mut library = AnimationLibrary::default();
    let (first, last) = tuning.walk_frames;
    let walk_names = frame_names(&tuning.walk_prefix, first, last, tuning.walk_zero_pad);

    let clips = [
        (
            WALK_ANIMATION,
            AnimationClip::from_frames(atlas, &walk_names, tuning.walk_fps, true),
        ),
        (
            IDLE_ANIMATION,
            AnimationClip::from_frames(
                atlas,
                std::slice::from_ref(&tuning.idle_frame),
                tuning.walk_fps,
                false,
            ),
        ),
    ];

    for (key, clip) in clips {
        match clip {
            Ok(clip) => library.insert(key, clip),
            Err(err) => warn!("Skipping '{}' animation: {}", key, err),
        }
    }

    library
}

fn build_player_animations(
    player_assets: Res<PlayerAssets>,
    atlases: Res<Assets<FrameAtlas>>,
    tuning: Res<PlayerTuning>,
    mut library: ResMut<AnimationLibrary>,
) {
    let Some(atlas) = player_assets
        .atlas
        .as_ref()
        .and_then(|handle| atlases.get(handle))
    else {
        return;
    };

    *library = build_animation_library(atlas, &tuning);
}

fn spawn_player(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    level_assets: Res<LevelAssets>,
    player_assets: Res<PlayerAssets>,
    atlases: Res<Assets<FrameAtlas>>,
    tuning: Res<PlayerTuning>,
) {
    let position = tuning.spawn_position(level_assets.bounds()).extend(1.0);
    // A loaded atlas whose sheet image failed would draw nothing at all.
    let atlas = player_assets
        .atlas
        .as_ref()
        .filter(|handle| {
            matches!(
                asset_server.get_recursive_dependency_load_state(handle.id()),
                Some(RecursiveDependencyLoadState::Loaded)
            )
        })
        .and_then(|handle| atlases.get(handle));

    let idle = atlas.and_then(|atlas| atlas.frame(&tuning.idle_frame));
    let size = idle.map(|frame| frame.size).unwrap_or(tuning.fallback_size);

    let mut player = commands.spawn((
        Name::new("Player"),
        Player,
        Velocity::default(),
        Body::default(),
        Grounded::default(),
        Collider::from_size(size),
        PlayerIntent::default(),
        Facing::default(),
    ));

    match (atlas, idle) {
        (Some(atlas), Some(idle)) => {
            player.insert((
                SpriteBundle {
                    texture: atlas.image.clone(),
                    transform: Transform::from_translation(position),
                    ..default()
                },
                TextureAtlas {
                    layout: atlas.layout.clone(),
                    index: idle.index,
                },
                SpriteAnimation::playing(IDLE_ANIMATION),
            ));
        }
        _ => {
            warn!("Player atlas unavailable; spawning a placeholder sprite.");
            player.insert(SpriteBundle {
                sprite: Sprite {
                    color: Color::srgb(0.9, 0.3, 0.2),
                    custom_size: Some(size),
                    ..default()
                },
                transform: Transform::from_translation(position),
                ..default()
            });
        }
    }

    info!("Player spawned at {}", position.truncate());
}

fn despawn_player(mut commands: Commands, query: Query<Entity, With<Player>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::FrameInfo;

    #[test]
    fn spawn_point_is_measured_from_top_left() {
        let tuning = PlayerTuning::default();
        let bounds = Rect::new(0.0, -700.0, 2100.0, 0.0);

        assert_eq!(tuning.spawn_position(Some(bounds)), Vec2::new(200.0, -200.0));

        let shifted = Rect::new(70.0, 0.0, 770.0, 1400.0);
        assert_eq!(tuning.spawn_position(Some(shifted)), Vec2::new(270.0, 1200.0));
    }

    fn atlas_with(names: &[&str]) -> FrameAtlas {
        let frames = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                (
                    name.to_string(),
                    FrameInfo {
                        index,
                        size: Vec2::new(66.0, 92.0),
                    },
                )
            })
            .collect();
        FrameAtlas::new(Handle::default(), Handle::default(), frames)
    }

    #[test]
    fn library_holds_walk_and_idle() {
        let tuning = PlayerTuning::default();
        let mut names: Vec<String> = frame_names("p1_walk", 1, 11, 2);
        names.push("p1_stand".to_owned());
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let library = build_animation_library(&atlas_with(&refs), &tuning);

        let walk = library.get(WALK_ANIMATION).expect("walk clip");
        assert_eq!(walk.frames, (0..11).collect::<Vec<_>>());
        assert_eq!(walk.fps, 10.0);
        assert!(walk.looping);

        let idle = library.get(IDLE_ANIMATION).expect("idle clip");
        assert_eq!(idle.frames, vec![11]);
        assert!(!idle.looping);
    }

    #[test]
    fn clip_with_missing_frame_is_skipped() {
        let tuning = PlayerTuning::default();

        let library = build_animation_library(&atlas_with(&["p1_walk01", "p1_stand"]), &tuning);

        assert!(library.get(WALK_ANIMATION).is_none());
        assert!(library.get(IDLE_ANIMATION).is_some());
    }

    #[test]
    fn default_tuning_uses_arcade_controls() {
        let tuning = PlayerTuning::default();
        assert_eq!(tuning.run_speed, 200.0);
        assert_eq!(tuning.jump_speed, 800.0);
        assert_eq!(
            frame_names(
                &tuning.walk_prefix,
                tuning.walk_frames.0,
                tuning.walk_frames.1,
                tuning.walk_zero_pad
            )
            .last()
            .map(String::as_str),
            Some("p1_walk11")
        );
    }
}
