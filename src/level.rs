//! LDtk level orchestration: loads the project, waits for it (and the player atlas) to finish
//! loading, and caches where the level sits in world space.
//!
//! Other systems (tile layers, camera, player spawn) read `LevelAssets` without ever touching the
//! LDtk structures directly.

use bevy::asset::{LoadState, RecursiveDependencyLoadState};
use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;
use bevy_ecs_ldtk::utils::ldtk_pixel_coords_to_translation;
use bevy_ecs_ldtk::LevelIid;

use crate::player::PlayerAssets;
use crate::state::GameState;

/// Registers LDtk asset plumbing and the loading monitor.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelConfig>()
            .init_resource::<LevelAssets>()
            .insert_resource(LevelSelection::index(0))
            .insert_resource(LdtkSettings {
                level_spawn_behavior: LevelSpawnBehavior::UseWorldTranslation {
                    load_level_neighbors: false,
                },
                set_clear_color: SetClearColor::No,
                ..default()
            })
            .add_plugins(LdtkPlugin)
            .add_systems(OnEnter(GameState::Loading), spawn_world)
            .add_systems(
                Update,
                monitor_loading.run_if(in_state(GameState::Loading)),
            )
            .add_systems(PostUpdate, cache_level_transform);
    }
}

/// Which LDtk project and level to load, and how its layers are interpreted.
#[derive(Resource, Clone, Debug)]
pub struct LevelConfig {
    pub project_path: String,
    pub start_level: Option<String>,
    pub tile_size: f32,
    /// IntGrid layer whose cells are solid collision geometry.
    pub world_layer: String,
    /// IntGrid layer holding collectibles.
    pub coin_layer: String,
    /// IntGrid value that marks a coin inside `coin_layer`.
    pub coin_tile_index: i32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            project_path: "levels/map.ldtk".to_owned(),
            start_level: Some("Level_0".to_owned()),
            tile_size: 70.0,
            world_layer: "World".to_owned(),
            coin_layer: "Coins".to_owned(),
            coin_tile_index: 17,
        }
    }
}

/// Mirror of the currently loaded level's metadata. Optional fields become `Some` once assets are
/// available.
#[derive(Resource, Default)]
pub struct LevelAssets {
    pub project: Option<Handle<LdtkProject>>,
    pub level_identifier: Option<String>,
    pub level_iid: Option<String>,
    /// Bottom-left corner of the level in world space.
    pub level_origin: Option<Vec2>,
    pub level_size: Option<Vec2>,
}

impl LevelAssets {
    /// World-space rectangle covered by the level, once both origin and size are known.
    pub fn bounds(&self) -> Option<Rect> {
        let origin = self.level_origin?;
        let size = self.level_size?;
        Some(Rect::from_corners(origin, origin + size))
    }
}

/// Marker on the LDtk world entity so it can be despawned before another load.
#[derive(Component)]
pub struct LevelRoot;

fn spawn_world(
    mut commands: Commands,
    world: Query<Entity, With<LevelRoot>>,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    mut level_assets: ResMut<LevelAssets>,
    mut selection: ResMut<LevelSelection>,
) {
    for entity in &world {
        commands.entity(entity).despawn_recursive();
    }

    let project_handle: Handle<LdtkProject> = asset_server.load(config.project_path.clone());
    level_assets.project = Some(project_handle.clone());

    *selection = config
        .start_level
        .as_ref()
        .map(|label| LevelSelection::Identifier(label.clone()))
        .unwrap_or_else(|| LevelSelection::index(0));

    info!("Loading level project '{}'", config.project_path);

    commands.spawn((
        LevelRoot,
        Name::new("LevelRoot"),
        LdtkWorldBundle {
            ldtk_handle: project_handle,
            ..default()
        },
    ));
}

/// Where an asset and everything it depends on stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetProgress {
    Pending,
    Ready,
    Failed,
}

/// Folds the atlas' own load state and its dependencies (the sheet image) into one answer. A
/// failure anywhere settles loading so the game can start with a placeholder.
pub fn atlas_progress(
    own_failed: bool,
    dependencies: Option<RecursiveDependencyLoadState>,
) -> AssetProgress {
    if own_failed {
        return AssetProgress::Failed;
    }

    match dependencies {
        Some(RecursiveDependencyLoadState::Loaded) => AssetProgress::Ready,
        Some(RecursiveDependencyLoadState::Failed { .. }) => AssetProgress::Failed,
        _ => AssetProgress::Pending,
    }
}

/// Stays in `Loading` until the LDtk project and the player atlas have both settled (loaded or
/// failed), then enters `Playing`.
fn monitor_loading(
    asset_server: Res<AssetServer>,
    mut level_assets: ResMut<LevelAssets>,
    projects: Res<Assets<LdtkProject>>,
    player_assets: Res<PlayerAssets>,
    config: Res<LevelConfig>,
    mut next_state: ResMut<NextState<GameState>>,
    mut atlas_warned: Local<bool>,
) {
    let Some(project_handle) = level_assets.project.clone() else {
        return;
    };

    let level_ready = match asset_server.get_load_state(project_handle.id()) {
        Some(LoadState::Loaded) => {
            if let Some(project) = projects.get(&project_handle) {
                let level_data = config
                    .start_level
                    .as_ref()
                    .and_then(|identifier| {
                        project
                            .json_data()
                            .levels
                            .iter()
                            .find(|level| &level.identifier == identifier)
                    })
                    .or_else(|| project.json_data().levels.first());

                if let Some(level) = level_data {
                    let origin = ldtk_pixel_coords_to_translation(
                        IVec2::new(level.world_x, level.world_y + level.px_hei),
                        0,
                    );
                    level_assets.level_identifier = Some(level.identifier.clone());
                    level_assets.level_iid = Some(level.iid.clone());
                    level_assets.level_origin = Some(origin);
                    level_assets.level_size =
                        Some(Vec2::new(level.px_wid as f32, level.px_hei as f32));
                }
            }
            true
        }
        Some(LoadState::Failed(_)) => {
            warn!(
                "Unable to load LDtk project at '{}'; continuing without a level.",
                config.project_path
            );
            true
        }
        _ => false,
    };

    let atlas_ready = match player_assets.atlas.as_ref() {
        Some(handle) => {
            let own_failed = matches!(
                asset_server.get_load_state(handle.id()),
                Some(LoadState::Failed(_))
            );
            match atlas_progress(
                own_failed,
                asset_server.get_recursive_dependency_load_state(handle.id()),
            ) {
                AssetProgress::Ready => true,
                AssetProgress::Failed => {
                    if !*atlas_warned {
                        warn!("Player atlas or its sheet image failed to load; the player will be drawn untextured.");
                        *atlas_warned = true;
                    }
                    true
                }
                AssetProgress::Pending => false,
            }
        }
        None => true,
    };

    if level_ready && atlas_ready {
        info!(
            "Level '{}' ready",
            level_assets.level_identifier.as_deref().unwrap_or("<none>")
        );
        next_state.set(GameState::Playing);
    }
}

/// When LDtk instantiates the level entity, capture its actual world transform as the origin.
pub fn cache_level_transform(
    mut level_assets: ResMut<LevelAssets>,
    level_query: Query<(&GlobalTransform, &LevelIid), Added<LevelIid>>,
) {
    for (transform, iid) in &level_query {
        let matches_current_level = level_assets
            .level_iid
            .as_ref()
            .map(|target| target == iid.get())
            .unwrap_or(true);

        if matches_current_level {
            level_assets.level_origin = Some(transform.translation().truncate());
        }
    }
}
