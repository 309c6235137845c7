//! Camera follow. Keeps the main 2D camera centred on the player, clamped so it never shows
//! anything outside the level.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::level::LevelAssets;
use crate::player::Player;
use crate::state::{GameSet, GameState};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera).add_systems(
            Update,
            follow_player_camera
                .in_set(GameSet::Effects)
                .run_if(in_state(GameState::Playing))
                .run_if(has_player_and_camera),
        );
    }
}

/// Marker so the follow system can find the camera without relying on names.
#[derive(Component)]
pub struct FollowCamera;

fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("MainCamera"),
        Camera2dBundle::default(),
        FollowCamera,
    ));
}

/// Avoids `get_single` errors while the player is being spawned or despawned.
fn has_player_and_camera(
    player_query: Query<Entity, With<Player>>,
    camera_query: Query<Entity, With<FollowCamera>>,
) -> bool {
    !player_query.is_empty() && !camera_query.is_empty()
}

/// Clamps a camera centre so a view of `half_view` half extents stays inside `bounds`. On an axis
/// where the level is smaller than the view the target passes through unchanged.
pub fn clamp_to_bounds(target: Vec2, bounds: Rect, half_view: Vec2) -> Vec2 {
    let mut clamped = target;

    if bounds.width() > half_view.x * 2.0 {
        clamped.x = clamped
            .x
            .clamp(bounds.min.x + half_view.x, bounds.max.x - half_view.x);
    }

    if bounds.height() > half_view.y * 2.0 {
        clamped.y = clamped
            .y
            .clamp(bounds.min.y + half_view.y, bounds.max.y - half_view.y);
    }

    clamped
}

fn follow_player_camera(
    mut camera_query: Query<(&mut Transform, &OrthographicProjection), With<FollowCamera>>,
    player_query: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    level_assets: Res<LevelAssets>,
    window_query: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(player_transform) = player_query.get_single() else {
        return;
    };

    let Ok((mut camera_transform, projection)) = camera_query.get_single_mut() else {
        return;
    };

    let mut desired = player_transform.translation.truncate();

    if let (Some(bounds), Ok(window)) = (level_assets.bounds(), window_query.get_single()) {
        let half_view = window.resolution.size() * 0.5 * projection.scale;
        desired = clamp_to_bounds(desired, bounds, half_view);
    }

    camera_transform.translation.x = desired.x;
    camera_transform.translation.y = desired.y;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_stops_at_level_edges() {
        let bounds = Rect::new(0.0, 0.0, 2800.0, 1400.0);
        let half_view = Vec2::new(400.0, 300.0);

        assert_eq!(
            clamp_to_bounds(Vec2::new(100.0, 50.0), bounds, half_view),
            Vec2::new(400.0, 300.0)
        );
        assert_eq!(
            clamp_to_bounds(Vec2::new(2790.0, 1390.0), bounds, half_view),
            Vec2::new(2400.0, 1100.0)
        );
        assert_eq!(
            clamp_to_bounds(Vec2::new(1000.0, 700.0), bounds, half_view),
            Vec2::new(1000.0, 700.0)
        );
    }

    #[test]
    fn small_level_axis_is_not_clamped() {
        let bounds = Rect::new(0.0, 0.0, 2800.0, 420.0);
        let half_view = Vec2::new(400.0, 300.0);

        let clamped = clamp_to_bounds(Vec2::new(50.0, 10.0), bounds, half_view);

        assert_eq!(clamped, Vec2::new(400.0, 10.0));
    }
}
