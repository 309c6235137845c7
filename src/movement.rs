use bevy::prelude::*;

use crate::level::LevelAssets;
use crate::state::{GameSet, GameState};
use crate::tiles::{TileLayer, TileLayers};

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MovementSettings>().add_systems(
            Update,
            apply_kinematics
                .in_set(GameSet::Movement)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct MovementSettings {
    /// Downward acceleration in px/s².
    pub gravity: f32,
    /// Rebounds slower than this settle to zero instead of jittering forever.
    pub rest_speed: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: 500.0,
            rest_speed: 20.0,
        }
    }
}

#[derive(Component, Debug, Default, Clone, Copy, Deref, DerefMut)]
pub struct Velocity(pub Vec2);

#[derive(Component, Debug, Clone, Copy)]
pub struct Body {
    /// Fraction of velocity kept (and reversed) when an axis is blocked.
    pub bounce: f32,
    pub collide_world_bounds: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            bounce: 0.2,
            collide_world_bounds: true,
        }
    }
}

/// True while the body was blocked from below during the latest kinematics step.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Grounded(pub bool);

#[derive(Component, Debug, Copy, Clone)]
pub struct Collider {
    pub half_extents: Vec2,
}

impl Collider {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            half_extents: size * 0.5,
        }
    }

    /// World-space `(min, max)` corners around `center`.
    pub fn aabb(&self, center: Vec2) -> (Vec2, Vec2) {
        (center - self.half_extents, center + self.half_extents)
    }
}

fn apply_kinematics(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    layers: Res<TileLayers>,
    level_assets: Res<LevelAssets>,
    mut query: Query<(
        &mut Transform,
        &mut Velocity,
        &mut Grounded,
        &Body,
        &Collider,
    )>,
) {
    let dt = time.delta_seconds();
    let bounds = level_assets.bounds();

    for (mut transform, mut velocity, mut grounded, body, collider) in &mut query {
        let world_bounds = bounds.filter(|_| body.collide_world_bounds);
        let mut position = transform.translation.truncate();
        let blocked = step_body(
            &mut position,
            &mut velocity.0,
            collider.half_extents,
            body.bounce,
            dt,
            &settings,
            &layers.world,
            world_bounds,
        );

        grounded.0 = blocked.down;
        transform.translation.x = position.x;
        transform.translation.y = position.y;
    }
}

/// Which sides were blocked during a step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Blocked {
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub up: bool,
}

const SKIN: f32 = 0.001;

/// Advances one body by `dt`: gravity, then horizontal and vertical moves resolved against the
/// solid layer, then the optional world rectangle.
#[allow(clippy::too_many_arguments)]
pub fn step_body(
    position: &mut Vec2,
    velocity: &mut Vec2,
    half: Vec2,
    bounce: f32,
    dt: f32,
    settings: &MovementSettings,
    solids: &TileLayer,
    world_bounds: Option<Rect>,
) -> Blocked {
    velocity.y -= settings.gravity * dt;

    let mut blocked = Blocked::default();
    let rebound = |v: f32| {
        let v = -v * bounce;
        if v.abs() < settings.rest_speed {
            0.0
        } else {
            v
        }
    };

    if let Some(dir) = resolve_horizontal(position, velocity.x, half, dt, solids) {
        velocity.x = rebound(velocity.x);
        blocked.left = dir < 0.0;
        blocked.right = dir > 0.0;
    }

    if let Some(dir) = resolve_vertical(position, velocity.y, half, dt, solids) {
        velocity.y = rebound(velocity.y);
        blocked.down = dir < 0.0;
        blocked.up = dir > 0.0;
    }

    if let Some(bounds) = world_bounds {
        if position.x - half.x < bounds.min.x {
            position.x = bounds.min.x + half.x;
            if velocity.x < 0.0 {
                velocity.x = rebound(velocity.x);
            }
            blocked.left = true;
        } else if position.x + half.x > bounds.max.x {
            position.x = bounds.max.x - half.x;
            if velocity.x > 0.0 {
                velocity.x = rebound(velocity.x);
            }
            blocked.right = true;
        }

        if position.y - half.y <= bounds.min.y {
            position.y = bounds.min.y + half.y;
            if velocity.y < 0.0 {
                velocity.y = rebound(velocity.y);
            }
            blocked.down = true;
        } else if position.y + half.y > bounds.max.y {
            position.y = bounds.max.y - half.y;
            if velocity.y > 0.0 {
                velocity.y = rebound(velocity.y);
            }
            blocked.up = true;
        }
    }

    blocked
}

/// Cell indices from `from` to `to` inclusive, walking in the direction of travel.
fn cells_between(from: i32, to: i32) -> impl Iterator<Item = i32> {
    let step = if to >= from { 1 } else { -1 };
    (0..=(to - from).abs()).map(move |offset| from + offset * step)
}

/// Moves along x and snaps against the first solid column between the current leading edge and
/// the destination, so long frames cannot skip a wall. Returns the direction of travel when
/// blocked.
fn resolve_horizontal(
    position: &mut Vec2,
    velocity: f32,
    half: Vec2,
    dt: f32,
    map: &TileLayer,
) -> Option<f32> {
    if velocity.abs() < f32::EPSILON {
        return None;
    }

    let new_x = position.x + velocity * dt;
    if map.is_empty() {
        position.x = new_x;
        return None;
    }
    let dir = velocity.signum();

    let bottom = position.y - half.y + SKIN;
    let top = position.y + half.y - SKIN;

    let tile_width = map.tile_size.x;
    let min_tile_y = ((bottom - map.origin.y) / map.tile_size.y).floor() as i32;
    let max_tile_y = ((top - map.origin.y) / map.tile_size.y).floor() as i32;

    let column = |x: f32| ((x - map.origin.x) / tile_width).floor() as i32;
    let (from, to) = if dir > 0.0 {
        (column(position.x + half.x), column(new_x + half.x))
    } else {
        (column(position.x - half.x), column(new_x - half.x))
    };

    for tile_x in cells_between(from, to) {
        for ty in min_tile_y..=max_tile_y {
            if map.is_solid(IVec2::new(tile_x, ty)) {
                position.x = if dir > 0.0 {
                    map.origin.x + tile_x as f32 * tile_width - half.x - SKIN
                } else {
                    map.origin.x + (tile_x + 1) as f32 * tile_width + half.x + SKIN
                };
                return Some(dir);
            }
        }
    }

    position.x = new_x;
    None
}

fn resolve_vertical(
    position: &mut Vec2,
    velocity: f32,
    half: Vec2,
    dt: f32,
    map: &TileLayer,
) -> Option<f32> {
    if velocity.abs() < f32::EPSILON {
        return None;
    }

    let new_y = position.y + velocity * dt;
    if map.is_empty() {
        position.y = new_y;
        return None;
    }
    let dir = velocity.signum();
    let left = position.x - half.x + SKIN;
    let right = position.x + half.x - SKIN;
    let tile_width = map.tile_size.x;
    let tile_height = map.tile_size.y;
    let min_tile_x = ((left - map.origin.x) / tile_width).floor() as i32;
    let max_tile_x = ((right - map.origin.x) / tile_width).floor() as i32;

    let row = |y: f32| ((y - map.origin.y) / tile_height).floor() as i32;
    let (from, to) = if dir < 0.0 {
        (row(position.y - half.y), row(new_y - half.y))
    } else {
        (row(position.y + half.y), row(new_y + half.y))
    };

    for tile_y in cells_between(from, to) {
        for tx in min_tile_x..=max_tile_x {
            if map.is_solid(IVec2::new(tx, tile_y)) {
                position.y = if dir < 0.0 {
                    map.origin.y + (tile_y + 1) as f32 * tile_height + half.y + SKIN
                } else {
                    map.origin.y + tile_y as f32 * tile_height - half.y - SKIN
                };
                return Some(dir);
            }
        }
    }

    position.y = new_y;
    None
}
