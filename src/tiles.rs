//! Tile layers mirrored out of the LDtk level: the solid `World` geometry and the collectible
//! `Coins` overlay. Gameplay code works on these plain grids instead of querying LDtk entities.

use std::collections::HashMap;

use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;

use crate::level::{LevelAssets, LevelConfig};

pub struct TilesPlugin;

impl Plugin for TilesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TileLayers>().add_systems(
            PostUpdate,
            rebuild_tile_layers.after(crate::level::cache_level_transform),
        );
    }
}

/// Keeps cell queries from reporting a neighbour the box only touches.
const EDGE_EPSILON: f32 = 0.001;

/// A sparse grid of tile indices. Cell `(0, 0)` is the bottom-left tile of the level and `y`
/// grows upwards, matching LDtk's `GridCoords` and Bevy's world axes.
#[derive(Debug, Clone, Default)]
pub struct TileLayer {
    pub tile_size: Vec2,
    pub origin: Vec2,
    tiles: HashMap<IVec2, i32>,
}

impl TileLayer {
    pub fn new(tile_size: Vec2, origin: Vec2) -> Self {
        Self {
            tile_size,
            origin,
            tiles: HashMap::new(),
        }
    }

    pub fn set_tile(&mut self, coords: IVec2, index: i32) {
        self.tiles.insert(coords, index);
    }

    pub fn tile_at(&self, coords: IVec2) -> Option<i32> {
        self.tiles.get(&coords).copied()
    }

    pub fn has_tile(&self, coords: IVec2) -> bool {
        self.tiles.contains_key(&coords)
    }

    /// Every tile in a collision layer blocks, whatever its index.
    pub fn is_solid(&self, coords: IVec2) -> bool {
        self.has_tile(coords)
    }

    /// Removes the tile and hands back its index. Removing an empty cell is a no-op.
    pub fn remove_tile_at(&mut self, coords: IVec2) -> Option<i32> {
        self.tiles.remove(&coords)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    /// Grid cell containing a world-space point.
    pub fn cell_at(&self, point: Vec2) -> IVec2 {
        let local = (point - self.origin) / self.tile_size;
        IVec2::new(local.x.floor() as i32, local.y.floor() as i32)
    }

    /// Cells intersected by the world-space box `min..max`. A box whose edge lies exactly on a
    /// grid line does not reach into the neighbouring cell.
    pub fn cells_overlapping(&self, min: Vec2, max: Vec2) -> impl Iterator<Item = IVec2> {
        let low = self.cell_at(min);
        let high = self.cell_at(max - Vec2::splat(EDGE_EPSILON));
        let valid = min.x < max.x && min.y < max.y;
        let (xs, ys) = if valid {
            (low.x..=high.x, low.y..=high.y)
        } else {
            (1..=0, 1..=0)
        };
        ys.flat_map(move |y| xs.clone().map(move |x| IVec2::new(x, y)))
    }
}

/// The two layers the game cares about. The layers never share storage, so clearing coins
/// cannot touch world geometry.
#[derive(Resource, Debug, Default)]
pub struct TileLayers {
    pub world: TileLayer,
    pub coins: TileLayer,
}

impl TileLayers {
    pub fn clear(&mut self) {
        self.world.clear();
        self.coins.clear();
    }
}

fn rebuild_tile_layers(
    mut events: EventReader<LevelEvent>,
    int_cells: Query<(&GridCoords, &IntGridCell, &Parent)>,
    layer_query: Query<&LayerMetadata>,
    config: Res<LevelConfig>,
    level_assets: Res<LevelAssets>,
    mut layers: ResMut<TileLayers>,
) {
    let mut needs_rebuild = false;
    let mut should_clear = false;

    for event in events.read() {
        match event {
            LevelEvent::Spawned(_) => needs_rebuild = true,
            LevelEvent::Despawned(_) => should_clear = true,
            _ => {}
        }
    }

    if should_clear {
        layers.clear();
    }

    if !needs_rebuild {
        return;
    }

    let tile_size = Vec2::splat(config.tile_size);
    let origin = level_assets.level_origin.unwrap_or(Vec2::ZERO);
    layers.world = TileLayer::new(tile_size, origin);
    layers.coins = TileLayer::new(tile_size, origin);

    for (coords, cell, parent) in &int_cells {
        if cell.value <= 0 {
            continue;
        }

        let Ok(layer) = layer_query.get(parent.get()) else {
            continue;
        };

        let coords = IVec2::new(coords.x, coords.y);
        if layer.identifier == config.world_layer {
            layers.world.set_tile(coords, cell.value);
        } else if layer.identifier == config.coin_layer {
            layers.coins.set_tile(coords, cell.value);
        }
    }

    if layers.world.is_empty() {
        warn!(
            "World layer '{}' is empty. Ensure the LDtk IntGrid layer marks solid tiles with a non-zero value.",
            config.world_layer
        );
    }

    info!(
        "Tile layers rebuilt: {} solid tiles, {} coins",
        layers.world.len(),
        layers.coins.len()
    );
}
