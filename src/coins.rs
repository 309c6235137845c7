//! Tile-based coin pickup. Overlaps between the player and the `Coins` layer are dispatched
//! through a table of callbacks keyed by tile index; the coin callback removes the tile.

use std::collections::HashMap;

use bevy::math::IVec2;
use bevy::prelude::*;
use bevy_ecs_ldtk::prelude::*;

use crate::level::LevelConfig;
use crate::movement::Collider;
use crate::player::Player;
use crate::state::{GameSet, GameState};
use crate::tiles::{TileLayer, TileLayers};

pub struct CoinsPlugin;

impl Plugin for CoinsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TileCallbacks>()
            .add_event::<CoinCollected>()
            .add_systems(Startup, register_coin_callback)
            .add_systems(
                Update,
                (detect_coin_overlaps, despawn_collected_coins)
                    .chain()
                    .in_set(GameSet::Effects)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Called with the layer and the overlapped cell. Returns whether the overlap should block
/// movement like a solid tile would.
pub type TileCallback = fn(&mut TileLayer, IVec2) -> bool;

#[derive(Resource, Default)]
pub struct TileCallbacks {
    callbacks: HashMap<i32, TileCallback>,
}

impl TileCallbacks {
    pub fn set(&mut self, tile_index: i32, callback: TileCallback) {
        self.callbacks.insert(tile_index, callback);
    }

    pub fn get(&self, tile_index: i32) -> Option<TileCallback> {
        self.callbacks.get(&tile_index).copied()
    }
}

/// Removes the coin at `coords`. Coins never block, and a coin that is already gone is left
/// alone.
pub fn collect_coin(layer: &mut TileLayer, coords: IVec2) -> bool {
    layer.remove_tile_at(coords);
    false
}

/// Sent once per coin, the tick it disappears from the layer.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinCollected {
    pub coords: IVec2,
}

/// Result of one callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOverlap {
    pub coords: IVec2,
    pub tile_index: i32,
    pub blocks: bool,
    /// The callback took the tile out of the layer.
    pub removed: bool,
}

/// Runs the registered callback for every occupied cell of `layer` under the box `min..max`.
pub fn dispatch_tile_overlaps(
    layer: &mut TileLayer,
    callbacks: &TileCallbacks,
    min: Vec2,
    max: Vec2,
) -> Vec<TileOverlap> {
    if layer.is_empty() {
        return Vec::new();
    }

    let cells: Vec<IVec2> = layer.cells_overlapping(min, max).collect();
    let mut overlaps = Vec::new();

    for coords in cells {
        let Some(tile_index) = layer.tile_at(coords) else {
            continue;
        };
        let Some(callback) = callbacks.get(tile_index) else {
            continue;
        };

        let blocks = callback(layer, coords);
        overlaps.push(TileOverlap {
            coords,
            tile_index,
            blocks,
            removed: !layer.has_tile(coords),
        });
    }

    overlaps
}

fn register_coin_callback(config: Res<LevelConfig>, mut callbacks: ResMut<TileCallbacks>) {
    callbacks.set(config.coin_tile_index, collect_coin);
}

pub fn detect_coin_overlaps(
    callbacks: Res<TileCallbacks>,
    mut layers: ResMut<TileLayers>,
    players: Query<(&Transform, &Collider), With<Player>>,
    mut collected: EventWriter<CoinCollected>,
) {
    for (transform, collider) in &players {
        let (min, max) = collider.aabb(transform.translation.truncate());
        for overlap in dispatch_tile_overlaps(&mut layers.coins, &callbacks, min, max) {
            if overlap.removed {
                debug!("Coin collected at {}", overlap.coords);
                collected.send(CoinCollected {
                    coords: overlap.coords,
                });
            }
            if overlap.blocks {
                debug!(
                    "Tile {} at {} requested blocking; only the World layer blocks movement",
                    overlap.tile_index, overlap.coords
                );
            }
        }
    }
}

/// Despawns the LDtk tile entities of collected coins so they stop rendering.
fn despawn_collected_coins(
    mut commands: Commands,
    mut events: EventReader<CoinCollected>,
    cells: Query<(Entity, &GridCoords, &Parent), With<IntGridCell>>,
    layer_query: Query<&LayerMetadata>,
    config: Res<LevelConfig>,
) {
    for event in events.read() {
        for (entity, coords, parent) in &cells {
            if coords.x != event.coords.x || coords.y != event.coords.y {
                continue;
            }

            let in_coin_layer = layer_query
                .get(parent.get())
                .map(|layer| layer.identifier == config.coin_layer)
                .unwrap_or(false);

            if in_coin_layer {
                commands.entity(entity).despawn_recursive();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs_ldtk::ldtk::LayerInstance;

    const COIN: i32 = 17;

    fn coin_layer() -> TileLayer {
        let mut layer = TileLayer::new(Vec2::splat(70.0), Vec2::ZERO);
        for coords in [IVec2::new(3, 5), IVec2::new(4, 5), IVec2::new(8, 2)] {
            layer.set_tile(coords, COIN);
        }
        layer
    }

    fn callbacks() -> TileCallbacks {
        let mut callbacks = TileCallbacks::default();
        callbacks.set(COIN, collect_coin);
        callbacks
    }

    #[test]
    fn collecting_twice_is_a_no_op() {
        let mut layer = coin_layer();
        let coin = IVec2::new(3, 5);

        assert!(!collect_coin(&mut layer, coin));
        assert!(!layer.has_tile(coin));

        assert!(!collect_coin(&mut layer, coin));
        assert!(!layer.has_tile(coin));
        assert_eq!(layer.len(), 2);
    }

    #[test]
    fn collecting_every_coin_leaves_world_untouched() {
        let mut layers = TileLayers {
            world: TileLayer::new(Vec2::splat(70.0), Vec2::ZERO),
            coins: coin_layer(),
        };
        for x in 0..12 {
            layers.world.set_tile(IVec2::new(x, 0), 1);
        }

        for coords in [IVec2::new(3, 5), IVec2::new(4, 5), IVec2::new(8, 2)] {
            collect_coin(&mut layers.coins, coords);
        }

        assert!(layers.coins.is_empty());
        assert_eq!(layers.world.len(), 12);
        assert!((0..12).all(|x| layers.world.is_solid(IVec2::new(x, 0))));
    }

    #[test]
    fn overlap_dispatch_removes_only_touched_coins() {
        let mut layer = coin_layer();
        // Straddles cells (3,5) and (4,5).
        let min = Vec2::new(3.0 * 70.0 + 40.0, 5.0 * 70.0 + 10.0);
        let max = min + Vec2::new(60.0, 40.0);

        let overlaps = dispatch_tile_overlaps(&mut layer, &callbacks(), min, max);

        assert_eq!(overlaps.len(), 2);
        assert!(overlaps.iter().all(|o| o.removed && !o.blocks));
        assert!(layer.has_tile(IVec2::new(8, 2)));
        assert_eq!(layer.len(), 1);

        // A second pass over the same spot finds nothing left to collect.
        assert!(dispatch_tile_overlaps(&mut layer, &callbacks(), min, max).is_empty());
    }

    #[test]
    fn tiles_without_callback_are_ignored() {
        let mut layer = coin_layer();
        layer.set_tile(IVec2::new(0, 0), 3);

        let overlaps =
            dispatch_tile_overlaps(&mut layer, &callbacks(), Vec2::ZERO, Vec2::splat(50.0));

        assert!(overlaps.is_empty());
        assert!(layer.has_tile(IVec2::new(0, 0)));
    }

    fn spawn_cell(app: &mut App, identifier: &str, coords: GridCoords, value: i32) -> Entity {
        let metadata = LayerMetadata::from(&LayerInstance {
            identifier: identifier.to_owned(),
            ..default()
        });
        let layer = app.world_mut().spawn(metadata).id();
        app.world_mut()
            .spawn((coords, IntGridCell { value }))
            .set_parent(layer)
            .id()
    }

    #[test]
    fn collected_coin_despawns_only_the_coin_cell() {
        let mut app = App::new();
        app.init_resource::<LevelConfig>()
            .add_event::<CoinCollected>()
            .add_systems(Update, despawn_collected_coins);

        let wall = spawn_cell(&mut app, "World", GridCoords::new(3, 5), 1);
        let coin = spawn_cell(&mut app, "Coins", GridCoords::new(3, 5), COIN);
        let other_coin = spawn_cell(&mut app, "Coins", GridCoords::new(8, 2), COIN);

        app.world_mut().send_event(CoinCollected {
            coords: IVec2::new(3, 5),
        });
        app.update();

        assert!(app.world().get_entity(coin).is_none());
        assert!(app.world().get_entity(wall).is_some());
        assert!(app.world().get_entity(other_coin).is_some());
    }

    #[test]
    fn player_overlap_sends_one_event_per_coin() {
        let mut app = App::new();
        app.insert_resource(callbacks())
            .insert_resource(TileLayers {
                world: TileLayer::default(),
                coins: coin_layer(),
            })
            .add_event::<CoinCollected>()
            .add_systems(Update, detect_coin_overlaps);

        app.world_mut().spawn((
            Player,
            Transform::from_xyz(3.0 * 70.0 + 35.0, 5.0 * 70.0 + 35.0, 1.0),
            Collider::from_size(Vec2::splat(20.0)),
        ));

        app.update();
        app.update();

        let events = app.world().resource::<Events<CoinCollected>>();
        let mut reader = events.get_reader();
        let collected: Vec<CoinCollected> = reader.read(events).copied().collect();
        assert_eq!(
            collected,
            vec![CoinCollected {
                coords: IVec2::new(3, 5)
            }]
        );
        assert!(!app.world().resource::<TileLayers>().coins.has_tile(IVec2::new(3, 5)));
    }
}
