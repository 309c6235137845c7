//! Application entry point: composes the Bevy runtime, core plugins, and window configuration.
//!
//! Everything gameplay-related lives in `CoinPlatformerPlugin` (see `app.rs`); this file only
//! sizes the window, picks asset settings for desktop vs web, and starts the main loop.

mod animation;
mod app;
mod atlas;
mod camera;
mod coins;
mod input;
mod level;
mod movement;
mod player;
mod state;
mod tiles;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::CoinPlatformerPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::render::texture::ImagePlugin;
use bevy::window::{Window, WindowResolution};

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // 800×600 logical pixels with a 1.0 camera scale, so one map pixel is one screen pixel.
    let primary_window = Window {
        title: "Coin Platformer".to_string(),
        resolution: WindowResolution::new(800.0, 600.0),
        resizable: false,
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    let mut default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest());

    // Hot reload only makes sense with a local filesystem behind the asset server.
    let watch_assets = cfg!(not(target_arch = "wasm32"));
    default_plugins = default_plugins.set(AssetPlugin {
        file_path: "assets".to_owned(),
        watch_for_changes_override: Some(watch_assets),
        ..default()
    });

    App::new()
        .insert_resource(ClearColor(Color::srgb_u8(0xcc, 0xcc, 0xff)))
        .add_plugins(default_plugins)
        .add_plugins(CoinPlatformerPlugin)
        .run();
}
