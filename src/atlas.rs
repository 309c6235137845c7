//! Named-frame sprite atlases in the TexturePacker "JSON hash" layout:
//!
//! ```json
//! { "frames": { "p1_stand": { "frame": { "x": 0, "y": 0, "w": 66, "h": 92 } } },
//!   "meta": { "image": "player.png", "size": { "w": 508, "h": 208 } } }
//! ```
//!
//! The loader turns one of these into a `TextureAtlasLayout`, a handle to the sheet image, and a
//! name -> index table so animations can address frames by name.

use std::collections::HashMap;

use bevy::asset::io::Reader;
use bevy::asset::{AssetLoader, AsyncReadExt, LoadContext};
use bevy::math::{URect, UVec2};
use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

pub struct AtlasPlugin;

impl Plugin for AtlasPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<FrameAtlas>()
            .register_asset_loader(FrameAtlasLoader);
    }
}

#[derive(Asset, TypePath, Debug)]
pub struct FrameAtlas {
    pub image: Handle<Image>,
    pub layout: Handle<TextureAtlasLayout>,
    frames: HashMap<String, FrameInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub index: usize,
    pub size: Vec2,
}

impl FrameAtlas {
    pub fn new(
        image: Handle<Image>,
        layout: Handle<TextureAtlasLayout>,
        frames: HashMap<String, FrameInfo>,
    ) -> Self {
        Self {
            image,
            layout,
            frames,
        }
    }

    pub fn frame(&self, name: &str) -> Option<FrameInfo> {
        self.frames.get(name).copied()
    }

    pub fn frame_index(&self, name: &str) -> Option<usize> {
        self.frame(name).map(|frame| frame.index)
    }
}

#[derive(Debug, Deserialize)]
struct AtlasFile {
    frames: HashMap<String, AtlasFrame>,
    meta: AtlasMeta,
}

#[derive(Debug, Deserialize)]
struct AtlasFrame {
    frame: PixelRect,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct PixelRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

#[derive(Debug, Deserialize)]
struct AtlasMeta {
    image: String,
    size: PixelSize,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct PixelSize {
    w: u32,
    h: u32,
}

/// Frames of a parsed atlas file, sorted by name so indices are stable across loads.
#[derive(Debug)]
struct ParsedAtlas {
    image: String,
    layout: TextureAtlasLayout,
    frames: HashMap<String, FrameInfo>,
}

#[derive(Debug, Error)]
pub enum FrameAtlasLoaderError {
    #[error("could not read atlas file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse atlas json: {0}")]
    Json(#[from] serde_json::Error),
}

fn parse_atlas(bytes: &[u8]) -> Result<ParsedAtlas, FrameAtlasLoaderError> {
    let file: AtlasFile = serde_json::from_slice(bytes)?;

    let mut names: Vec<&String> = file.frames.keys().collect();
    names.sort();

    let mut layout = TextureAtlasLayout::new_empty(UVec2::new(file.meta.size.w, file.meta.size.h));
    let mut frames = HashMap::with_capacity(names.len());
    for name in names {
        let rect = file.frames[name].frame;
        let index = layout.add_texture(URect::new(rect.x, rect.y, rect.x + rect.w, rect.y + rect.h));
        frames.insert(
            name.clone(),
            FrameInfo {
                index,
                size: Vec2::new(rect.w as f32, rect.h as f32),
            },
        );
    }

    Ok(ParsedAtlas {
        image: file.meta.image,
        layout,
        frames,
    })
}

#[derive(Default)]
pub struct FrameAtlasLoader;

impl AssetLoader for FrameAtlasLoader {
    type Asset = FrameAtlas;
    type Settings = ();
    type Error = FrameAtlasLoaderError;

    async fn load<'a>(
        &'a self,
        reader: &'a mut Reader<'_>,
        _settings: &'a (),
        load_context: &'a mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let parsed = parse_atlas(&bytes)?;

        // The sheet image path is relative to the atlas file.
        let image_path = load_context
            .path()
            .parent()
            .map(|dir| dir.join(&parsed.image))
            .unwrap_or_else(|| parsed.image.clone().into());
        let image = load_context.load(image_path);
        let layout = load_context.add_labeled_asset("layout".to_owned(), parsed.layout);

        Ok(FrameAtlas::new(image, layout, parsed.frames))
    }

    fn extensions(&self) -> &[&str] {
        &["atlas.json"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER_JSON: &str = r#"{
        "frames": {
            "p1_walk02": { "frame": { "x": 73, "y": 0, "w": 72, "h": 97 }, "rotated": false },
            "p1_walk01": { "frame": { "x": 0, "y": 0, "w": 72, "h": 97 }, "rotated": false },
            "p1_stand": { "frame": { "x": 0, "y": 98, "w": 66, "h": 92 }, "rotated": false }
        },
        "meta": { "image": "player.png", "size": { "w": 512, "h": 256 }, "scale": "1" }
    }"#;

    #[test]
    fn frames_are_indexed_in_name_order() {
        let parsed = parse_atlas(PLAYER_JSON.as_bytes()).expect("valid atlas");

        assert_eq!(parsed.image, "player.png");
        assert_eq!(parsed.layout.size, UVec2::new(512, 256));
        assert_eq!(parsed.layout.textures.len(), 3);
        assert_eq!(parsed.frames["p1_stand"].index, 0);
        assert_eq!(parsed.frames["p1_walk01"].index, 1);
        assert_eq!(parsed.frames["p1_walk02"].index, 2);
        assert_eq!(parsed.frames["p1_stand"].size, Vec2::new(66.0, 92.0));
        assert_eq!(parsed.layout.textures[2], URect::new(73, 0, 145, 97));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = parse_atlas(b"{ \"frames\": 3 }").unwrap_err();
        assert!(matches!(err, FrameAtlasLoaderError::Json(_)));
    }
}
