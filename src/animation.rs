//! Frame-based sprite animation. Clips are lists of atlas indices built from frame names; each
//! animated entity carries a `SpriteAnimation` cursor that the tick system advances and writes
//! into its `TextureAtlas`.

use std::collections::HashMap;

use bevy::prelude::*;
use thiserror::Error;

use crate::atlas::FrameAtlas;
use crate::state::{GameSet, GameState};

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AnimationLibrary>().add_systems(
            Update,
            tick_sprite_animations
                .in_set(GameSet::Effects)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

/// Builds `<prefix><index>` names for `start..=end`, left-padding the index with zeros to
/// `zero_pad` digits: `frame_names("p1_walk", 1, 3, 2)` gives `p1_walk01..p1_walk03`.
pub fn frame_names(prefix: &str, start: u32, end: u32, zero_pad: usize) -> Vec<String> {
    (start..=end)
        .map(|index| format!("{prefix}{index:0>zero_pad$}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub frames: Vec<usize>,
    pub fps: f32,
    pub looping: bool,
}

impl AnimationClip {
    pub fn frame_duration(&self) -> f32 {
        1.0 / self.fps.max(f32::EPSILON)
    }

    /// Looks every name up in `atlas`. Fails on the first unknown frame.
    pub fn from_frames(
        atlas: &FrameAtlas,
        names: &[String],
        fps: f32,
        looping: bool,
    ) -> Result<Self, MissingFrame> {
        let frames = names
            .iter()
            .map(|name| atlas.frame_index(name).ok_or_else(|| MissingFrame(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            frames,
            fps,
            looping,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("atlas has no frame named '{0}'")]
pub struct MissingFrame(pub String);

/// Clips shared by every animated sprite, keyed by name ("walk", "idle").
#[derive(Resource, Debug, Default)]
pub struct AnimationLibrary {
    clips: HashMap<String, AnimationClip>,
}

impl AnimationLibrary {
    pub fn insert(&mut self, key: impl Into<String>, clip: AnimationClip) {
        self.clips.insert(key.into(), clip);
    }

    pub fn get(&self, key: &str) -> Option<&AnimationClip> {
        self.clips.get(key)
    }
}

/// Playback cursor for one sprite.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct SpriteAnimation {
    current: Option<String>,
    frame: usize,
    elapsed: f32,
    finished: bool,
}

impl SpriteAnimation {
    pub fn playing(key: &str) -> Self {
        let mut animation = Self::default();
        animation.play(key, false);
        animation
    }

    /// Starts `key` from its first frame. With `ignore_if_playing`, asking for the clip that is
    /// already running keeps its progress.
    pub fn play(&mut self, key: &str, ignore_if_playing: bool) {
        if ignore_if_playing && self.current.as_deref() == Some(key) {
            return;
        }
        self.current = Some(key.to_owned());
        self.frame = 0;
        self.elapsed = 0.0;
        self.finished = false;
    }

    /// Advances by `dt` seconds and returns the atlas index to display, if the current clip is
    /// known.
    pub fn advance(&mut self, dt: f32, library: &AnimationLibrary) -> Option<usize> {
        let clip = library.get(self.current.as_deref()?)?;
        if clip.frames.is_empty() {
            return None;
        }

        if !self.finished && clip.frames.len() > 1 {
            self.elapsed += dt;
            let frame_duration = clip.frame_duration();
            while self.elapsed >= frame_duration {
                self.elapsed -= frame_duration;
                if self.frame + 1 < clip.frames.len() {
                    self.frame += 1;
                } else if clip.looping {
                    self.frame = 0;
                } else {
                    self.finished = true;
                    self.elapsed = 0.0;
                    break;
                }
            }
        }

        clip.frames.get(self.frame.min(clip.frames.len() - 1)).copied()
    }
}

fn tick_sprite_animations(
    time: Res<Time>,
    library: Res<AnimationLibrary>,
    mut query: Query<(&mut SpriteAnimation, &mut TextureAtlas)>,
) {
    let dt = time.delta_seconds();
    for (mut animation, mut atlas) in &mut query {
        if let Some(index) = animation.advance(dt, &library) {
            if atlas.index != index {
                atlas.index = index;
            }
        }
    }
}
