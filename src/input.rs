//! Keyboard -> player intent. The resolver itself is a pure function over a button snapshot and
//! the grounded flag; the systems here only gather that snapshot and apply the result.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::animation::SpriteAnimation;
use crate::movement::{Grounded, Velocity};
use crate::player::{Player, PlayerTuning};
use crate::state::{GameSet, GameState};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (read_player_input, apply_player_intent)
                .chain()
                .in_set(GameSet::Input)
                .run_if(in_state(GameState::Playing)),
        );
    }
}

/// Held state of the three logical buttons for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlButtons {
    pub left: bool,
    pub right: bool,
    /// Up and Space both count as jump.
    pub jump: bool,
}

impl ControlButtons {
    pub fn from_keyboard(keyboard: &ButtonInput<KeyCode>) -> Self {
        Self {
            left: keyboard.pressed(KeyCode::ArrowLeft),
            right: keyboard.pressed(KeyCode::ArrowRight),
            jump: keyboard.pressed(KeyCode::ArrowUp) || keyboard.pressed(KeyCode::Space),
        }
    }
}

/// What the player asked for this tick.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerIntent {
    MoveLeft,
    MoveRight,
    Jump,
    #[default]
    Idle,
}

/// Left beats right beats jump beats idle. Jump additionally needs `grounded`, which is what
/// stops a second jump in mid-air.
pub fn resolve_intent(buttons: ControlButtons, grounded: bool) -> PlayerIntent {
    if buttons.left {
        PlayerIntent::MoveLeft
    } else if buttons.right {
        PlayerIntent::MoveRight
    } else if buttons.jump && grounded {
        PlayerIntent::Jump
    } else {
        PlayerIntent::Idle
    }
}

#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// Outcome of applying one intent. `None` fields mean "leave as is".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentEffect {
    pub velocity: Vec2,
    pub facing: Option<Facing>,
    pub animation: Option<&'static str>,
}

pub const WALK_ANIMATION: &str = "walk";
pub const IDLE_ANIMATION: &str = "idle";

/// Maps an intent onto the body. World y points up, so a jump sets a positive vertical speed.
pub fn apply_intent(intent: PlayerIntent, velocity: Vec2, tuning: &PlayerTuning) -> IntentEffect {
    match intent {
        PlayerIntent::MoveLeft => IntentEffect {
            velocity: Vec2::new(-tuning.run_speed, velocity.y),
            facing: Some(Facing::Left),
            animation: Some(WALK_ANIMATION),
        },
        PlayerIntent::MoveRight => IntentEffect {
            velocity: Vec2::new(tuning.run_speed, velocity.y),
            facing: Some(Facing::Right),
            animation: Some(WALK_ANIMATION),
        },
        PlayerIntent::Jump => IntentEffect {
            velocity: Vec2::new(velocity.x, tuning.jump_speed),
            facing: None,
            animation: None,
        },
        PlayerIntent::Idle => IntentEffect {
            velocity: Vec2::new(0.0, velocity.y),
            facing: None,
            animation: Some(IDLE_ANIMATION),
        },
    }
}

pub fn read_player_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut query: Query<(&Grounded, &mut PlayerIntent), With<Player>>,
) {
    let buttons = ControlButtons::from_keyboard(&keyboard);
    for (grounded, mut intent) in &mut query {
        *intent = resolve_intent(buttons, grounded.0);
    }
}

pub fn apply_player_intent(
    tuning: Res<PlayerTuning>,
    mut query: Query<
        (
            &PlayerIntent,
            &mut Velocity,
            &mut Facing,
            &mut Sprite,
            Option<&mut SpriteAnimation>,
        ),
        With<Player>,
    >,
) {
    for (intent, mut velocity, mut facing, mut sprite, animation) in &mut query {
        let effect = apply_intent(*intent, velocity.0, &tuning);
        velocity.0 = effect.velocity;

        if let Some(new_facing) = effect.facing {
            *facing = new_facing;
            sprite.flip_x = new_facing == Facing::Left;
        }

        if let (Some(key), Some(mut animation)) = (effect.animation, animation) {
            animation.play(key, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buttons(left: bool, right: bool, jump: bool) -> ControlButtons {
        ControlButtons { left, right, jump }
    }

    #[test]
    fn priority_holds_for_every_combination() {
        for bits in 0..8u8 {
            let input = buttons(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            for grounded in [false, true] {
                let expected = if input.left {
                    PlayerIntent::MoveLeft
                } else if input.right {
                    PlayerIntent::MoveRight
                } else if input.jump && grounded {
                    PlayerIntent::Jump
                } else {
                    PlayerIntent::Idle
                };
                assert_eq!(resolve_intent(input, grounded), expected, "{input:?} {grounded}");
            }
        }
    }

    #[test]
    fn horizontal_input_wins_over_jump() {
        assert_eq!(resolve_intent(buttons(true, true, false), true), PlayerIntent::MoveLeft);
        assert_eq!(resolve_intent(buttons(false, true, true), true), PlayerIntent::MoveRight);
        assert_eq!(resolve_intent(buttons(true, false, true), true), PlayerIntent::MoveLeft);
    }

    #[test]
    fn jump_needs_ground() {
        assert_eq!(resolve_intent(buttons(false, false, true), true), PlayerIntent::Jump);
        assert_eq!(resolve_intent(buttons(false, false, true), false), PlayerIntent::Idle);
        assert_eq!(resolve_intent(buttons(false, true, true), false), PlayerIntent::MoveRight);
    }

    #[test]
    fn idle_stops_horizontal_motion() {
        let tuning = PlayerTuning::default();
        let intent = resolve_intent(ControlButtons::default(), true);
        assert_eq!(intent, PlayerIntent::Idle);

        let effect = apply_intent(intent, Vec2::new(200.0, -35.0), &tuning);
        assert_eq!(effect.velocity, Vec2::new(0.0, -35.0));
        assert_eq!(effect.animation, Some(IDLE_ANIMATION));
        assert_eq!(effect.facing, None);
    }

    #[test]
    fn walk_then_idle_then_single_jump() {
        let tuning = PlayerTuning::default();
        let mut velocity = Vec2::new(0.0, 12.0);

        let effect = apply_intent(resolve_intent(buttons(true, false, false), true), velocity, &tuning);
        assert_eq!(effect.velocity, Vec2::new(-200.0, 12.0));
        assert_eq!(effect.facing, Some(Facing::Left));
        assert_eq!(effect.animation, Some(WALK_ANIMATION));
        velocity = effect.velocity;

        let effect = apply_intent(resolve_intent(ControlButtons::default(), true), velocity, &tuning);
        assert_eq!(effect.velocity, Vec2::new(0.0, 12.0));
        assert_eq!(effect.animation, Some(IDLE_ANIMATION));
        velocity = effect.velocity;

        let effect = apply_intent(resolve_intent(buttons(false, false, true), true), velocity, &tuning);
        assert_eq!(effect.velocity, Vec2::new(0.0, 800.0));
        velocity = effect.velocity;

        // Airborne now: holding Up again must not add another jump impulse.
        let intent = resolve_intent(buttons(false, false, true), false);
        assert_ne!(intent, PlayerIntent::Jump);
        let effect = apply_intent(intent, velocity, &tuning);
        assert_eq!(effect.velocity.y, 800.0);
    }

    #[test]
    fn keyboard_snapshot_treats_space_and_up_alike() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::Space);
        assert!(ControlButtons::from_keyboard(&keyboard).jump);

        keyboard.release(KeyCode::Space);
        keyboard.press(KeyCode::ArrowUp);
        let snapshot = ControlButtons::from_keyboard(&keyboard);
        assert_eq!(snapshot, buttons(false, false, true));
    }

    #[test]
    fn systems_drive_player_components() {
        let mut app = App::new();
        app.init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<PlayerTuning>()
            .add_systems(Update, (read_player_input, apply_player_intent).chain());

        let player = app
            .world_mut()
            .spawn((
                Player,
                Grounded(true),
                PlayerIntent::default(),
                Velocity::default(),
                Facing::default(),
                Sprite::default(),
            ))
            .id();

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::ArrowLeft);
        app.update();

        let world = app.world();
        assert_eq!(world.get::<PlayerIntent>(player), Some(&PlayerIntent::MoveLeft));
        assert_eq!(world.get::<Velocity>(player).map(|v| v.0), Some(Vec2::new(-200.0, 0.0)));
        assert_eq!(world.get::<Facing>(player), Some(&Facing::Left));
        assert!(world.get::<Sprite>(player).is_some_and(|s| s.flip_x));
    }
}
