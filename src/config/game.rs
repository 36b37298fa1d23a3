/// Game configuration constants.
///
/// This module defines the default match layout (player spread, wall size,
/// health) and the level presentation timings.
use std::time::Duration;

/// Smallest distance (world units) between a player and the center wall.
pub const MIN_PLAYER_DISTANCE: f32 = 5.0;

/// Random spread added on top of `MIN_PLAYER_DISTANCE`.
pub const MAX_PLAYER_DISTANCE: f32 = 45.0;

/// World y coordinate of the lowest wall brick.
pub const WALL_BASE_POSITION: f32 = -4.0;

/// Height of a single wall brick.
pub const BRICK_HEIGHT: f32 = 1.0;

/// Inclusive range of wall heights (in bricks) for a new match.
pub const MIN_WALL_HEIGHT: u32 = 2;
pub const MAX_WALL_HEIGHT: u32 = 8;

/// Health each player starts a match with.
pub const STARTING_HEALTH: i32 = 100;

/// How long the winner banner stays up before the end-game menu shows.
pub const END_GAME_DELAY: Duration = Duration::from_secs(2);
