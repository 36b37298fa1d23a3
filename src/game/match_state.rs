//! Match snapshot shared between two friends.
//!
//! One `MatchState` is stored per friend pair, serialized as JSON under the
//! "LevelDefinition" field of the pair's shared group. It names both participants and
//! carries everything the level needs to rebuild the duel: wall, spread, arrows already
//! shot, health and whose turn it is.

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::config::game::{
    MAX_PLAYER_DISTANCE, MAX_WALL_HEIGHT, MIN_PLAYER_DISTANCE, MIN_WALL_HEIGHT, STARTING_HEALTH,
    WALL_BASE_POSITION,
};
use crate::network::types::GameUser;

/// Which side of the wall a player stands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// An arrow that has landed and stays visible on the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShotArrow {
    pub shooter: Side,
    pub x: f32,
    pub y: f32,
    /// Rotation in degrees.
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchState {
    pub player_left_id: String,
    pub player_left_name: String,
    pub player_right_id: String,
    pub player_right_name: String,
    pub wall_position: f32,
    /// Wall height in bricks.
    pub wall_height: u32,
    pub player_distance_from_center: f32,
    pub shot_arrows: Vec<ShotArrow>,
    pub is_player_left_turn: bool,
    pub player_left_health: i32,
    pub player_right_health: i32,
    /// The right player still gets a last shot after the left player's winning hit.
    pub rebuttal_enabled: bool,
    /// Incremented on every successful save; used to detect concurrent writes.
    #[serde(default)]
    pub version: u64,
}

impl MatchState {
    /// A fresh match with `left` challenging `right`, laid out with `rng`.
    pub fn new(left: &GameUser, right: &GameUser, rng: &mut impl Rng) -> Self {
        let mut state = MatchState {
            player_left_id: left.user_id.clone(),
            player_left_name: left.user_name.clone(),
            player_right_id: right.user_id.clone(),
            player_right_name: right.user_name.clone(),
            wall_position: WALL_BASE_POSITION,
            wall_height: MIN_WALL_HEIGHT,
            player_distance_from_center: MIN_PLAYER_DISTANCE,
            shot_arrows: Vec::new(),
            is_player_left_turn: true,
            player_left_health: STARTING_HEALTH,
            player_right_health: STARTING_HEALTH,
            rebuttal_enabled: false,
            version: 0,
        };
        state.set_default(rng);
        state
    }

    /// Reset the board to a new random layout, keeping participants and version.
    pub fn set_default(&mut self, rng: &mut impl Rng) {
        self.wall_position = WALL_BASE_POSITION;
        self.wall_height = rng.random_range(MIN_WALL_HEIGHT..=MAX_WALL_HEIGHT);
        self.player_distance_from_center =
            MIN_PLAYER_DISTANCE + rng.random_range(0.0..MAX_PLAYER_DISTANCE);
        self.shot_arrows.clear();
        self.is_player_left_turn = true;
        self.player_left_health = STARTING_HEALTH;
        self.player_right_health = STARTING_HEALTH;
        self.rebuttal_enabled = false;
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.player_left_id == user_id || self.player_right_id == user_id
    }

    /// Id of the other participant, or `None` if `user_id` is not in this match.
    pub fn opponent_of(&self, user_id: &str) -> Option<&str> {
        if self.player_left_id == user_id {
            Some(&self.player_right_id)
        } else if self.player_right_id == user_id {
            Some(&self.player_left_id)
        } else {
            None
        }
    }

    pub fn side_of(&self, user_id: &str) -> Option<Side> {
        if self.player_left_id == user_id {
            Some(Side::Left)
        } else if self.player_right_id == user_id {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
