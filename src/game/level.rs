//! Level lifecycle.
//!
//! Rebuilds a duel from a [`MatchState`]: which phase to open in, where the wall bricks
//! and both players go, and whether the match is already over. The host renders the
//! resulting [`LevelSetup`]; nothing here touches the scene.

use log::info;
use std::time::Duration;

use super::match_state::{MatchState, ShotArrow};
use crate::config::game::{BRICK_HEIGHT, END_GAME_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Replaying the opponent's last shot before handing over control.
    ShowLastMove,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndGameState {
    LeftWins,
    RightWins,
    Tie,
}

impl EndGameState {
    pub fn banner(&self) -> &'static str {
        match self {
            EndGameState::LeftWins => "Left Player Wins!",
            EndGameState::RightWins => "Right Player Wins!",
            EndGameState::Tie => "Tie game!",
        }
    }
}

/// Outcome implied by the players' health.
///
/// A left-side win waits while the right player still has a rebuttal shot.
pub fn outcome(state: &MatchState) -> Option<EndGameState> {
    let left_down = state.player_left_health <= 0;
    let right_down = state.player_right_health <= 0;
    match (left_down, right_down) {
        (true, true) => Some(EndGameState::Tie),
        (true, false) => Some(EndGameState::RightWins),
        (false, true) if !state.rebuttal_enabled => Some(EndGameState::LeftWins),
        _ => None,
    }
}

/// Everything the host needs to lay out a level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSetup {
    pub phase: GamePhase,
    /// y position of each wall brick, bottom first.
    pub bricks: Vec<f32>,
    pub player_left_x: f32,
    pub player_right_x: f32,
    pub shot_arrows: Vec<ShotArrow>,
    pub is_player_left_turn: bool,
    pub player_left_health: i32,
    pub player_right_health: i32,
    pub show_rebuttal: bool,
    pub end_game: Option<EndGameState>,
}

/// Running score across the matches of one sitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Default)]
pub struct LevelManager {
    pub score: Score,
    current: Option<LevelSetup>,
}

impl LevelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&LevelSetup> {
        self.current.as_ref()
    }

    /// Replace the current level with the one described by `state`.
    pub fn start_playing(&mut self, state: &MatchState) -> &LevelSetup {
        let phase = if state.shot_arrows.is_empty() {
            GamePhase::Playing
        } else {
            GamePhase::ShowLastMove
        };
        let bricks = (0..state.wall_height)
            .map(|i| state.wall_position + i as f32 * BRICK_HEIGHT)
            .collect();

        let mut setup = LevelSetup {
            phase,
            bricks,
            player_left_x: -state.player_distance_from_center,
            player_right_x: state.player_distance_from_center,
            shot_arrows: state.shot_arrows.clone(),
            is_player_left_turn: state.is_player_left_turn,
            player_left_health: state.player_left_health,
            player_right_health: state.player_right_health,
            show_rebuttal: state.rebuttal_enabled,
            end_game: None,
        };
        if let Some(end) = outcome(state) {
            self.credit(end);
            setup.phase = GamePhase::GameOver;
            setup.end_game = Some(end);
        }
        self.current.insert(setup)
    }

    /// Close the current level with `end`, crediting the winner.
    ///
    /// Returns the banner text and how long it stays up before the end-game menu.
    pub fn end_game(&mut self, end: EndGameState) -> (&'static str, Duration) {
        self.credit(end);
        if let Some(setup) = self.current.as_mut() {
            setup.phase = GamePhase::GameOver;
            setup.end_game = Some(end);
        }
        (end.banner(), END_GAME_DELAY)
    }

    fn credit(&mut self, end: EndGameState) {
        match end {
            EndGameState::LeftWins => self.score.left += 1,
            EndGameState::RightWins => self.score.right += 1,
            EndGameState::Tie => {}
        }
        info!("[Level] Game over: {:?} (score {}-{})", end, self.score.left, self.score.right);
    }
}
