//! Linear Lights Out.
//!
//! A board is a row of lights, each either `O` or `X`. Pressing a light flips
//! it and its immediate neighbours; the game is won once every light shows `X`.
//! There is exactly one game per server, shared by every client.

use crate::error::HandlerFault;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

pub const DEFAULT_LIGHTS: usize = 7;
pub const MAX_LIGHTS: usize = 1024;
pub const DEFAULT_PLAYER: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Light {
    /// `O`, the state unscrambled lights start in.
    Off,
    /// `X`, the state every light must reach.
    On,
}

impl Light {
    fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Off => "O",
            Self::On => "X",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Off => "button_o",
            Self::On => "button_x",
        }
    }
}

/// Settings for a new game, as submitted by the start form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub size: usize,
    /// Lights that start as `X`; clamped to `size` when the game starts.
    pub preset: usize,
    pub player_name: String,
}

impl NewGame {
    /// Read `number_of_lights`, `off_lights` and `player_name`, falling back to
    /// defaults for anything absent or unparsable.
    pub fn from_form(fields: &HashMap<String, String>) -> Self {
        let size = fields
            .get("number_of_lights")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&size| size > 0)
            .unwrap_or(DEFAULT_LIGHTS)
            .min(MAX_LIGHTS);
        let preset = fields
            .get("off_lights")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let player_name = fields
            .get("player_name")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PLAYER.to_string());

        Self {
            size,
            preset,
            player_name,
        }
    }
}

/// Parse the 1-based `button_index` form field (default `1`).
pub fn button_from_form(fields: &HashMap<String, String>) -> Result<usize, HandlerFault> {
    let raw = fields.get("button_index").map_or("1", String::as_str);
    match raw.trim().parse::<usize>() {
        Ok(button) if button > 0 => Ok(button),
        _ => Err(HandlerFault::InvalidButtonIndex(raw.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    lights: Vec<Light>,
    moves: u32,
    player_name: String,
}

impl Board {
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn size(&self) -> usize {
        self.lights.len()
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn is_solved(&self) -> bool {
        self.lights.iter().all(|&light| light == Light::On)
    }

    /// Flip the light at `index` and its existing neighbours.
    fn press(&mut self, index: usize) {
        let first = index.saturating_sub(1);
        let last = (index + 1).min(self.lights.len() - 1);
        for light in &mut self.lights[first..=last] {
            *light = light.toggled();
        }
        self.moves = self.moves.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameState {
    Idle,
    Active(Board),
}

/// A won game, ready to be offered to the score ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedGame {
    pub size: usize,
    pub moves: u32,
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggled {
    InProgress,
    Won(CompletedGame),
}

pub struct Game {
    state: GameState,
    rng: StdRng,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Game whose scrambles are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_rng(rng: StdRng) -> Self {
        Self {
            state: GameState::Idle,
            rng,
        }
    }

    /// The board, only while a game is active.
    pub fn board(&self) -> Option<&Board> {
        match &self.state {
            GameState::Active(board) => Some(board),
            GameState::Idle => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, GameState::Active(_))
    }

    /// Start a fresh game, replacing any game in progress.
    ///
    /// `preset` distinct lights, drawn uniformly without replacement, start as
    /// `X`. A preset equal to the size yields a board that is already solved;
    /// that is not a win, since wins are only detected after a move.
    pub fn start(&mut self, new_game: NewGame) {
        let size = new_game.size;
        let preset = new_game.preset.min(size);

        let mut lights = vec![Light::Off; size];
        for index in rand::seq::index::sample(&mut self.rng, size, preset) {
            lights[index] = Light::On;
        }

        self.state = GameState::Active(Board {
            lights,
            moves: 0,
            player_name: new_game.player_name,
        });
    }

    /// Press the 1-based `button`. The state is only touched once the press is
    /// known to be valid. Winning ends the game.
    pub fn toggle(&mut self, button: usize) -> Result<Toggled, HandlerFault> {
        let GameState::Active(board) = &mut self.state else {
            return Err(HandlerFault::NoActiveGame);
        };
        if button == 0 || button > board.size() {
            return Err(HandlerFault::ButtonOutOfRange {
                button,
                size: board.size(),
            });
        }

        board.press(button - 1);
        if !board.is_solved() {
            return Ok(Toggled::InProgress);
        }

        let completed = CompletedGame {
            size: board.size(),
            moves: board.moves(),
            player_name: std::mem::take(&mut board.player_name),
        };
        self.state = GameState::Idle;
        Ok(Toggled::Won(completed))
    }
}
