use crate::game::Board;
use crate::scores::ScoreLedger;
use minijinja::{context, Environment};
use serde::Serialize;

const GAME_PAGE: &str = "game.html";
const SCORES_PAGE: &str = "best_scores.html";

#[derive(Serialize)]
struct LightButton {
    button: usize,
    symbol: &'static str,
    class: &'static str,
}

#[derive(Serialize)]
struct ScoreRow<'a> {
    size: usize,
    moves: u32,
    player_name: &'a str,
    date: String,
}

/// Page templates, compiled into the binary. Player names are HTML-escaped.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(GAME_PAGE, include_str!("../templates/game.html"))?;
        env.add_template(SCORES_PAGE, include_str!("../templates/best_scores.html"))?;
        Ok(Self { env })
    }

    /// One submit button per light, numbered from 1.
    pub fn render_board(&self, board: &Board) -> Result<String, minijinja::Error> {
        let lights: Vec<LightButton> = board
            .lights()
            .iter()
            .enumerate()
            .map(|(index, light)| LightButton {
                button: index + 1,
                symbol: light.symbol(),
                class: light.css_class(),
            })
            .collect();

        self.env.get_template(GAME_PAGE)?.render(context! {
            lights => lights,
            moves => board.moves(),
            player_name => board.player_name(),
        })
    }

    pub fn render_scores(&self, ledger: &ScoreLedger) -> Result<String, minijinja::Error> {
        let scores: Vec<ScoreRow<'_>> = ledger
            .iter()
            .map(|(size, record)| ScoreRow {
                size,
                moves: record.moves,
                player_name: &record.player_name,
                date: record.date.format("%Y-%m-%d").to_string(),
            })
            .collect();

        self.env
            .get_template(SCORES_PAGE)?
            .render(context! { scores => scores })
    }
}
