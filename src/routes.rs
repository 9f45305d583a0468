use crate::clock::Clock;
use crate::error::HandlerFault;
use crate::game::{button_from_form, Game, NewGame, Toggled};
use crate::http::{HttpRequest, HttpResponse};
use crate::mime_types::get_content_type;
use crate::scores::ScoreLedger;
use crate::security::{join_public_path, validate_file_path, validate_request_path};
use crate::template::Templates;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const GAME_PATH: &str = "/game.html";
pub const SCORES_PATH: &str = "/best_scores.html";
pub const TOGGLE_PATH: &str = "/toggle_light";
pub const SHUTDOWN_PATH: &str = "/shutdown";

const DIRECTORY_INDEX: &str = "index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Shutdown,
    GamePage,
    Scoreboard,
    StaticFile,
    StartGame,
    ToggleLight,
    MethodNotAllowed,
}

impl Route {
    /// Resolve a method and a query-free path.
    pub fn resolve(method: &str, path: &str) -> Self {
        match (method, path) {
            ("GET", SHUTDOWN_PATH) => Self::Shutdown,
            ("GET", GAME_PATH) => Self::GamePage,
            ("GET", SCORES_PATH) => Self::Scoreboard,
            ("GET", _) => Self::StaticFile,
            ("POST", GAME_PATH) => Self::StartGame,
            ("POST", TOGGLE_PATH) => Self::ToggleLight,
            _ => Self::MethodNotAllowed,
        }
    }
}

#[derive(Debug)]
pub enum Reply {
    Respond(HttpResponse),
    /// Close the connection without a response and stop serving.
    Shutdown,
}

/// Everything a request can observe or change: the static root, the single
/// game and the score ledger.
pub struct App {
    public_dir: PathBuf,
    game: Game,
    scores: ScoreLedger,
    clock: Box<dyn Clock>,
    templates: Templates,
}

impl App {
    pub fn new(
        public_dir: impl Into<PathBuf>,
        game: Game,
        clock: Box<dyn Clock>,
    ) -> Result<Self, minijinja::Error> {
        Ok(Self {
            public_dir: public_dir.into(),
            game,
            scores: ScoreLedger::new(),
            clock,
            templates: Templates::new()?,
        })
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn scores(&self) -> &ScoreLedger {
        &self.scores
    }

    pub async fn dispatch(&mut self, request: &HttpRequest) -> Result<Reply, HandlerFault> {
        let path = request.route_path();
        let route = Route::resolve(&request.method, path);
        debug!(method = %request.method, path, ?route, "dispatching");

        let response = match route {
            Route::Shutdown => return Ok(Reply::Shutdown),
            Route::GamePage => self.game_page()?,
            Route::Scoreboard => HttpResponse::html(self.templates.render_scores(&self.scores)?),
            Route::StaticFile => self.static_file(path).await,
            Route::StartGame => self.start_game(request)?,
            Route::ToggleLight => self.toggle_light(request)?,
            Route::MethodNotAllowed => HttpResponse::method_not_allowed(),
        };
        Ok(Reply::Respond(response))
    }

    fn game_page(&self) -> Result<HttpResponse, HandlerFault> {
        match self.game.board() {
            Some(board) => Ok(HttpResponse::html(self.templates.render_board(board)?)),
            None => Ok(HttpResponse::forbidden_no_game()),
        }
    }

    fn start_game(&mut self, request: &HttpRequest) -> Result<HttpResponse, HandlerFault> {
        let fields = request.form_fields()?;
        let new_game = NewGame::from_form(&fields);
        info!(
            size = new_game.size,
            preset = new_game.preset,
            player = %new_game.player_name,
            "starting game"
        );
        self.game.start(new_game);
        self.game_page()
    }

    fn toggle_light(&mut self, request: &HttpRequest) -> Result<HttpResponse, HandlerFault> {
        let fields = request.form_fields()?;
        let button = button_from_form(&fields)?;
        debug!(button, "toggling light");

        match self.game.toggle(button)? {
            Toggled::InProgress => self.game_page(),
            Toggled::Won(completed) => {
                info!(
                    size = completed.size,
                    moves = completed.moves,
                    player = %completed.player_name,
                    "game won"
                );
                let today = self.clock.today();
                if self.scores.commit(
                    completed.size,
                    completed.moves,
                    &completed.player_name,
                    today,
                ) {
                    info!(size = completed.size, "new best score");
                }
                Ok(HttpResponse::redirect(SCORES_PATH))
            }
        }
    }

    async fn static_file(&self, path: &str) -> HttpResponse {
        let safe_path = match validate_request_path(path) {
            Ok(safe_path) => safe_path,
            Err(e) => {
                warn!("Path validation failed for '{}': {}", path, e);
                return HttpResponse::bad_request();
            }
        };

        let mut file_path = join_public_path(&self.public_dir, &safe_path);
        match tokio::fs::metadata(&file_path).await {
            Ok(metadata) if metadata.is_dir() => file_path.push(DIRECTORY_INDEX),
            Ok(_) => {}
            Err(e) if is_missing(&e) => {
                debug!("Route not found: {}", path);
                return HttpResponse::not_found();
            }
            Err(e) => {
                warn!("Failed to stat {:?}: {}", file_path, e);
                return HttpResponse::internal_error();
            }
        }

        let canonical = match validate_file_path(&file_path, &self.public_dir) {
            Ok(canonical) => canonical,
            Err(e) if file_path.exists() => {
                warn!("Refusing {:?}: {}", file_path, e);
                return HttpResponse::forbidden();
            }
            Err(_) => {
                debug!("Route not found: {}", path);
                return HttpResponse::not_found();
            }
        };

        match tokio::fs::read(&canonical).await {
            Ok(body) => {
                let file_name = file_path
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default();
                let content_type = get_content_type(&file_name);
                HttpResponse::new(200, content_type, body)
            }
            Err(e) if is_missing(&e) => HttpResponse::not_found(),
            Err(e) => {
                warn!("Failed to read {:?}: {}", canonical, e);
                HttpResponse::internal_error()
            }
        }
    }
}

/// A path that names nothing, including one that runs through a regular file.
fn is_missing(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}
