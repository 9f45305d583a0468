pub mod cli;
pub mod clock;
pub mod error;
pub mod game;
pub mod http;
pub mod mime_types;
pub mod routes;
pub mod scores;
pub mod security;
pub mod server;
pub mod template;
