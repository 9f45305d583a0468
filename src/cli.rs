use crate::server::{ServeConfig, DEFAULT_PORT};
use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const VERSION: &str = include_str!("../VERSION");

#[derive(Parser)]
#[command(name = "lights-out")]
#[command(about = "Static file server hosting a game of Linear Lights Out")]
#[command(version = VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long = "dir", default_value = "public")]
    #[arg(help = "Directory to serve")]
    pub dir: PathBuf,

    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    #[arg(help = "Port to listen on")]
    pub port: u16,

    #[arg(long = "timeout-ms", default_value_t = 2000)]
    #[arg(help = "Accept tick and request read timeout in milliseconds")]
    pub timeout_ms: u64,

    #[arg(long = "log-level", default_value = "info")]
    #[arg(help = "Log level (debug, info, warn, error)")]
    pub log_level: String,

    #[arg(long = "log-format", default_value = "console")]
    #[arg(help = "Log format (json, console)")]
    pub log_format: String,

    #[arg(long = "log-requests", default_value_t = true, action = ArgAction::Set)]
    #[arg(help = "Log HTTP requests")]
    pub log_requests: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the web server")]
    Serve {
        #[arg(help = "Directory to serve")]
        directory: Option<PathBuf>,

        #[arg(short = 'p', long = "port")]
        #[arg(help = "Port to listen on")]
        port: Option<u16>,

        #[arg(long = "seed")]
        #[arg(help = "Seed for board scrambles (random when omitted)")]
        seed: Option<u64>,

        #[arg(long = "log-level")]
        #[arg(help = "Log level (debug, info, warn, error)")]
        log_level: Option<String>,

        #[arg(long = "log-format")]
        #[arg(help = "Log format (json, console)")]
        log_format: Option<String>,
    },
    #[command(about = "Show version information")]
    Version,
    #[command(about = "Generate completion script")]
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Some(Commands::Serve {
                ref directory,
                port,
                seed,
                ref log_level,
                ref log_format,
            }) => {
                init_tracing(
                    log_level.as_deref().unwrap_or(&self.log_level),
                    log_format.as_deref().unwrap_or(&self.log_format),
                );

                let config = ServeConfig {
                    public_dir: directory.clone().unwrap_or_else(|| self.dir.clone()),
                    port: port.unwrap_or(self.port),
                    timeout: Duration::from_millis(self.timeout_ms),
                    seed,
                    log_requests: self.log_requests,
                };
                crate::server::start_server(config).await
            }
            Some(Commands::Version) => {
                println!("{}", full_version());
                println!("Static file server hosting a game of Linear Lights Out");
                Ok(())
            }
            Some(Commands::Completion { shell }) => {
                generate_completion(shell);
                Ok(())
            }
            None => {
                // Show help when no subcommand is provided
                let mut cmd = Self::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_tracing(log_level: &str, log_format: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn full_version() -> String {
    format!("lights-out v{}", VERSION.trim())
}

fn generate_completion(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "lights-out", &mut io::stdout());
}
