use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;

use meshbot::bot::Bot;
use meshbot::config::BotConfig;
use meshbot::console::{run_console, ConsoleInteraction};
use meshbot::liveness;

/// Upload a mesh, then crinkle, dot or poly it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User id attached to uploads.
    #[arg(short, long, default_value = "console")]
    user: String,

    /// Directory generated images, videos and files are copied into.
    #[arg(short, long)]
    outbox: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    dump_config: bool,

    /// Do not start the HTTP liveness endpoint.
    #[arg(long)]
    no_liveness: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BotConfig::load(path)?,
        None => BotConfig::default(),
    };
    if cli.dump_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    if config.liveness.enabled && !cli.no_liveness {
        let listener = liveness::bind(&config.liveness).await?;
        tokio::spawn(async move {
            if let Err(e) = liveness::serve(listener).await {
                log::error!("Liveness endpoint stopped: {:#}", e);
            }
        });
    }

    log::info!("Work directory: {}", config.work_dir().display());
    let bot = Bot::new(config);
    let mut interaction = ConsoleInteraction::new(cli.user, cli.outbox, tokio::io::stdout());
    run_console(&bot, BufReader::new(tokio::io::stdin()), &mut interaction).await
}
