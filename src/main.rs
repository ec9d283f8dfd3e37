use anyhow::Context;
use clap::Parser;
use pagewatch::cli::{Cli, CliCommand};
use pagewatch::commands;
use pagewatch_core::config::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("could not load config {}", path.display()))?,
        None => Config::load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not load config file, using defaults");
            Config::defaults()
        }),
    };
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.storage.database_path());
    let store = commands::open_store(&db_path)?;
    tracing::debug!(db = %db_path.display(), "message store open");

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        CliCommand::Listen(args) => {
            let settings = args.settings(&config);
            let spawner = args.spawner(&config);

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, stopping listener");
                    on_signal.cancel();
                }
            });

            commands::listen(store, settings, &spawner, cancel, &mut stdout).await?;
        }
        CliCommand::Messages(args) => {
            commands::messages(&store, &args, &mut stdout)?;
        }
        CliCommand::Status(args) => {
            commands::status(store, &args, &mut stdout)?;
        }
        CliCommand::Clear(args) => {
            let mut stdin = std::io::stdin().lock();
            commands::clear(&store, &args, &mut stdin, &mut stdout)?;
        }
    }
    Ok(())
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/pagewatch-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("pagewatch debug log started, tail -f /tmp/pagewatch-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
    Ok(())
}
