use clap::Parser;
use outlet_insights::args::{Args, Command};
use outlet_insights::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().insights_home().path();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.auth_code(), Some(init_args.bind()))
                .await?
                .print()
        }

        Command::Serve(serve_args) => {
            let config = Config::load(home)
                .await?
                .with_overrides(serve_args.bind(), serve_args.auth_code())?;
            commands::serve(config).await?.print()
        }

        Command::Summary(summary_args) => commands::summary(
            summary_args.file(),
            summary_args.analysis(),
            summary_args.outlet(),
        )
        .await?
        .print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate and its request logs.
            EnvFilter::new(format!(
                "outlet_insights={level},{}={level},tower_http={level}",
                env!("CARGO_BIN_NAME"),
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
