use clap::Parser;
use expense_ninja::args::{Args, Command};
use expense_ninja::{commands, Config, Mode, Result};
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
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().ninja_home().path();

    // When EXPENSE_NINJA_IN_TEST_MODE is set and non-empty the backend is simulated and stored in
    // the ninja home directory, otherwise requests go to the configured URL.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_url()).await?.print(),

        Command::Wizard(wizard_args) => {
            let config = Config::load(home).await?;
            commands::wizard(&config, mode, wizard_args).await?.print()
        }

        Command::Transactions(list_args) => {
            let config = Config::load(home).await?;
            commands::transactions(&config, mode, list_args)
                .await?
                .print()
        }

        Command::UpdateTag(tag_args) => {
            let config = Config::load(home).await?;
            commands::update_tag(&config, mode, tag_args).await?.print()
        }

        Command::UpdateProduct(product_args) => {
            let config = Config::load(home).await?;
            commands::update_product(&config, mode, product_args)
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => {
            // Only this crate logs at the requested level.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                "expense_ninja",
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
