use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use ufdr_upload_cli::{
    cli::{Cli, Commands},
    commands, ui,
};

#[tokio::main]
async fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        ui::error(&format!("Fatal error: {panic_info}"));
        std::process::exit(1);
    }));

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Upload {
            file,
            concurrency,
            session_id,
            api_url,
            no_wait,
        } => {
            commands::upload::execute(commands::upload::UploadArgs {
                file,
                concurrency,
                session_id,
                api_url,
                no_wait,
            })
            .await
        }
        Commands::Status {
            upload_id,
            watch,
            legacy,
            api_url,
        } => {
            commands::status::execute(commands::status::StatusArgs {
                upload_id,
                watch,
                legacy,
                api_url,
            })
            .await
        }
        Commands::Config { action } => commands::config::execute(action).await,
    }
}
