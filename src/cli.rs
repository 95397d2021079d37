use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ufdr-upload",
    version,
    about = "Multipart upload client for UFDR forensic report ingestion",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a UFDR report and wait for extraction to finish
    Upload {
        #[arg(help = "Path to the UFDR report file")]
        file: PathBuf,

        #[arg(long, help = "Number of concurrent part transfers")]
        concurrency: Option<usize>,

        #[arg(long, help = "Session identifier sent with the init request")]
        session_id: Option<String>,

        #[arg(long, help = "Override the API base URL")]
        api_url: Option<String>,

        #[arg(long, help = "Return once the upload is queued instead of waiting for extraction")]
        no_wait: bool,
    },

    /// Query the extraction status of an existing upload
    Status {
        #[arg(help = "Upload id returned by the init call")]
        upload_id: String,

        #[arg(long, help = "Keep polling until the job reaches a terminal state")]
        watch: bool,

        #[arg(long, help = "Query the deprecated ingest-progress endpoint instead")]
        legacy: bool,

        #[arg(long, help = "Override the API base URL")]
        api_url: Option<String>,
    },

    /// Inspect or change client configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print one config value
    Get { key: String },
    /// Set one config value
    Set { key: String, value: String },
    /// Print the whole config
    List,
}
