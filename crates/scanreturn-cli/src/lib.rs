use clap::Parser;
use scanreturn_core::{ScanReturnConfig, ScanReturnContext};

mod endpoint_cli;
mod render;
mod tags_cli;

#[derive(Parser)]
#[command(name = "scanreturn")]
#[command(about = "Resolve and activate ScanToReturn tags")]
pub struct ScanReturnCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the scan flow for a scanned link or tag id
    Scan(tags_cli::ScanArgs),
    /// Resolve one tag without the scan flow
    Resolve(tags_cli::ResolveArgs),
    /// Bind an item and owner contact to a tag
    Activate(tags_cli::ActivateArgs),
    /// List cached tags with dashboard counts
    List(tags_cli::ListArgs),
    /// Print scan links for a batch of tags
    Links(tags_cli::LinksArgs),
    /// Show or change the remote record endpoint
    Endpoint(endpoint_cli::EndpointArgs),
}

pub async fn run() -> anyhow::Result<()> {
    let cli = ScanReturnCli::parse();
    match cli.command {
        Commands::Scan(args) => tags_cli::run_scan(&load_context()?, args).await,
        Commands::Resolve(args) => tags_cli::run_resolve(&load_context()?, &args).await,
        Commands::Activate(args) => tags_cli::run_activate(&load_context()?, &args).await,
        Commands::List(args) => tags_cli::run_list(&load_context()?, &args),
        Commands::Links(args) => tags_cli::run_links(&args),
        Commands::Endpoint(args) => endpoint_cli::run(&load_context()?, args),
    }
}

fn load_context() -> anyhow::Result<ScanReturnContext> {
    let config = ScanReturnConfig::from_env()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "Loaded configuration");
    Ok(ScanReturnContext::from_config(config)?)
}
