use clap::{Args, Subcommand};
use scanreturn_core::{RemoteEndpoint, ResolvedEndpoint, ScanReturnContext};
use serde_json::{Value, json};

use crate::render::print_value;

#[derive(Args)]
pub struct EndpointArgs {
    #[command(subcommand)]
    pub command: EndpointCommand,
    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum EndpointCommand {
    /// Print the endpoint in effect and where it came from
    Show,
    /// Store a new endpoint; an empty value selects offline mode
    Set { url: String },
    /// Forget the stored endpoint and fall back to the built-in default
    Reset,
}

pub fn run(context: &ScanReturnContext, args: EndpointArgs) -> anyhow::Result<()> {
    let settings = context.endpoint_settings();
    match args.command {
        EndpointCommand::Show => {}
        EndpointCommand::Set { url } => {
            if !url.trim().is_empty() && RemoteEndpoint::parse(&url).is_none() {
                anyhow::bail!("endpoint must be an http(s) URL or empty for offline mode");
            }
            settings.store(&url)?;
        }
        EndpointCommand::Reset => settings.reset()?,
    }

    let resolved = context.endpoint();
    if resolved.locked_by_env() {
        tracing::warn!("SCANRETURN_ENDPOINT is set and overrides the stored endpoint");
    }
    print_value(&endpoint_json(&resolved), args.json)
}

fn endpoint_json(resolved: &ResolvedEndpoint) -> Value {
    json!({
        "endpoint": resolved.raw,
        "source": resolved.source.as_str(),
        "mode": if resolved.remote().is_some() { "remote" } else { "offline" },
        "locked_by_env": resolved.locked_by_env(),
    })
}
