mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sgai",
    about = "Watch, publish and serve sgai workspace events",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .sgai/ or .git/)
    #[arg(long, global = true, env = "SGAI_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Event hub base URL (overrides client.base_url)
    #[arg(long, global = true, env = "SGAI_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream events from the hub until Ctrl-C
    Watch {
        /// Only events for this workspace
        #[arg(long, short = 'w')]
        workspace: Option<String>,

        /// Event names to watch (repeatable; default: the standard set)
        #[arg(long = "event", short = 'e', value_name = "NAME")]
        events: Vec<String>,
    },

    /// Publish one event to the hub
    Emit {
        /// Event name, e.g. changes:update
        name: String,

        #[arg(long, short = 'w')]
        workspace: Option<String>,

        /// JSON payload merged into the event envelope
        #[arg(long)]
        payload: Option<String>,
    },

    /// Run the reference event hub
    Serve {
        /// Port to listen on (default: server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect and validate .sgai/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let url = cli.url.as_deref();

    let result = match cli.command {
        Commands::Watch { workspace, events } => {
            cmd::watch::run(&root, url, workspace.as_deref(), &events, cli.json)
        }
        Commands::Emit {
            name,
            workspace,
            payload,
        } => cmd::emit::run(
            &root,
            url,
            &name,
            workspace.as_deref(),
            payload.as_deref(),
            cli.json,
        ),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Config { subcommand } => cmd::config::run(&root, url, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
