//! capture-proxy
//!
//! ```text
//!     Client ──▶ localhost:<port> ──▶ exchange ──▶ target (http / https)
//!                                        │
//!                                        ├──▶ <path>-<millis>.req
//!                                        └──▶ <path>-<millis>.res
//! ```
//!
//! `listen` runs the proxy, `replay` re-issues a saved request transcript and
//! `save` files a transcript under a name for later replay.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use capture_proxy::config::load_config;
use capture_proxy::observability::init_logging;
use capture_proxy::{replay, CaptureServer, ProxyConfig, ReplayOptions, Shutdown, TranscriptStore};

const DEFAULT_OUTPUT: &str = "./output";

#[derive(Parser)]
#[command(name = "capture-proxy", version)]
#[command(about = "Recording HTTP/HTTPS forwarding proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward localhost traffic to a target, optionally capturing it
    Listen(ListenArgs),
    /// Re-issue a captured request
    Replay(ReplayArgs),
    /// Save a transcript under a name
    Save {
        /// Transcript file to save
        file: PathBuf,
        /// Name to save it under
        name: String,
    },
}

#[derive(Args)]
struct ListenArgs {
    /// Base URI to forward to, e.g. https://my.host.com/root
    target: Option<String>,

    /// Local port
    #[arg(short, long)]
    port: Option<u16>,

    /// Save responses
    #[arg(short = 'r', long)]
    response: bool,

    /// Save requests and responses
    #[arg(short = 'R', long)]
    request: bool,

    /// Transcript directory [default: ./output]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip upstream certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Forward accept-encoding instead of stripping it
    #[arg(long)]
    compressed: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose")]
    silent: bool,

    /// TOML file supplying any of the above
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ReplayArgs {
    /// Transcript file path or saved name
    name_or_path: String,

    /// Skip upstream certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Print the response status line and headers
    #[arg(short, long)]
    include: bool,

    /// Print the request before sending it
    #[arg(short, long)]
    verbose: bool,
}

impl ListenArgs {
    fn into_config(self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(target) = self.target {
            config.target = target;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(output) = self.output {
            config.output_directory = Some(output);
        }
        config.capture_requests |= self.request;
        config.capture_responses |= self.request || self.response;
        config.allow_insecure_tls |= self.insecure;
        config.pass_through_compression |= self.compressed;
        config.verbose |= self.verbose;
        config.silent |= self.silent;

        if config.output_directory.is_none() {
            config.output_directory = Some(PathBuf::from(DEFAULT_OUTPUT));
        }
        Ok(config)
    }
}

fn store() -> Result<TranscriptStore, Box<dyn std::error::Error>> {
    let dir = TranscriptStore::default_location()
        .ok_or("cannot locate a home directory for saved transcripts")?;
    Ok(TranscriptStore::new(dir))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Listen(args) => {
            let config = args.into_config()?;
            init_logging(config.verbose, config.silent);

            let server = CaptureServer::new(config).await?;
            let listener = server.bind().await?;

            let shutdown = Shutdown::new();
            let rx = shutdown.subscribe();
            tokio::spawn(async move { shutdown.trigger_on_ctrl_c().await });

            server.run(listener, rx).await?;
            tracing::info!("Shutdown complete");
        }
        Commands::Replay(args) => {
            init_logging(args.verbose, false);

            let payload = store()?.load(&args.name_or_path).await?;
            let options = ReplayOptions {
                insecure: args.insecure,
                verbose: args.verbose,
                include_headers: args.include,
            };
            let mut stdout = tokio::io::stdout();
            let status = replay(&payload, &options, &mut stdout).await?;
            tracing::debug!(status = status.as_u16(), "Replay finished");
        }
        Commands::Save { file, name } => {
            init_logging(false, false);

            let dest = store()?.save(&file, &name).await?;
            tracing::info!(path = %dest.display(), "Saved {}", name);
        }
    }

    Ok(())
}
