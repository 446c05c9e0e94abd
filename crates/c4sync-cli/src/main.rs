use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use c4sync_core::interchange::OBJECTS_FILE;
use c4sync_core::settings::{read_settings, Settings};

mod commands;

#[derive(Parser)]
#[command(name = "c4sync", version, about = "Synchronize C4 diagrams and service descriptors with IcePanel")]
struct Cli {
    /// More output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, global = true)]
    token: Option<String>,

    /// Overall timeout in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Push a C4 diagram: objects, connections and a diagram embedding them
    Diagram {
        /// Diagram file (.mmd)
        file: PathBuf,
        #[command(flatten)]
        target: Target,
        /// Diagram name
        #[arg(long)]
        name: Option<String>,
        /// Delete everything in the version first
        #[arg(long)]
        wipe: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create only the connections of a C4 diagram between existing objects
    Connect {
        /// Diagram file (.mmd)
        file: PathBuf,
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract services from a descriptor set into an objects document
    Extract {
        /// FileDescriptorSet in protobuf JSON form
        descriptors: PathBuf,
        /// Output file
        #[arg(short, long, default_value = OBJECTS_FILE)]
        output: PathBuf,
        #[command(flatten)]
        target: Target,
        /// Ask `upload` to wipe the version first
        #[arg(long)]
        wipe: bool,
        /// Descriptor files under this path are marked speculative
        #[arg(long)]
        speculative_prefix: Option<String>,
        /// Skip descriptor files under this path (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        /// Classifier rules (JSON)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Push an objects document written by `extract`
    Upload {
        #[arg(default_value = OBJECTS_FILE)]
        file: PathBuf,
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the JSON Schema of the objects document
    Schema,
}

#[derive(Args, Debug, Clone, Default)]
struct Target {
    /// Landscape id
    #[arg(short, long)]
    landscape: Option<String>,
    /// Version id
    #[arg(long = "version-id", alias = "landscape-version")]
    version: Option<String>,
}

impl Cli {
    fn settings(&self, mut settings: Settings) -> Settings {
        if let Some(url) = &self.api_url {
            settings.api_base_url = url.clone();
        }
        if let Some(token) = &self.token {
            settings.token = token.clone();
        }
        if let Some(secs) = self.timeout {
            settings.timeout_secs = secs;
        }
        settings
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = cli.settings(read_settings());
    let limit = settings.timeout();
    match tokio::time::timeout(limit, commands::run(cli.command, &settings)).await {
        Ok(result) => result,
        Err(_) => bail!("timed out after {}s", settings.timeout_secs),
    }
}
