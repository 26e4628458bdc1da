mod cmd;

use clap::{Parser, Subcommand};
use llmodel::envconfig::BUILD_VARIANT_ENV;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "llmodel")]
#[command(version)]
#[command(about = "Discover and dispatch dynamically loaded model backends", long_about = None)]
#[command(
    after_help = "Backend modules are searched in $LLMODEL_IMPLEMENTATIONS_PATH and the working directory."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered backend implementations
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show which implementation would load a model file
    Probe {
        model: PathBuf,
        #[arg(short, long, env = BUILD_VARIANT_ENV, default_value = "auto")]
        variant: String,
    },
    /// Construct an engine and load a model file into it
    Load {
        model: PathBuf,
        #[arg(short, long, env = BUILD_VARIANT_ENV, default_value = "auto")]
        variant: String,
    },
    /// Load a model and replay a token history through it
    Replay {
        model: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        tokens: Vec<i32>,
        #[arg(long, default_value = "9")]
        batch: usize,
        #[arg(long, default_value = "2048")]
        ctx: usize,
        /// Fraction of the window dropped when the history does not fit
        #[arg(long, default_value = "0.75")]
        erase: f32,
        #[arg(short, long, env = BUILD_VARIANT_ENV, default_value = "auto")]
        variant: String,
    },
    /// Show the host capabilities that drive `auto` variant selection
    Cpu,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llmodel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List { json } => cmd::list(json),
        Commands::Probe { model, variant } => cmd::probe(&model, &variant),
        Commands::Load { model, variant } => cmd::load(&model, &variant),
        Commands::Replay {
            model,
            tokens,
            batch,
            ctx,
            erase,
            variant,
        } => cmd::replay(&model, &variant, tokens, batch, ctx, erase),
        Commands::Cpu => cmd::cpu(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
