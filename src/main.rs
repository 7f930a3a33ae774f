//! Manifold - compose manifest normalization
//!
//! This is the main CLI entry point for Manifold.

use clap::{Args, Parser, Subcommand};
use manifold::compose::{ManifestCodec, ManifestNormalizer};
use manifold::deploy::pipeline::{DryRunDriver, TracingLogSink};
use manifold::deploy::{ComposePipeline, DeploymentContext, PipelineRequest};
use manifold::error::{ManifoldError, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Manifold - compose manifest normalization
#[derive(Parser)]
#[command(name = "manifold")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Rewrites compose manifests for deployment on a shared platform", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Deployment context options shared by every command
#[derive(Args)]
struct ContextArgs {
    /// Deployment context file (YAML or JSON)
    #[arg(short, long)]
    context: PathBuf,
    /// Override the application id
    #[arg(long)]
    application_id: Option<String>,
    /// Override the shared network
    #[arg(long)]
    network: Option<String>,
}

impl ContextArgs {
    fn load(&self) -> Result<DeploymentContext> {
        let mut context = DeploymentContext::load(&self.context)?;
        if let Some(id) = &self.application_id {
            context.application_id = id.clone();
        }
        if let Some(network) = &self.network {
            context.network = network.clone();
        }
        context.validate()?;
        Ok(context)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a compose file
    Normalize {
        /// Compose file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Write here instead of replacing the compose file
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Print the normalized compose file
    Config {
        /// Compose file
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Normalize in place and show the build commands that would run
    Plan {
        /// Checkout directory
        #[arg(short, long)]
        workdir: PathBuf,
        /// Application base directory inside the checkout
        #[arg(long, default_value = "/")]
        base_dir: String,
        /// Compose file location inside the base directory
        #[arg(short, long, default_value = "docker-compose.yml")]
        file: String,
        /// Build identifier
        #[arg(long, default_value = "local")]
        build_id: String,
        #[command(flatten)]
        context: ContextArgs,
    },
}

fn compose_file(file: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file);
    }
    let working_dir = std::env::current_dir()?;
    ManifestCodec::find_compose_file(&working_dir).ok_or_else(|| {
        ManifoldError::InvalidConfig(format!(
            "no compose file found in {}",
            working_dir.display()
        ))
    })
}

async fn normalize_file(path: &Path, context: &DeploymentContext) -> Result<String> {
    let manifest = ManifestCodec::read_file(path).await?;
    let normalized = ManifestNormalizer::new().normalize(&manifest, context)?;
    ManifestCodec::to_string(&normalized.manifest)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Normalize {
            file,
            output,
            context,
        } => {
            let context = context.load()?;
            let path = compose_file(file)?;
            let rendered = normalize_file(&path, &context).await?;

            let target = output.unwrap_or(path);
            tokio::fs::write(&target, rendered).await?;
            println!("Wrote {}", target.display());
        }

        Commands::Config { file, context } => {
            let context = context.load()?;
            let path = compose_file(file)?;
            print!("{}", normalize_file(&path, &context).await?);
        }

        Commands::Plan {
            workdir,
            base_dir,
            file,
            build_id,
            context,
        } => {
            let context = context.load()?;
            let request = PipelineRequest {
                workdir,
                base_directory: base_dir,
                compose_file: file,
                build_id,
                debug: cli.debug,
            };

            let pipeline =
                ComposePipeline::new(ManifestNormalizer::new(), DryRunDriver::new(), TracingLogSink);
            pipeline.run(&request, &context).await?;

            for command in pipeline.driver().commands() {
                println!("{}", command.join(" "));
            }
        }
    }

    Ok(())
}
