//! Regenerates the Docsify `_sidebar.md` for a documentation directory.

use clap::Parser;
use docs_webhook::config::load_sidebar_options;
use docs_webhook::error::HookError;
use docs_webhook::sidebar::{SidebarGenerator, SidebarOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "generate-sidebar", version, about)]
struct Args {
    /// Documentation root to walk
    #[arg(default_value = "./docs")]
    root: PathBuf,

    /// TOML file with sidebar options
    #[arg(short, long, env = "SIDEBAR_CONFIG")]
    config: Option<PathBuf>,

    /// Output file name inside the root (overrides the config file)
    #[arg(short, long)]
    output: Option<String>,

    /// Print the sidebar instead of writing it
    #[arg(long)]
    stdout: bool,
}

fn run(args: Args) -> Result<(), HookError> {
    let mut options = match &args.config {
        Some(path) => load_sidebar_options(path)?,
        None => SidebarOptions::default(),
    };
    if let Some(output) = args.output {
        options.output_file = output;
    }

    let generator = SidebarGenerator::new(&args.root, &options);
    if args.stdout {
        print!("{}", generator.render()?);
    } else {
        generator.write()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
