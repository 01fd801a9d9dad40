mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "oogst",
    version,
    about = "Extract structured product data from supplier PDF catalogs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze PDF catalogs into flat product JSON (plus product images)
    Analyze {
        /// Directory holding the PDF catalogs and their layout dumps
        #[arg(long, default_value = "catalogs")]
        pdf_dir: PathBuf,

        /// Only process files whose name contains this substring
        #[arg(long)]
        only: Option<String>,

        /// Directory for JSON output and extracted images
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,

        /// Remove previously extracted images for each document first
        #[arg(long)]
        clean_images: bool,
    },
    /// Maintain extracted product images
    Images {
        #[command(subcommand)]
        action: ImagesAction,
    },
}

#[derive(Subcommand)]
enum ImagesAction {
    /// Remove perceptual duplicates and rewrite JSON references to them
    Dedupe {
        /// Output directory holding images/ and the JSON payloads
        dir: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            pdf_dir,
            only,
            output_dir,
            clean_images,
        } => commands::analyze::run(&pdf_dir, only.as_deref(), &output_dir, clean_images),
        Commands::Images { action } => match action {
            ImagesAction::Dedupe { dir } => commands::images::dedupe(&dir),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
