use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use reelforge::feed::{self, LocalDirStore};
use reelforge::utils::logger;
use reelforge::{NarrationSource, ReelPipeline};

#[derive(Parser, Debug)]
#[command(name = "reelforge", version, about = "Short vertical video generator and feed service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one video from the inputs directory
    Generate {
        /// Directory containing inputs/, outputs/ and config.json
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,

        /// Use inputs/dialogue.json (two-speaker mode) instead of inputs/script.txt
        #[arg(long)]
        dialogue: bool,

        /// Process every dialogue file under inputs/dialogues/, cycling
        /// through the background clips
        #[arg(long, conflicts_with = "dialogue")]
        all: bool,
    },
    /// Serve the video feed listing endpoint
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        /// Directory whose files stand in for object-store keys
        #[arg(long)]
        store_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            base_dir,
            dialogue,
            all,
        } => {
            if all {
                match generate_all(&base_dir).await {
                    Ok(outputs) => {
                        log::info!("SUCCESS: {} videos created", outputs.len());
                        for output in outputs {
                            println!("{}", output.display());
                        }
                    }
                    Err(e) => {
                        log::error!("batch generation failed: {}", e);
                        logger::append_error_log(&base_dir, &e.to_string());
                        std::process::exit(1);
                    }
                }
            } else {
                let source = if dialogue {
                    NarrationSource::Dialogue
                } else {
                    NarrationSource::Script
                };

                match generate(&base_dir, source).await {
                    Ok(output) => {
                        log::info!("SUCCESS: video created: {}", output.display());
                        println!("{}", output.display());
                    }
                    Err(e) => {
                        log::error!("pipeline failed: {}", e);
                        logger::append_error_log(&base_dir, &e.to_string());
                        std::process::exit(1);
                    }
                }
            }
        }
        Command::Serve { addr, store_dir } => {
            let store = Arc::new(LocalDirStore::new(store_dir));
            feed::serve(addr, store).await?;
        }
    }

    Ok(())
}

async fn generate(
    base_dir: &Path,
    source: NarrationSource,
) -> Result<PathBuf, reelforge::error::ReelError> {
    let pipeline = ReelPipeline::from_env(base_dir)?;
    pipeline.run(source).await
}

async fn generate_all(base_dir: &Path) -> Result<Vec<PathBuf>, reelforge::error::ReelError> {
    let pipeline = ReelPipeline::from_env(base_dir)?;
    pipeline.run_batch().await
}
