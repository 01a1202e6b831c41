//! wsi-tiler - Extract standalone JPEG tiles from Whole Slide Images.
//!
//! Opens a slide from local disk or S3 and either prints its structure or
//! writes a single tile.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tiler::{
    config::{Cli, Command, SlideLocation},
    create_s3_client,
    io::{FileRangeReader, RangeReader, S3RangeReader},
    slide::{Branch, SlideSummary, Tiler},
    tile::WhiteFill,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.slide_location() {
        Ok(SlideLocation::Local(path)) => match FileRangeReader::open(&path).await {
            Ok(reader) => run(&cli, Arc::new(reader)).await,
            Err(e) => Err(format!("Failed to open {}: {}", path.display(), e)),
        },
        Ok(SlideLocation::S3 { bucket, key }) => {
            let client = create_s3_client(cli.s3_endpoint.as_deref(), &cli.s3_region).await;
            match S3RangeReader::new(client, bucket.clone(), key.clone()).await {
                Ok(reader) => run(&cli, Arc::new(reader)).await,
                Err(e) => Err(format!("Failed to open s3://{}/{}: {}", bucket, key, e)),
            }
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
///
/// Logs go to stderr so a tile written to stdout stays intact.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tiler=debug"
    } else {
        "wsi_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run<R: RangeReader + 'static>(cli: &Cli, reader: Arc<R>) -> Result<(), String> {
    let fill = Arc::new(WhiteFill::new(cli.fill_quality));
    let tiler = Tiler::with_capacity(reader, fill, cli.page_cache)
        .await
        .map_err(|e| format!("Failed to open slide: {}", e))?;

    match &cli.command {
        Command::Info { json, .. } => run_info(&tiler, *json),
        Command::Tile {
            branch,
            level,
            page,
            x,
            y,
            output,
            ..
        } => {
            let branch = Branch::from(*branch);
            let tiled = tiler
                .get_branch_page(branch, *level, *page)
                .await
                .map_err(|e| e.to_string())?;
            let tile = tiled.get_tile(*x, *y).await.map_err(|e| e.to_string())?;

            debug!(
                branch = branch.name(),
                level,
                page,
                "Tile ({}, {}): {} bytes",
                x,
                y,
                tile.len()
            );

            match output {
                Some(path) => {
                    tokio::fs::write(path, &tile)
                        .await
                        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
                    info!("Wrote {} bytes to {}", tile.len(), path.display());
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout
                        .write_all(&tile)
                        .await
                        .map_err(|e| format!("Failed to write tile: {}", e))?;
                    stdout
                        .flush()
                        .await
                        .map_err(|e| format!("Failed to write tile: {}", e))?;
                }
            }
            Ok(())
        }
    }
}

fn run_info<R: RangeReader>(tiler: &Tiler<R>, json: bool) -> Result<(), String> {
    let summary = SlideSummary::from_tiler(tiler);
    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| format!("Failed to serialize summary: {}", e))?;
        println!("{}", text);
    } else {
        print!("{}", summary);
    }
    Ok(())
}
