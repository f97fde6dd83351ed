//! WSI Tiler - Cut Whole Slide Images into PNG tiles.
//!
//! This binary is a thin caller around the tiling engine: it parses the
//! command line, wires Ctrl-C to the cancellation flag and reports progress.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tiler::{
    config::{Cli, Command, InfoConfig, TileConfig},
    slide::open_slide,
    tile::{spawn_tiling, ProgressEvent},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Tile(config) => run_tile(config).await,
        Command::Info(config) => run_info(config).await,
    }
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(config: TileConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Input: {}", config.input.display());
    info!("Output: {}", config.output.display());
    info!(
        "Tile size: {}px, cache: {} decoded tiles",
        config.tile_size, config.cache_tiles
    );

    let mut task = spawn_tiling(
        config.input.clone(),
        config.output.clone(),
        config.options(),
        config.cache_tiles,
    );

    let cancel = task.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current tile");
            cancel.cancel();
        }
    });

    while let Some(event) = task.events.recv().await {
        if let ProgressEvent::Tile {
            completed, total, ..
        } = event
        {
            if completed == total || completed % 100 == 0 {
                info!("Progress: {}/{} tiles", completed, total);
            }
        }
    }

    match task.join().await {
        Ok(summary) => {
            if config.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize summary: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!(
                    "Wrote {} tiles ({}x{} grid) to {} in {:.1}s",
                    summary.tiles_written,
                    summary.columns,
                    summary.rows,
                    summary.output_dir.display(),
                    summary.elapsed_ms as f64 / 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!("Tiling failed: {}", failure);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let slide = match open_slide(&config.input).await {
        Ok(slide) => slide,
        Err(e) => {
            eprintln!("Error: failed to open {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let (width, height) = slide.dimensions();
    let levels = slide.levels();
    let properties = slide.properties();
    let format = slide.format_name();
    slide.close().await;

    if config.json {
        let json = serde_json::json!({
            "path": config.input,
            "format": format,
            "width": width,
            "height": height,
            "levels": levels,
            "properties": properties,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("Slide: {}", config.input.display());
    println!("═════════════════════════════════");
    println!("Format:     {}", format);
    println!("Dimensions: {} x {}", width, height);
    println!();
    println!("Levels:");
    for (index, level) in levels.iter().enumerate() {
        println!(
            "  {:>2}: {:>6} x {:<6} downsample {:.2}",
            index, level.width, level.height, level.downsample
        );
    }
    if !properties.is_empty() {
        println!();
        println!("Properties:");
        for (key, value) in &properties {
            println!("  {} = {}", key, value);
        }
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
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
        .with(tracing_subscriber::fmt::layer())
        .init();
}
