//! geofabric CLI - watershed delineation and hydrofabric subsetting

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geofabric_algorithms::merge::{merge_small_polygons, BatchSize, MergeParams, MergeReport};
use geofabric_algorithms::polygonize::{polygonize, PolygonizeParams};
use geofabric_core::io::{read_geotiff, read_layer, write_layer};
use geofabric_pipeline::{GeofabricConfig, GeofabricDelineator, GeofabricSubsetter, LumpedDelineator};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geofabric")]
#[command(author, version, about = "Watershed delineation and hydrofabric subsetting", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delineate a distributed geofabric from the domain DEM
    Delineate {
        /// YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Extract the basins upstream of the pour point from an existing hydrofabric
    Subset {
        /// YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Delineate a single lumped watershed above the pour point
    Lumped {
        /// YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Merge basins smaller than a threshold into their neighbours
    Merge {
        /// Input basin layer (GeoJSON)
        input: PathBuf,
        /// Output basin layer (GeoJSON)
        output: PathBuf,
        /// Minimum basin area in km²
        #[arg(short, long, default_value = "5.0")]
        min_area: f64,
        /// Polygons merged between spatial index rebuilds (0 = all at once)
        #[arg(short, long, default_value = "100")]
        batch: usize,
        /// Simplification tolerance in metres
        #[arg(short, long, default_value = "1.0")]
        tolerance: f64,
    },
    /// Convert a watershed label grid into polygons
    Polygonize {
        /// Input label raster (GeoTIFF)
        input: PathBuf,
        /// Output layer (GeoJSON)
        output: PathBuf,
        /// Attribute receiving the label
        #[arg(short, long, default_value = "DN")]
        field: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn load_config(path: &Path) -> Result<GeofabricConfig> {
    GeofabricConfig::from_file(path).with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Batch size 0 means every small basin in one batch.
fn merge_params(min_area: f64, batch: usize, tolerance: f64) -> MergeParams {
    MergeParams {
        min_area_km2: min_area,
        batch_size: if batch == 0 { BatchSize::Unbounded } else { BatchSize::Bounded(batch) },
        simplify_tolerance: tolerance,
    }
}

fn run_merge(input: &Path, output: &Path, params: &MergeParams) -> Result<MergeReport> {
    let layer = read_layer(input).context("Failed to read basin layer")?;
    info!("Read {} basins from {}", layer.len(), input.display());
    let result = merge_small_polygons(&layer, params).context("Failed to merge basins")?;
    write_layer(&result.layer, output).context("Failed to write basin layer")?;
    Ok(result.report)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Delineate { config } => {
            let config = load_config(&config)?;
            let start = Instant::now();
            let outputs = GeofabricDelineator::new(&config)
                .delineate()
                .context("Geofabric delineation failed")?;
            if let Some(report) = &outputs.merge {
                println!("Merge: {}", report);
            }
            println!("{} basins, {} river segments", outputs.basin_count, outputs.river_count);
            println!("Rivers saved to: {}", outputs.rivers_path.display());
            done("Basins", &outputs.basins_path, start.elapsed());
        }

        Commands::Subset { config } => {
            let config = load_config(&config)?;
            let start = Instant::now();
            let outputs = GeofabricSubsetter::new(&config)
                .subset()
                .context("Geofabric subsetting failed")?;
            println!("{} basins, {} river segments", outputs.basin_count, outputs.river_count);
            println!("Rivers saved to: {}", outputs.rivers_path.display());
            done("Basins", &outputs.basins_path, start.elapsed());
        }

        Commands::Lumped { config } => {
            let config = load_config(&config)?;
            let start = Instant::now();
            let path = LumpedDelineator::new(&config)
                .delineate()
                .context("Lumped delineation failed")?;
            done("Lumped watershed", &path, start.elapsed());
        }

        Commands::Merge {
            input,
            output,
            min_area,
            batch,
            tolerance,
        } => {
            let params = merge_params(min_area, batch, tolerance);
            let pb = spinner("Merging small basins...")?;
            let start = Instant::now();
            let report = run_merge(&input, &output, &params)?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            println!("{}", report);
            done("Merged basins", &output, elapsed);
        }

        Commands::Polygonize { input, output, field } => {
            let pb = spinner("Reading raster...")?;
            let raster = read_geotiff::<f64, _>(&input).context("Failed to read raster")?;
            pb.set_message("Polygonizing...");
            let start = Instant::now();
            let layer = polygonize(&raster, &PolygonizeParams { field }).context("Failed to polygonize")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            write_layer(&layer, &output).context("Failed to write layer")?;
            println!("{} polygons", layer.len());
            done("Polygons", &output, elapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;
    use geofabric_core::{Feature, FeatureCollection, CRS};

    #[test]
    fn merge_command_reads_merges_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("basins.geojson");
        let output = dir.path().join("merged.geojson");
        let layer = FeatureCollection::with_crs(
            vec![
                Feature::new(polygon![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 1000.0, y: 1000.0), (x: 0.0, y: 1000.0)].into()),
                Feature::new(polygon![(x: 1000.0, y: 0.0), (x: 6000.0, y: 0.0), (x: 6000.0, y: 5000.0), (x: 1000.0, y: 5000.0)].into()),
            ],
            Some(CRS::from_epsg(32633)),
        );
        write_layer(&layer, &input).unwrap();

        let cli = Cli::try_parse_from([
            "geofabric",
            "merge",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--batch",
            "0",
        ])
        .unwrap();
        let Commands::Merge { input, output, min_area, batch, tolerance } = cli.command else {
            panic!("expected the merge command");
        };
        let params = merge_params(min_area, batch, tolerance);
        assert_eq!(params.batch_size, BatchSize::Unbounded);

        let report = run_merge(&input, &output, &params).unwrap();
        assert_eq!(report.merged_count, 1);
        assert_eq!(read_layer(&output).unwrap().len(), 1);
    }

    #[test]
    fn nonzero_batch_is_bounded() {
        assert_eq!(merge_params(5.0, 25, 1.0).batch_size, BatchSize::Bounded(25));
    }
}
