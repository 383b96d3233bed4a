//! Command-line front end for `waypath`

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use nav_engine::binary_format::save_tile_to_binary;
use nav_engine::test_mesh_helpers::{create_single_quad_tile, create_wall_tile, grid_params};
use nav_engine::{MeshTile, NavMesh, NavMeshParams};
use waypath::{NavConfig, NavContext, NavError, PathRequest, TileSetHeader};

/// Inspect tile-set containers and run world-space path queries
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON file with query and loader settings
    #[clap(long, value_parser, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity at debug level
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the header of a tile-set container and load it
    Info {
        /// Tile-set container
        #[clap(value_parser)]
        mesh: PathBuf,
    },

    /// Pack single tile files into a tile-set container
    Pack {
        /// Output container
        #[clap(long, value_parser)]
        output: PathBuf,

        /// Grid origin in mesh space (x,y,z)
        #[clap(long, value_parser = parse_vector, default_value = "0,0,0")]
        origin: Vec3,

        /// Tile width in mesh units
        #[clap(long)]
        tile_width: f32,

        /// Tile height in mesh units
        #[clap(long)]
        tile_height: f32,

        /// Maximum number of tiles; defaults to the number of inputs
        #[clap(long)]
        max_tiles: Option<i32>,

        /// Maximum number of polygons per tile
        #[clap(long, default_value = "4096")]
        max_polys: i32,

        /// Tile files to add
        #[clap(value_parser, required = true)]
        tiles: Vec<PathBuf>,
    },

    /// Find a path between two world-space points
    FindPath {
        /// Tile-set container
        #[clap(long, value_parser)]
        mesh: PathBuf,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector)]
        end: Vec3,

        /// Maximum number of waypoints
        #[clap(long, default_value = "256")]
        capacity: usize,

        /// Output path file
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },

    /// Write small demo tile sets and tile files
    Demo {
        /// Output directory
        #[clap(value_parser)]
        output: PathBuf,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => NavConfig::default(),
    };

    match args.command {
        Commands::Info { mesh } => info(&mesh, config),
        Commands::Pack {
            output,
            origin,
            tile_width,
            tile_height,
            max_tiles,
            max_polys,
            tiles,
        } => {
            let params = NavMeshParams {
                origin: origin.to_array(),
                tile_width,
                tile_height,
                max_tiles: max_tiles.unwrap_or(tiles.len() as i32),
                max_polys_per_tile: max_polys,
            };
            pack(&output, params, &tiles, config)
        }
        Commands::FindPath {
            mesh,
            start,
            end,
            capacity,
            output,
        } => find_path(&mesh, start, end, capacity, output.as_deref(), config),
        Commands::Demo { output } => demo(&output),
    }
}

fn load_config(path: &Path) -> Result<NavConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: NavConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .map_err(|e| anyhow!("Invalid config {}: {}", path.display(), e))?;
    Ok(config)
}

/// Print the container header, then load every tile and report the outcome
fn info(mesh_path: &Path, config: NavConfig) -> Result<()> {
    let header = waypath::read_tile_set_header(mesh_path)?;
    print_header(&header);

    let mut context = NavContext::new(config)?;
    let report = context.load_tile_set(mesh_path)?;

    println!(
        "Loaded {} of {} tiles ({} rejected), {:?}",
        report.loaded,
        report.declared,
        report.rejected,
        report.status()
    );
    println!("Stopped: {:?}", report.stop);

    if let Some(mesh) = context.mesh() {
        for tile in mesh.tiles() {
            println!(
                "  tile {} at ({}, {}) layer {}: {} polys, {} bytes",
                tile.tile_ref(),
                tile.header.x,
                tile.header.y,
                tile.header.layer,
                tile.header.poly_count,
                tile.data().len()
            );
        }
    }

    Ok(())
}

fn print_header(header: &TileSetHeader) {
    let params = &header.params;
    println!("Tile set version {}", header.version);
    println!("  declared tiles: {}", header.tile_count);
    println!("  origin: {:?}", params.origin);
    println!(
        "  tile size: {} x {}",
        params.tile_width, params.tile_height
    );
    println!(
        "  max tiles: {}, max polys per tile: {}",
        params.max_tiles, params.max_polys_per_tile
    );
}

/// Pack single tile files into one container
fn pack(output: &Path, params: NavMeshParams, tiles: &[PathBuf], config: NavConfig) -> Result<()> {
    let mut context = NavContext::new(config)?;
    context.initialize(params)?;

    for path in tiles {
        let tile_ref = context
            .add_tile_file(path)
            .with_context(|| format!("Failed to add tile {}", path.display()))?;
        println!("Added {} as tile {}", path.display(), tile_ref);
    }

    let written = context.save_tile_set(output)?;
    println!("Wrote {} tiles to {}", written, output.display());
    Ok(())
}

/// Find a path on a tile-set container
fn find_path(
    mesh_path: &Path,
    start: Vec3,
    end: Vec3,
    capacity: usize,
    output: Option<&Path>,
    config: NavConfig,
) -> Result<()> {
    println!("Loading tile set from {}...", mesh_path.display());

    let mut context = NavContext::new(config)?;
    let report = context.load_tile_set(mesh_path)?;
    if !report.is_complete() {
        log::warn!(
            "Tile set only partially loaded: {} of {} tiles, {:?}",
            report.loaded,
            report.declared,
            report.stop
        );
    }

    println!("Finding path from {} to {}...", start, end);

    let path = match context.find_path(&PathRequest::new(start, end, capacity)) {
        Ok(path) => path,
        Err(err @ NavError::NoPathFound) => {
            println!("No path: {}", err);
            return Ok(());
        }
        Err(err) => {
            return Err(anyhow!("Failed to find path (code {}): {}", err.code(), err));
        }
    };

    println!(
        "Found path with {} waypoints{}{}",
        path.len(),
        if path.partial { " (partial)" } else { "" },
        if path.truncated { " (truncated)" } else { "" }
    );

    if let Some(output_path) = output {
        println!("Saving path to {}...", output_path.display());

        let mut file = File::create(output_path)
            .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

        writeln!(file, "# Path from {} to {}", start, end)?;
        writeln!(file, "# {} waypoints", path.len())?;

        for waypoint in &path.waypoints {
            writeln!(file, "{},{},{}", waypoint.x, waypoint.y, waypoint.z)?;
        }
    } else {
        println!("Path:");
        for (i, waypoint) in path.waypoints.iter().enumerate() {
            println!("{}: {},{},{}", i, waypoint.x, waypoint.y, waypoint.z);
        }
    }

    Ok(())
}

/// Write the demo tile sets and loose tile files into `dir`
fn demo(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let wall = [create_wall_tile(0, 0).map_err(|e| anyhow!("Failed to build tile: {}", e))?];
    write_demo_set(&dir.join("wall.mset"), 1, &wall)?;

    let mut quads = Vec::new();
    for (x, y) in [(0, 0), (1, 0), (0, 1)] {
        let tile =
            create_single_quad_tile(x, y).map_err(|e| anyhow!("Failed to build tile: {}", e))?;
        let path = dir.join(format!("quad_{}_{}.tile", x, y));
        let bytes =
            save_tile_to_binary(&tile).map_err(|e| anyhow!("Failed to encode tile: {}", e))?;
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write tile: {}", path.display()))?;
        println!("Wrote {}", path.display());
        quads.push(tile);
    }
    write_demo_set(&dir.join("l_shape.mset"), 4, &quads)?;

    let start = waypath::to_world_space([1.0, 0.0, 1.0]);
    let end = waypath::to_world_space([9.0, 0.0, 1.0]);
    println!(
        "Try: find-path --mesh {} --start={},{},{} --end={},{},{}",
        dir.join("wall.mset").display(),
        start.x,
        start.y,
        start.z,
        end.x,
        end.y,
        end.z
    );
    Ok(())
}

fn write_demo_set(path: &Path, max_tiles: i32, tiles: &[MeshTile]) -> Result<()> {
    let mut mesh = NavMesh::new(grid_params(max_tiles))
        .map_err(|e| anyhow!("Failed to create navmesh: {}", e))?;
    for tile in tiles {
        let bytes =
            save_tile_to_binary(tile).map_err(|e| anyhow!("Failed to encode tile: {}", e))?;
        mesh.add_tile(bytes, None)
            .map_err(|e| anyhow!("Failed to add tile: {}", e))?;
    }
    let written = waypath::save_tile_set(path, &mesh)?;
    println!("Wrote {} tiles to {}", written, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("1,2.5,-3").unwrap(), Vec3::new(1.0, 2.5, -3.0));
        assert_eq!(parse_vector(" 1, 2, 3").unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert!(parse_vector("1,2").is_err());
        assert!(parse_vector("1,x,3").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "waypath",
            "--verbose",
            "find-path",
            "--mesh",
            "zone.mset",
            "--start=-1,-1,0",
            "--end=-1,-9,0",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Commands::FindPath { start, capacity, .. } => {
                assert_eq!(start, Vec3::new(-1.0, -1.0, 0.0));
                assert_eq!(capacity, 256);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
