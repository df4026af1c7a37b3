use anyhow::{Context, Result};
use breakage::BreakageConfig;
use clap::{Args, Parser, Subcommand};
use fracture::{
    check_geometry, Aabb, AssetId, BreakableMaterial, BreakablePlane, FlatPieceParams, MeshAsset,
    RenderMesh, Vertex,
};
use glam::{Mat4, Vec2, Vec3};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fracture-probe")]
#[command(about = "Inspect fracture grids and break results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Generated box pane in the XY plane
#[derive(Args, Clone, Copy)]
struct PaneArgs {
    /// Pane width (X)
    #[arg(long, default_value_t = 1.0)]
    width: f32,

    /// Pane height (Y)
    #[arg(long, default_value_t = 1.0)]
    height: f32,

    /// Pane thickness (Z)
    #[arg(long, default_value_t = 0.02)]
    thickness: f32,

    /// Target fracture cell size
    #[arg(long, default_value_t = 0.1)]
    cell_size: f32,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a pane passes the fracture preconditions
    Check {
        #[command(flatten)]
        pane: PaneArgs,
    },

    /// Break a pane and report the pieces
    Break {
        #[command(flatten)]
        pane: PaneArgs,

        /// Impact X in pane units
        #[arg(short, long, default_value_t = 0.5)]
        x: f32,

        /// Impact Y in pane units
        #[arg(short, long, default_value_t = 0.5)]
        y: f32,

        /// Blast radius (defaults to the configured blast radius)
        #[arg(short, long)]
        radius: Option<f32>,

        /// Grid and break seed
        #[arg(short, long, default_value_t = 1)]
        seed: u64,

        /// Breakage config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective breakage config as TOML
    Config {
        /// Breakage config file
        path: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PieceReport {
    triangles: usize,
    area: f32,
    bounds: Aabb,
    center: Vec3,
    collision: &'static str,
    terminal: bool,
}

#[derive(Serialize)]
struct BreakReport {
    cells: usize,
    pieces: Vec<PieceReport>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { pane } => check(pane),
        Commands::Break {
            pane,
            x,
            y,
            radius,
            seed,
            config,
            json,
        } => {
            let config = load_config(config.as_ref())?;
            let radius = radius.unwrap_or(config.fracture.blast_radius);
            break_pane(pane, Vec2::new(x, y), radius, seed, &config, json)
        }
        Commands::Config { path } => {
            let config = load_config(path.as_ref())?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BreakageConfig> {
    match path {
        Some(path) => BreakageConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BreakageConfig::default()),
    }
}

fn material(pane: &PaneArgs) -> BreakableMaterial {
    BreakableMaterial {
        cell_size: pane.cell_size,
        ..Default::default()
    }
}

fn check(pane: PaneArgs) -> Result<()> {
    let asset = pane_asset(&pane);
    match check_geometry(&asset, &material(&pane)) {
        Ok(frame) => {
            println!("breakable: axis {:?}, thickness {:.4}", frame.axis, frame.thickness());
            println!("  rect {:?} .. {:?}", frame.rect.min, frame.rect.max);
        }
        Err(e) => println!("not breakable: {}", e),
    }
    Ok(())
}

fn break_pane(
    pane: PaneArgs,
    impact: Vec2,
    radius: f32,
    seed: u64,
    config: &BreakageConfig,
    json: bool,
) -> Result<()> {
    let mut asset = pane_asset(&pane);
    let plane = BreakablePlane::set_geometry(&mut asset, &material(&pane), true, seed)
        .context("pane is not breakable")?;

    let stream = plane.break_at(impact.extend(0.0), radius, seed, config.fracture.filter_angle());
    tracing::info!("{} pieces in stream", stream.piece_count());

    let params = FlatPieceParams {
        effect: None,
        no_physics: false,
        edge_alpha: 1.0,
        crumble_spacing: 0.0,
    };
    let pieces = plane.synthesize(&stream, &Mat4::IDENTITY, &params);

    let report = BreakReport {
        cells: plane.grid().cell_count(),
        pieces: pieces
            .iter()
            .map(|p| PieceReport {
                triangles: p.mesh.triangle_count(),
                area: p.area,
                bounds: p.bounds,
                center: p.world_center(),
                collision: match &p.phys {
                    Some(phys) if phys.is_voxels() => "voxels",
                    Some(_) => "trimesh",
                    None => "none",
                },
                terminal: p.terminal,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("grid: {} cells", report.cells);
    for (i, piece) in report.pieces.iter().enumerate() {
        println!(
            "piece {:3}: {:4} tris, area {:.4}, center ({:.3}, {:.3}), {}{}",
            i,
            piece.triangles,
            piece.area,
            piece.center.x,
            piece.center.y,
            piece.collision,
            if piece.terminal { " [remainder]" } else { "" }
        );
    }
    Ok(())
}

/// Closed box pane with its front face at +Z
fn pane_asset(pane: &PaneArgs) -> MeshAsset {
    let max = Vec3::new(pane.width, pane.height, pane.thickness * 0.5);
    let min = Vec3::new(0.0, 0.0, -pane.thickness * 0.5);
    let mut mesh = RenderMesh::new();
    for axis in 0..3 {
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for (side, s) in [(-1.0f32, min[axis]), (1.0, max[axis])] {
            let mut normal = Vec3::ZERO;
            normal[axis] = side;
            let quad = [(min[u], min[v]), (max[u], min[v]), (max[u], max[v]), (min[u], max[v])]
                .map(|(a, b)| {
                    let mut p = Vec3::ZERO;
                    p[axis] = s;
                    p[u] = a;
                    p[v] = b;
                    Vertex::new(p, normal, Vec2::new(a, b))
                });
            if side > 0.0 {
                mesh.push_triangle([quad[0], quad[1], quad[2]], 0);
                mesh.push_triangle([quad[0], quad[2], quad[3]], 0);
            } else {
                mesh.push_triangle([quad[0], quad[2], quad[1]], 0);
                mesh.push_triangle([quad[0], quad[3], quad[2]], 0);
            }
        }
    }
    MeshAsset::new(AssetId(1), "probe-pane", mesh)
}
