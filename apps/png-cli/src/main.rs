use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use png_core::timing::cycle_timing;
use png_eqsys::{
    EqSysError, EquationSystem, PngOptions, ProjectedNodalGradientEquationSystem, SolveOwnership,
    SymmetryBoundaryConditionData, WallBoundaryConditionData,
};
use png_mesh::{
    BLOCK_PART, Communicator, Mesh, MeshError, Realm, box_mesh_2d, box_mesh_3d, decompose,
    partition_by_axis, run_ranks, Topology,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "png")]
#[command(about = "Projected nodal gradient on structured box meshes", long_about = None)]
struct Cli {
    /// Log a breakdown of assembly and solve timings
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project the gradient of an analytic field and compare with the exact one
    Project {
        /// Cells per direction (two values for 2D, three for 3D)
        #[arg(long, num_args = 2..=3, default_values_t = [4, 4, 4])]
        cells: Vec<usize>,
        /// Box edge lengths, one per direction (defaults to 1)
        #[arg(long, num_args = 2..=3)]
        lengths: Vec<f64>,
        /// Field whose gradient is projected
        #[arg(long, value_enum, default_value_t = AnalyticField::Linear)]
        field: AnalyticField,
        /// Options YAML file
        #[arg(long)]
        options: Option<PathBuf>,
        /// Number of in-process ranks
        #[arg(long, default_value_t = 1)]
        ranks: usize,
        /// Side parts with a wall boundary holding the exact normal gradient
        #[arg(long)]
        wall: Vec<String>,
        /// Side parts with a symmetry boundary
        #[arg(long)]
        symmetry: Vec<String>,
        /// Write per-node results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate an options file and print the resolved options
    CheckOptions {
        /// Path to the options YAML file
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
enum AnalyticField {
    /// 2x - y + 3z
    Linear,
    /// x^2 + yz
    Quadratic,
    /// sin(x) cos(y) + z
    Trig,
}

impl AnalyticField {
    fn value(&self, x: &[f64; 3]) -> f64 {
        match self {
            AnalyticField::Linear => 2.0 * x[0] - x[1] + 3.0 * x[2],
            AnalyticField::Quadratic => x[0] * x[0] + x[1] * x[2],
            AnalyticField::Trig => x[0].sin() * x[1].cos() + x[2],
        }
    }

    fn gradient(&self, x: &[f64; 3]) -> [f64; 3] {
        match self {
            AnalyticField::Linear => [2.0, -1.0, 3.0],
            AnalyticField::Quadratic => [2.0 * x[0], x[2], x[1]],
            AnalyticField::Trig => [x[0].cos() * x[1].cos(), -x[0].sin() * x[1].sin(), 1.0],
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    EqSys(#[from] EqSysError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid arguments: {what}")]
    Usage { what: String },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone, Serialize)]
struct NodeResult {
    global_id: u64,
    coords: [f64; 3],
    gradient: Vec<f64>,
    exact: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct ProjectionDump {
    field: AnalyticField,
    spatial_dim: usize,
    ranks: usize,
    max_error: f64,
    nodes: Vec<NodeResult>,
}

/// Boundary setup shared by every rank.
struct Setup<'a> {
    field: AnalyticField,
    options: &'a PngOptions,
    wall: &'a [String],
    symmetry: &'a [String],
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.timing {
        png_core::timing::enable_timing();
    }

    match cli.command {
        Commands::Project {
            cells,
            lengths,
            field,
            options,
            ranks,
            wall,
            symmetry,
            output,
        } => cmd_project(
            &cells,
            &lengths,
            field,
            options.as_deref(),
            ranks,
            &wall,
            &symmetry,
            output.as_deref(),
        ),
        Commands::CheckOptions { path } => cmd_check_options(&path),
    }
}

fn cmd_check_options(path: &Path) -> CliResult<()> {
    let opts = png_eqsys::load_yaml(path)?;
    println!("✓ Options are valid");
    print!("{}", serde_yaml::to_string(&opts)?);
    Ok(())
}

fn build_mesh(cells: &[usize], lengths: &[f64]) -> CliResult<Mesh> {
    if !lengths.is_empty() && lengths.len() != cells.len() {
        return Err(CliError::Usage {
            what: format!(
                "{} cell counts but {} lengths",
                cells.len(),
                lengths.len()
            ),
        });
    }
    let len = |i: usize| lengths.get(i).copied().unwrap_or(1.0);
    let mesh = match cells {
        [nx, ny] => box_mesh_2d([*nx, *ny], [len(0), len(1)])?,
        [nx, ny, nz] => box_mesh_3d([*nx, *ny, *nz], [len(0), len(1), len(2)])?,
        _ => {
            return Err(CliError::Usage {
                what: "--cells takes two or three values".to_string(),
            });
        }
    };
    Ok(mesh)
}

/// Register, initialize and solve on one rank's realm.
fn project_on(mut realm: Realm, setup: &Setup<'_>) -> CliResult<Vec<NodeResult>> {
    let dim = realm.spatial_dim();
    let field = setup.field;
    let block = realm.part_ids(&[BLOCK_PART])?;

    let q = realm.fields_mut().declare("q", 1, &block)?;
    let dqdn = realm.fields_mut().declare("dqdn", 1, &[])?;
    {
        let (mesh, fields) = realm.split_mut();
        fields.fill_with(q, mesh, |x| vec![field.value(x)]);
    }

    let mut png =
        ProjectedNodalGradientEquationSystem::for_independent_field("q", SolveOwnership::SelfDriven)
            .with_options(setup.options.clone())?;
    png.register_nodal_fields(&mut realm, &block)?;
    png.register_interior_algorithm(&realm, block[0])?;

    let face_topology = if dim == 2 { Topology::Line2 } else { Topology::Quad4 };
    for side in setup.wall {
        let part = realm.part_ids(&[side.as_str()])?[0];
        // exact normal gradient at the nodes of the side
        let normal = side_normal(side, dim)?;
        for node in realm.mesh().part_nodes(part) {
            let coords = realm.mesh().coords_of(&[node])[0];
            let g = field.gradient(&coords);
            let dn: f64 = (0..dim).map(|d| g[d] * normal[d]).sum();
            realm.fields_mut().set_node_value(dqdn, node, &[dn]);
        }
        png.register_wall_bc(
            &realm,
            part,
            face_topology,
            &WallBoundaryConditionData::new("dqdn"),
        )?;
    }
    for side in setup.symmetry {
        let part = realm.part_ids(&[side.as_str()])?[0];
        png.register_symmetry_bc(
            &realm,
            part,
            face_topology,
            &SymmetryBoundaryConditionData::new("q"),
        )?;
    }

    png.initialize(&mut realm)?;
    png.solve_and_update(&mut realm)?;

    let dqdx = realm.fields().require(png.dof_name())?;
    let mesh = realm.mesh();
    Ok(mesh
        .nodes()
        .iter()
        .filter(|n| mesh.is_owned(n.id))
        .map(|n| NodeResult {
            global_id: n.global_id,
            coords: n.coords,
            gradient: realm.fields().node_value(dqdx, n.id).to_vec(),
            exact: field.gradient(&n.coords)[..dim].to_vec(),
        })
        .collect())
}

fn side_normal(side: &str, dim: usize) -> CliResult<[f64; 3]> {
    let normal = match side {
        "xmin" => [-1.0, 0.0, 0.0],
        "xmax" => [1.0, 0.0, 0.0],
        "ymin" => [0.0, -1.0, 0.0],
        "ymax" => [0.0, 1.0, 0.0],
        "zmin" if dim == 3 => [0.0, 0.0, -1.0],
        "zmax" if dim == 3 => [0.0, 0.0, 1.0],
        _ => {
            return Err(CliError::Usage {
                what: format!("unknown side '{}'", side),
            });
        }
    };
    Ok(normal)
}

#[allow(clippy::too_many_arguments)]
fn cmd_project(
    cells: &[usize],
    lengths: &[f64],
    field: AnalyticField,
    options_path: Option<&Path>,
    ranks: usize,
    wall: &[String],
    symmetry: &[String],
    output: Option<&Path>,
) -> CliResult<()> {
    let options = match options_path {
        Some(p) => png_eqsys::load_yaml(p)?,
        None => PngOptions::default(),
    };
    let mesh = build_mesh(cells, lengths)?;
    let dim = mesh.spatial_dim();
    let ranks = ranks.max(1);
    let setup = Setup {
        field,
        options: &options,
        wall,
        symmetry,
    };

    println!(
        "Projecting gradient of {:?} on {} nodes, {} elements, {} rank(s)",
        field,
        mesh.num_nodes(),
        mesh.elements().len(),
        ranks
    );

    let nodes = if ranks == 1 {
        project_on(Realm::serial(mesh), &setup)?
    } else {
        let owner = partition_by_axis(&mesh, ranks, 0);
        let locals = decompose(&mesh, &owner, ranks)?;
        let per_rank = run_ranks(ranks, |comm| {
            let local = locals[comm.rank()].clone();
            project_on(Realm::new(local, Arc::new(comm)), &setup)
        });
        let mut merged = BTreeMap::new();
        for result in per_rank {
            for node in result? {
                merged.insert(node.global_id, node);
            }
        }
        merged.into_values().collect()
    };

    let max_error = nodes
        .iter()
        .flat_map(|n| n.gradient.iter().zip(&n.exact).map(|(g, e)| (g - e).abs()))
        .fold(0.0, f64::max);
    println!("✓ Solved");
    println!("  Owned nodes: {}", nodes.len());
    println!("  Max nodal error: {:.3e}", max_error);
    cycle_timing::log_summary();

    if let Some(path) = output {
        let dump = ProjectionDump {
            field,
            spatial_dim: dim,
            ranks,
            max_error,
            nodes,
        };
        std::fs::write(path, serde_json::to_string_pretty(&dump)?)?;
        println!("  Wrote {}", path.display());
    }
    Ok(())
}
