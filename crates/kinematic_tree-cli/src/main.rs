//! kintree - inspect URDF robots from the command line
//!
//! Loads a URDF file into a kinematic tree and prints its structure, the world
//! pose of a frame, or a frame's Jacobian as JSON or YAML.

mod logger;
mod report;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use kinematic_tree::{KinematicTree, Vector3};
use kinematic_tree_urdf::{LoaderConfig, build_tree, parse_file};
use report::{JacobianReport, PoseReport, ReportFormat, TreeReport};
use tracing::{Level, debug, info};

#[derive(Parser)]
#[command(
    name = "kintree",
    about = "Kinematic tree inspector",
    long_about = "Load a URDF robot and report its frames, forward kinematics and Jacobians"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by every subcommand
#[derive(clap::Args)]
struct Model {
    /// Path to the URDF file
    urdf: PathBuf,
    /// YAML file with loader options
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Joint coordinates, comma separated, in `info` order
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    q: Vec<f64>,
    /// Output format (json, yaml)
    #[arg(short, long, default_value = "json")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List frames and joint coordinates
    Info {
        #[command(flatten)]
        model: Model,
    },
    /// World pose of a frame
    Pose {
        #[command(flatten)]
        model: Model,
        /// Frame name
        #[arg(long)]
        frame: String,
    },
    /// Velocity Jacobian of a frame
    Jacobian {
        #[command(flatten)]
        model: Model,
        /// Frame name
        #[arg(long)]
        frame: String,
        /// Point in the frame's coordinates, as x,y,z
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        point: Vec<f64>,
        /// Express the Jacobian in the frame's own axes
        #[arg(long, conflicts_with = "point")]
        body: bool,
    },
    /// Drag a frame along a force and report where the joints settle
    Poke {
        #[command(flatten)]
        model: Model,
        /// Frame name
        #[arg(long)]
        frame: String,
        /// Force in world axes, as x,y,z
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        force: Vec<f64>,
        /// Step gain
        #[arg(long, default_value_t = 0.1)]
        gain: f64,
        /// Number of steps
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
}

fn main() {
    color_eyre::config::HookBuilder::default()
        .capture_span_trace_by_default(true)
        .display_location_section(true)
        .display_env_section(false)
        .install()
        .unwrap_or_else(|error| eprintln!("Failed to install color-eyre: {error}"));

    let cli = Cli::parse();
    logger::init_logger(match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    });

    let result = match cli.command {
        Commands::Info { model } => info_command(&model),
        Commands::Pose { model, frame } => pose_command(&model, &frame),
        Commands::Jacobian {
            model,
            frame,
            point,
            body,
        } => jacobian_command(&model, &frame, &point, body),
        Commands::Poke {
            model,
            frame,
            force,
            gain,
            steps,
        } => poke_command(&model, &frame, &force, gain, steps),
    };

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<LoaderConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn load_tree(model: &Model) -> Result<KinematicTree> {
    let config = match &model.config {
        Some(path) => load_config(path)?,
        None => LoaderConfig::default(),
    };
    debug!(?config, "loader config");

    let urdf = parse_file(&model.urdf)
        .with_context(|| format!("Failed to parse {}", model.urdf.display()))?;
    let mut tree = build_tree(&urdf, &config)
        .with_context(|| format!("Failed to build tree for robot '{}'", urdf.name))?;
    info!(robot = %urdf.name, frames = tree.frames().len(), dof = tree.dof(), "loaded");

    if !model.q.is_empty() {
        tree.set_coordinates(&model.q)
            .wrap_err("Failed to set joint coordinates")?;
    }
    Ok(tree)
}

fn parse_vector(values: &[f64], what: &str) -> Result<Vector3<f64>> {
    match values {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(eyre!(
            "{} needs 3 comma separated values, got {}",
            what,
            values.len()
        )),
    }
}

fn info_command(model: &Model) -> Result<()> {
    let format = ReportFormat::parse(&model.format)?;
    let tree = load_tree(model)?;
    println!("{}", format.render(&TreeReport::new(&tree))?);
    eprintln!();
    eprint!("{tree}");
    Ok(())
}

fn pose_command(model: &Model, frame: &str) -> Result<()> {
    let format = ReportFormat::parse(&model.format)?;
    let tree = load_tree(model)?;
    let pose = tree.world_pose(frame)?;
    println!(
        "{}",
        format.render(&PoseReport::new(frame, tree.coordinates(), &pose))?
    );
    Ok(())
}

fn jacobian_command(model: &Model, frame: &str, point: &[f64], body: bool) -> Result<()> {
    let format = ReportFormat::parse(&model.format)?;
    let tree = load_tree(model)?;

    let point = if point.is_empty() {
        None
    } else {
        Some(parse_vector(point, "--point")?)
    };
    let (kind, jacobian) = if body {
        ("body", tree.body_jacobian(frame)?)
    } else {
        ("world", tree.jacobian(frame, point.as_ref())?)
    };
    let report = JacobianReport::new(
        &tree,
        frame,
        kind,
        point.map(|p| [p.x, p.y, p.z]),
        &jacobian,
    );
    println!("{}", format.render(&report)?);
    Ok(())
}

fn poke_command(
    model: &Model,
    frame: &str,
    force: &[f64],
    gain: f64,
    steps: usize,
) -> Result<()> {
    let format = ReportFormat::parse(&model.format)?;
    let force = parse_vector(force, "--force")?;
    let mut tree = load_tree(model)?;

    let start = tree.world_pose(frame)?.translation();
    for _ in 0..steps {
        tree.poke(frame, None, &force, gain)?;
    }
    let pose = tree.world_pose(frame)?;
    println!(
        "{}",
        format.render(&PoseReport::new(frame, tree.coordinates(), &pose))?
    );
    eprintln!(
        "Moved {} by {:.6} after {} step(s)",
        frame,
        (pose.translation() - start).norm(),
        steps
    );
    Ok(())
}
