//! Serializable reports printed by `kintree`

use color_eyre::{Result, eyre::eyre};
use kinematic_tree::{KinematicTree, Matrix6xX, Pose};
use serde::{Deserialize, Serialize};

/// Output encoding of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Yaml,
}

impl ReportFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn parse(format: &str) -> Result<Self> {
        Self::from_extension(format).ok_or_else(|| {
            eyre!(
                "Unsupported format '{}'. Supported formats: json, yaml",
                format
            )
        })
    }

    pub fn render<T: Serialize>(self, report: &T) -> Result<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(report)?,
            Self::Yaml => serde_yaml::to_string(report)?,
        })
    }
}

/// One frame of the tree, as listed by `kintree info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSummary {
    pub name: String,
    pub parent: Option<String>,
    pub kind: String,
    /// Position in the coordinate vector, if the frame is a joint
    pub coordinate: Option<usize>,
    pub mass: Option<f64>,
}

/// Structure of a loaded tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeReport {
    pub dof: usize,
    pub coordinates: Vec<String>,
    pub frames: Vec<FrameSummary>,
}

impl TreeReport {
    pub fn new(tree: &KinematicTree) -> Self {
        let frames = tree.frames();
        let summaries = frames
            .iter()
            .map(|(id, frame)| FrameSummary {
                name: frame.name().to_string(),
                parent: frame.parent().map(|parent| frames[parent].name().to_string()),
                kind: frame.kind().to_string(),
                coordinate: tree.coordinate_frames().iter().position(|&c| c == id),
                mass: frame.inertia().map(|inertia| inertia.mass),
            })
            .collect();

        Self {
            dof: tree.dof(),
            coordinates: tree
                .coordinate_names()
                .into_iter()
                .map(String::from)
                .collect(),
            frames: summaries,
        }
    }
}

/// World pose of one frame at one configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoseReport {
    pub frame: String,
    pub q: Vec<f64>,
    pub translation: [f64; 3],
    /// Row-major rotation matrix
    pub rotation: [[f64; 3]; 3],
}

impl PoseReport {
    pub fn new(frame: &str, q: Vec<f64>, pose: &Pose) -> Self {
        let translation = pose.translation();
        let rotation = pose.rotation_matrix();
        Self {
            frame: frame.to_string(),
            q,
            translation: [translation.x, translation.y, translation.z],
            rotation: std::array::from_fn(|r| std::array::from_fn(|c| rotation[(r, c)])),
        }
    }
}

/// Jacobian of one frame at one configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JacobianReport {
    pub frame: String,
    /// `world` or `body`
    pub kind: String,
    pub q: Vec<f64>,
    pub point: Option<[f64; 3]>,
    /// Coordinate frame owning each column
    pub columns: Vec<String>,
    /// Six rows: linear x, y, z then angular x, y, z
    pub rows: Vec<Vec<f64>>,
}

impl JacobianReport {
    pub fn new(
        tree: &KinematicTree,
        frame: &str,
        kind: &str,
        point: Option<[f64; 3]>,
        jacobian: &Matrix6xX<f64>,
    ) -> Self {
        Self {
            frame: frame.to_string(),
            kind: kind.to_string(),
            q: tree.coordinates(),
            point,
            columns: tree
                .coordinate_names()
                .into_iter()
                .map(String::from)
                .collect(),
            rows: jacobian
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
        }
    }
}
