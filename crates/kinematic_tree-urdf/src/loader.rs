use std::collections::HashMap;
use std::path::Path;

use kinematic_tree::{Frame, KinematicTree, Pose, ROOT_FRAME_NAME};
use tracing::{debug, trace, warn};

use crate::error::{Result, UrdfError};
use crate::model::{UrdfJoint, UrdfModel};
use crate::parser;

/// Naming and content options for [`build_tree`]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Suffix of the fixed frame holding a movable joint's origin
    pub joint_frame_suffix: String,
    /// Add a body frame for every link with an `<inertial>` element
    pub attach_inertia: bool,
    /// Suffix of those body frames
    pub body_suffix: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            joint_frame_suffix: "_f".to_string(),
            attach_inertia: true,
            body_suffix: "_body".to_string(),
        }
    }
}

/// Parse and build a tree with the default [`LoaderConfig`]
pub fn load_str(xml: &str) -> Result<KinematicTree> {
    build_tree(&parser::parse_str(xml)?, &LoaderConfig::default())
}

/// Read, parse and build a tree with the default [`LoaderConfig`]
pub fn load_file(path: impl AsRef<Path>) -> Result<KinematicTree> {
    build_tree(&parser::parse_file(path)?, &LoaderConfig::default())
}

/// Assemble a [`KinematicTree`] from a parsed model
///
/// Root links become identity frames under the tree root. Each joint then
/// adds frames under its parent link:
///
/// * revolute/continuous: a fixed frame `<child><joint_frame_suffix>` at the
///   joint origin, rotated so its z-axis is the joint axis, and a
///   [`JointKind::RotateZ`](kinematic_tree::JointKind::RotateZ) frame `<child>`
/// * prismatic: the same pair with a `TranslateZ` frame
/// * fixed: a single fixed frame `<child>`
/// * floating, planar and unknown types are logged and treated as fixed
///
/// A movable link's frame keeps the axis-aligned orientation; the origins of
/// its child joints and inertial block are re-expressed to compensate, so
/// every frame sits where the URDF places it.
///
/// Joints may appear before their parent link is attached. Resolution runs
/// in passes, at most one per joint; joints still unattached afterwards
/// (for example a cycle of links) are reported as [`UrdfError::Unresolved`].
pub fn build_tree(model: &UrdfModel, config: &LoaderConfig) -> Result<KinematicTree> {
    let mut tree = KinematicTree::new();
    let mut alignment: HashMap<&str, Pose> = HashMap::new();

    // A root link named like the tree root is the tree root.
    for root in model.root_links() {
        if root != ROOT_FRAME_NAME {
            tree.add_frame(root, |_| Frame::fixed(Pose::identity()), None)?;
        }
    }

    let mut pending: Vec<&UrdfJoint> = model.joints.iter().collect();
    let passes = pending.len();
    for pass in 0..passes {
        if pending.is_empty() {
            break;
        }
        let mut deferred = Vec::new();
        for joint in pending {
            if tree.contains(&joint.parent) {
                add_joint(&mut tree, joint, config, &mut alignment)?;
            } else {
                deferred.push(joint);
            }
        }
        trace!(pass, remaining = deferred.len(), "resolved URDF joints");
        pending = deferred;
    }
    if !pending.is_empty() {
        return Err(UrdfError::Unresolved {
            links: pending.iter().map(|joint| joint.child.clone()).collect(),
        });
    }

    if config.attach_inertia {
        for link in &model.links {
            let Some(inertial) = link.inertial else {
                continue;
            };
            let link_alignment = alignment.get(link.name.as_str()).copied();
            let pose = link_alignment.unwrap_or_default().inv() * inertial.origin.to_pose();
            let name = format!("{}{}", link.name, config.body_suffix);
            tree.add_frame(
                &name,
                |_| Frame::body(pose, inertial.inertia()),
                Some(link.name.as_str()),
            )?;
        }
    }

    tree.update();
    debug!(
        robot = %model.name,
        frames = tree.frames().len(),
        dof = tree.dof(),
        "built kinematic tree from URDF"
    );
    Ok(tree)
}

fn add_joint<'a>(
    tree: &mut KinematicTree,
    joint: &'a UrdfJoint,
    config: &LoaderConfig,
    alignment: &mut HashMap<&'a str, Pose>,
) -> Result<()> {
    let parent_alignment = alignment.get(joint.parent.as_str()).copied();
    let origin = parent_alignment.unwrap_or_default().inv() * joint.origin.to_pose();

    match joint.joint_type.primitive() {
        Some(kind) => {
            let axis_pose = Pose::from_axis(&joint.axis);
            let origin_name = format!("{}{}", joint.child, config.joint_frame_suffix);
            tree.add_frame(
                &origin_name,
                |_| Frame::fixed(origin * axis_pose),
                Some(joint.parent.as_str()),
            )?;
            tree.add_frame(
                &joint.child,
                |_| Frame::joint(kind),
                Some(origin_name.as_str()),
            )?;
            alignment.insert(joint.child.as_str(), axis_pose);
        }
        None => {
            if joint.joint_type.is_degraded() {
                warn!(
                    joint = %joint.name,
                    joint_type = %joint.joint_type,
                    "Setting joint {} as a fixed joint",
                    joint.child
                );
            }
            tree.add_frame(
                &joint.child,
                |_| Frame::fixed(origin),
                Some(joint.parent.as_str()),
            )?;
        }
    }
    Ok(())
}
