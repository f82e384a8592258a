use kinematic_tree::{Inertia, JointKind, Pose};
use nalgebra::Vector3;

/// A parsed `<robot>` document: links and joints in document order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UrdfModel {
    pub name: String,
    pub links: Vec<UrdfLink>,
    pub joints: Vec<UrdfJoint>,
}

impl UrdfModel {
    pub fn link(&self, name: &str) -> Option<&UrdfLink> {
        self.links.iter().find(|link| link.name == name)
    }

    pub fn joint(&self, name: &str) -> Option<&UrdfJoint> {
        self.joints.iter().find(|joint| joint.name == name)
    }

    /// Links that are never a joint's child, in order of first appearance
    ///
    /// Parents referenced by joints but never declared with `<link>` count too.
    pub fn root_links(&self) -> Vec<&str> {
        let is_child = |name: &str| self.joints.iter().any(|joint| joint.child == name);
        let declared = self.links.iter().map(|link| link.name.as_str());
        let referenced = self.joints.iter().map(|joint| joint.parent.as_str());

        let mut roots: Vec<&str> = Vec::new();
        for name in declared.chain(referenced) {
            if !is_child(name) && !roots.contains(&name) {
                roots.push(name);
            }
        }
        roots
    }
}

/// `<origin xyz=".." rpy=".."/>`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Origin {
    pub xyz: Vector3<f64>,
    /// Roll, pitch, yaw about the fixed x, y and z axes
    pub rpy: Vector3<f64>,
}

impl Origin {
    /// `Trans(xyz) · Rz(yaw) · Ry(pitch) · Rx(roll)`
    pub fn to_pose(&self) -> Pose {
        Pose::rotation_z(self.rpy.z)
            .rotate_by_y(self.rpy.y)
            .rotate_by_x(self.rpy.x)
            .shift(&self.xyz)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UrdfLink {
    pub name: String,
    pub inertial: Option<UrdfInertial>,
}

/// Mass properties of a link; only the diagonal of the inertia tensor is kept
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UrdfInertial {
    pub origin: Origin,
    pub mass: f64,
    /// `[ixx, iyy, izz]`
    pub diagonal: Vector3<f64>,
}

impl UrdfInertial {
    pub fn inertia(&self) -> Inertia {
        Inertia::new(self.mass, self.diagonal)
    }
}

/// The `type` attribute of a `<joint>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrdfJointType {
    Revolute,
    Continuous,
    Prismatic,
    Fixed,
    Floating,
    Planar,
    Unknown(String),
}

impl UrdfJointType {
    pub fn parse(value: &str) -> Self {
        match value {
            "revolute" => Self::Revolute,
            "continuous" => Self::Continuous,
            "prismatic" => Self::Prismatic,
            "fixed" => Self::Fixed,
            "floating" => Self::Floating,
            "planar" => Self::Planar,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The primitive that moves along the joint-aligned z-axis, or `None` when
    /// the joint is (or degrades to) a fixed frame
    pub fn primitive(&self) -> Option<JointKind> {
        match self {
            Self::Revolute | Self::Continuous => Some(JointKind::RotateZ),
            Self::Prismatic => Some(JointKind::TranslateZ),
            Self::Fixed | Self::Floating | Self::Planar | Self::Unknown(_) => None,
        }
    }

    /// Whether this joint type is approximated by a fixed frame
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Floating | Self::Planar | Self::Unknown(_))
    }
}

impl std::fmt::Display for UrdfJointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revolute => f.write_str("revolute"),
            Self::Continuous => f.write_str("continuous"),
            Self::Prismatic => f.write_str("prismatic"),
            Self::Fixed => f.write_str("fixed"),
            Self::Floating => f.write_str("floating"),
            Self::Planar => f.write_str("planar"),
            Self::Unknown(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UrdfJoint {
    pub name: String,
    pub joint_type: UrdfJointType,
    pub parent: String,
    pub child: String,
    pub origin: Origin,
    /// Defaults to `(1, 0, 0)` when the `<axis>` element is absent
    pub axis: Vector3<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn joint(parent: &str, child: &str) -> UrdfJoint {
        UrdfJoint {
            name: format!("{parent}_to_{child}"),
            joint_type: UrdfJointType::Fixed,
            parent: parent.to_string(),
            child: child.to_string(),
            origin: Origin::default(),
            axis: Vector3::x(),
        }
    }

    #[test]
    fn test_origin_pose_applies_yaw_last() {
        let origin = Origin {
            xyz: Vector3::new(1.0, 2.0, 3.0),
            rpy: Vector3::new(FRAC_PI_2, 0.0, FRAC_PI_2),
        };
        let pose = origin.to_pose();
        assert_relative_eq!(pose.translation(), Vector3::new(1.0, 2.0, 3.0));

        // Roll first maps y onto z, then yaw leaves z alone.
        let y = pose.rotation_matrix() * Vector3::y();
        assert_relative_eq!(y, Vector3::z(), epsilon = 1e-12);
        // Yaw maps the (rolled, unchanged) x onto y.
        let x = pose.rotation_matrix() * Vector3::x();
        assert_relative_eq!(x, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_joint_type_parse() {
        assert_eq!(UrdfJointType::parse("revolute"), UrdfJointType::Revolute);
        assert_eq!(
            UrdfJointType::parse("ball"),
            UrdfJointType::Unknown("ball".to_string())
        );
        assert_eq!(UrdfJointType::Continuous.primitive(), Some(JointKind::RotateZ));
        assert_eq!(UrdfJointType::Prismatic.primitive(), Some(JointKind::TranslateZ));
        assert!(UrdfJointType::Planar.primitive().is_none());
        assert!(UrdfJointType::Floating.is_degraded());
        assert!(!UrdfJointType::Fixed.is_degraded());
        assert_eq!(UrdfJointType::Unknown("ball".into()).to_string(), "ball");
    }

    #[test]
    fn test_root_links() {
        let model = UrdfModel {
            name: "r".to_string(),
            links: vec![
                UrdfLink {
                    name: "arm".to_string(),
                    inertial: None,
                },
                UrdfLink {
                    name: "base".to_string(),
                    inertial: None,
                },
            ],
            joints: vec![joint("base", "arm"), joint("world", "base"), joint("base", "cam")],
        };
        assert_eq!(model.root_links(), vec!["world"]);
        assert!(model.link("arm").is_some());
        assert!(model.joint("base_to_cam").is_some());
    }
}
