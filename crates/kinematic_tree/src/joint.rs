use nalgebra::Vector3;

use crate::pose::Pose;
use crate::twist::Twist;
use crate::Error;

/// The closed set of joint primitives a frame can carry
///
/// `Fixed` frames contribute no degree of freedom. Each other variant adds
/// one generalized coordinate: an angle about, or a displacement along, one
/// axis of the frame's own basis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JointKind {
    #[default]
    Fixed,
    RotateX,
    RotateY,
    RotateZ,
    TranslateX,
    TranslateY,
    TranslateZ,
}

/// Local transform of a movable frame and its analytic derivatives
///
/// Every matrix is a closed-form function of the joint coordinate `q`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalState {
    /// Pose of the child in the parent
    pub parent_pose_child: Pose,
    /// Inverse of `parent_pose_child`
    pub child_pose_parent: Pose,
    /// `∂(parent_pose_child)/∂q`
    pub parent_dif1_child: Twist,
    /// `∂²(parent_pose_child)/∂q²`
    pub parent_dif2_child: Twist,
    /// `∂(child_pose_parent)/∂q`
    pub child_dif1_parent: Twist,
    /// `∂²(child_pose_parent)/∂q²`
    pub child_dif2_parent: Twist,
    /// Unit joint twist `child_pose_parent · parent_dif1_child`
    pub parent_twist_child: Twist,
}

impl JointKind {
    /// All variants, in declaration order
    pub const ALL: [JointKind; 7] = [
        JointKind::Fixed,
        JointKind::RotateX,
        JointKind::RotateY,
        JointKind::RotateZ,
        JointKind::TranslateX,
        JointKind::TranslateY,
        JointKind::TranslateZ,
    ];

    /// Whether this joint contributes no degree of freedom
    pub fn is_fixed(self) -> bool {
        self == JointKind::Fixed
    }

    pub fn is_rotation(self) -> bool {
        matches!(
            self,
            JointKind::RotateX | JointKind::RotateY | JointKind::RotateZ
        )
    }

    pub fn is_translation(self) -> bool {
        matches!(
            self,
            JointKind::TranslateX | JointKind::TranslateY | JointKind::TranslateZ
        )
    }

    /// Index of the moving axis in the frame's basis
    fn axis_index(self) -> Option<usize> {
        match self {
            JointKind::Fixed => None,
            JointKind::RotateX | JointKind::TranslateX => Some(0),
            JointKind::RotateY | JointKind::TranslateY => Some(1),
            JointKind::RotateZ | JointKind::TranslateZ => Some(2),
        }
    }

    /// Unit axis of motion, `None` for fixed joints
    pub fn axis(self) -> Option<Vector3<f64>> {
        self.axis_index().map(|i| {
            let mut axis = Vector3::zeros();
            axis[i] = 1.0;
            axis
        })
    }

    /// The local pose and its derivatives at coordinate `q`
    ///
    /// Returns `None` for [`JointKind::Fixed`]; a fixed frame's local pose is
    /// constant and its derivatives are zero.
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{JointKind, Vector3};
    ///
    /// let state = JointKind::TranslateY.local_state(0.5).unwrap();
    /// assert_eq!(state.parent_pose_child.translation(), Vector3::new(0.0, 0.5, 0.0));
    /// assert!(JointKind::Fixed.local_state(0.5).is_none());
    /// ```
    pub fn local_state(self, q: f64) -> Option<LocalState> {
        let axis = self.axis_index()?;
        if self.is_rotation() {
            Some(rotation_state(axis, q))
        } else {
            Some(translation_state(axis, q))
        }
    }
}

/// Rows/columns of the rotation block spanned by a rotation about `axis`,
/// in cyclic order so that `(b, c)` satisfies `e_b × e_c = e_axis`.
fn rotation_plane(axis: usize) -> (usize, usize) {
    ((axis + 1) % 3, (axis + 2) % 3)
}

/// Write a 2×2 block `[[m00, m01], [m10, m11]]` into the `(b, c)` plane.
fn write_plane<F: FnMut(usize, usize, f64)>(
    (b, c): (usize, usize),
    [m00, m01, m10, m11]: [f64; 4],
    mut set: F,
) {
    set(b, b, m00);
    set(b, c, m01);
    set(c, b, m10);
    set(c, c, m11);
}

fn rotation_state(axis: usize, q: f64) -> LocalState {
    let (sq, cq) = q.sin_cos();
    let plane = rotation_plane(axis);

    let mut parent_pose_child = Pose::identity();
    let mut child_pose_parent = Pose::identity();
    let mut parent_dif1_child = Twist::zeros();
    let mut parent_dif2_child = Twist::zeros();
    let mut child_dif1_parent = Twist::zeros();
    let mut child_dif2_parent = Twist::zeros();

    write_plane(plane, [cq, -sq, sq, cq], |r, c, v| {
        parent_pose_child.set(r, c, v)
    });
    write_plane(plane, [-sq, -cq, cq, -sq], |r, c, v| {
        parent_dif1_child.set(r, c, v)
    });
    write_plane(plane, [-cq, sq, -sq, -cq], |r, c, v| {
        parent_dif2_child.set(r, c, v)
    });

    // The inverse of a pure rotation is its transpose, so the inverse caches
    // are the transposed blocks.
    write_plane(plane, [cq, sq, -sq, cq], |r, c, v| {
        child_pose_parent.set(r, c, v)
    });
    write_plane(plane, [-sq, cq, -cq, -sq], |r, c, v| {
        child_dif1_parent.set(r, c, v)
    });
    write_plane(plane, [-cq, -sq, sq, -cq], |r, c, v| {
        child_dif2_parent.set(r, c, v)
    });

    LocalState {
        parent_pose_child,
        child_pose_parent,
        parent_dif1_child,
        parent_dif2_child,
        child_dif1_parent,
        child_dif2_parent,
        parent_twist_child: child_pose_parent * parent_dif1_child,
    }
}

fn translation_state(axis: usize, q: f64) -> LocalState {
    let mut parent_pose_child = Pose::identity();
    let mut child_pose_parent = Pose::identity();
    let mut parent_dif1_child = Twist::zeros();
    let mut child_dif1_parent = Twist::zeros();
    let mut parent_twist_child = Twist::zeros();

    parent_pose_child.set(axis, 3, q);
    child_pose_parent.set(axis, 3, -q);
    parent_dif1_child.set(axis, 3, 1.0);
    child_dif1_parent.set(axis, 3, -1.0);
    parent_twist_child.set(axis, 3, 1.0);

    LocalState {
        parent_pose_child,
        child_pose_parent,
        parent_dif1_child,
        parent_dif2_child: Twist::zeros(),
        child_dif1_parent,
        child_dif2_parent: Twist::zeros(),
        parent_twist_child,
    }
}

impl std::fmt::Display for JointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JointKind::Fixed => "fixed",
            JointKind::RotateX => "rotate_x",
            JointKind::RotateY => "rotate_y",
            JointKind::RotateZ => "rotate_z",
            JointKind::TranslateX => "translate_x",
            JointKind::TranslateY => "translate_y",
            JointKind::TranslateZ => "translate_z",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for JointKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| Error::UnknownJointKind {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector6};
    use std::f64::consts::FRAC_PI_2;

    const STEP: f64 = 1.0e-6;
    const STEP2: f64 = 1.0e-4;

    fn movable() -> impl Iterator<Item = JointKind> {
        JointKind::ALL.into_iter().filter(|k| !k.is_fixed())
    }

    #[test]
    fn test_fixed_has_no_state() {
        assert!(JointKind::Fixed.local_state(1.0).is_none());
        assert!(JointKind::Fixed.axis().is_none());
        assert!(JointKind::default().is_fixed());
    }

    #[test]
    fn test_inverse_caches_match() {
        for kind in movable() {
            let state = kind.local_state(0.37).unwrap();
            let product = state.parent_pose_child * state.child_pose_parent;
            assert_relative_eq!(*product.matrix(), Matrix4::identity(), epsilon = 1e-12);
            assert_relative_eq!(
                *state.child_pose_parent.matrix(),
                *state.parent_pose_child.inv().matrix(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let q = 0.81;
        for kind in movable() {
            let state = kind.local_state(q).unwrap();
            let plus = kind.local_state(q + STEP).unwrap();
            let minus = kind.local_state(q - STEP).unwrap();
            let plus2 = kind.local_state(q + STEP2).unwrap();
            let minus2 = kind.local_state(q - STEP2).unwrap();

            let dif1 = (plus.parent_pose_child.matrix() - minus.parent_pose_child.matrix())
                / (2.0 * STEP);
            assert_relative_eq!(dif1, *state.parent_dif1_child.matrix(), epsilon = 1e-8);

            let dif2 = (plus2.parent_pose_child.matrix() - 2.0 * state.parent_pose_child.matrix()
                + minus2.parent_pose_child.matrix())
                / (STEP2 * STEP2);
            assert_relative_eq!(dif2, *state.parent_dif2_child.matrix(), epsilon = 1e-6);

            let inv_dif1 = (plus.child_pose_parent.matrix() - minus.child_pose_parent.matrix())
                / (2.0 * STEP);
            assert_relative_eq!(inv_dif1, *state.child_dif1_parent.matrix(), epsilon = 1e-8);

            let inv_dif2 = (plus2.child_pose_parent.matrix()
                - 2.0 * state.child_pose_parent.matrix()
                + minus2.child_pose_parent.matrix())
                / (STEP2 * STEP2);
            assert_relative_eq!(inv_dif2, *state.child_dif2_parent.matrix(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_unit_twist_is_constant_along_axis() {
        for kind in movable() {
            let axis = kind.axis().unwrap();
            let expected = if kind.is_rotation() {
                Vector6::new(0.0, 0.0, 0.0, axis.x, axis.y, axis.z)
            } else {
                Vector6::new(axis.x, axis.y, axis.z, 0.0, 0.0, 0.0)
            };
            for q in [-2.0, 0.0, 0.4, FRAC_PI_2] {
                let state = kind.local_state(q).unwrap();
                assert_relative_eq!(state.parent_twist_child.unhat(), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rotation_matches_pose_helpers() {
        let q = 0.6;
        let cases = [
            (JointKind::RotateX, Pose::rotation_x(q)),
            (JointKind::RotateY, Pose::rotation_y(q)),
            (JointKind::RotateZ, Pose::rotation_z(q)),
        ];
        for (kind, expected) in cases {
            let state = kind.local_state(q).unwrap();
            assert_relative_eq!(
                *state.parent_pose_child.matrix(),
                *expected.matrix(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for kind in JointKind::ALL {
            assert_eq!(kind.to_string().parse::<JointKind>().unwrap(), kind);
        }
        let err = "ball".parse::<JointKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownJointKind { ref name } if name == "ball"));
        assert_eq!(err.to_string(), "Unknown joint kind: ball");
    }
}
