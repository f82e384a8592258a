use nalgebra::{
    Isometry3, Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3, Vector4,
};

use crate::{Error, Result};

/// Tolerance used when validating the rigid-transform invariant
const RIGID_TOLERANCE: f64 = 1.0e-9;

/// Axes shorter than this are treated as degenerate by [`Pose::from_axis`]
const AXIS_EPSILON: f64 = 1.0e-12;

/// Below this cross-product norm the default seed is considered parallel
const PARALLEL_EPSILON: f64 = 1.0e-6;

/// A rigid transform between two coordinate frames (an element of SE(3))
///
/// Stored as a 4×4 homogeneous matrix whose top-left 3×3 block is a proper
/// rotation and whose bottom row is `(0, 0, 0, 1)`. All operations return new
/// values; `Pose` is `Copy`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose(Matrix4<f64>);

impl Pose {
    /// The identity transform
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Build a pose from a rotation matrix and a translation
    ///
    /// The rotation is not checked; callers must pass an orthonormal matrix.
    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut pose = Self::identity();
        pose.set_rotation_matrix(rotation);
        pose.set_translation(translation);
        pose
    }

    /// Build a pure translation
    pub fn from_translation(translation: &Vector3<f64>) -> Self {
        Self::from_parts(&Matrix3::identity(), translation)
    }

    /// Validate and wrap a homogeneous matrix
    ///
    /// # Errors
    /// Returns [`Error::NotRigid`] if the bottom row is not `(0, 0, 0, 1)` or
    /// the rotation block is not orthonormal with determinant `+1`.
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{Matrix4, Pose};
    ///
    /// assert!(Pose::try_from_matrix(Matrix4::identity()).is_ok());
    /// assert!(Pose::try_from_matrix(Matrix4::zeros()).is_err());
    /// ```
    pub fn try_from_matrix(matrix: Matrix4<f64>) -> Result<Self> {
        let bottom = matrix.fixed_view::<1, 4>(3, 0);
        let expected_bottom = nalgebra::RowVector4::new(0.0, 0.0, 0.0, 1.0);
        if (bottom - expected_bottom).amax() > RIGID_TOLERANCE {
            return Err(Error::NotRigid {
                message: format!("bottom row is {bottom}"),
            });
        }

        let rotation = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).amax();
        if orthogonality > RIGID_TOLERANCE {
            return Err(Error::NotRigid {
                message: format!("rotation block is not orthonormal (error {orthogonality:e})"),
            });
        }
        let determinant = rotation.determinant();
        if (determinant - 1.0).abs() > RIGID_TOLERANCE {
            return Err(Error::NotRigid {
                message: format!("rotation determinant is {determinant}"),
            });
        }

        Ok(Self(matrix))
    }

    /// Elementary rotation about the x-axis
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut pose = Self::identity();
        pose.0[(1, 1)] = c;
        pose.0[(1, 2)] = -s;
        pose.0[(2, 1)] = s;
        pose.0[(2, 2)] = c;
        pose
    }

    /// Elementary rotation about the y-axis
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut pose = Self::identity();
        pose.0[(0, 0)] = c;
        pose.0[(0, 2)] = s;
        pose.0[(2, 0)] = -s;
        pose.0[(2, 2)] = c;
        pose
    }

    /// Elementary rotation about the z-axis
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut pose = Self::identity();
        pose.0[(0, 0)] = c;
        pose.0[(0, 1)] = -s;
        pose.0[(1, 0)] = s;
        pose.0[(1, 1)] = c;
        pose
    }

    /// Build a pose whose z-axis points along `axis`
    ///
    /// The x- and y-axes are completed from the seed `(1, 0, 0)`, falling back
    /// to `(0, 1, 0)` when the axis is (nearly) parallel to it. A degenerate
    /// axis (norm ≤ 1e-12) yields the identity.
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{Pose, Vector3};
    ///
    /// let pose = Pose::from_axis(&Vector3::new(0.0, 0.0, 2.0));
    /// assert_eq!(pose, Pose::identity());
    /// ```
    pub fn from_axis(axis: &Vector3<f64>) -> Self {
        let norm = axis.norm();
        if norm <= AXIS_EPSILON {
            return Self::identity();
        }

        let z_axis = axis / norm;
        let seeded = z_axis.cross(&Vector3::x());
        let (x_axis, y_axis) = if seeded.norm() > PARALLEL_EPSILON {
            let y_axis = seeded.normalize();
            (y_axis.cross(&z_axis), y_axis)
        } else {
            let x_axis = Vector3::y().cross(&z_axis).normalize();
            (x_axis, z_axis.cross(&x_axis))
        };

        let rotation = Matrix3::from_columns(&[x_axis, y_axis, z_axis]);
        Self::from_parts(&rotation, &Vector3::zeros())
    }

    /// Underlying homogeneous matrix
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// Read a single cell of the homogeneous matrix
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[(row, col)]
    }

    /// Overwrite a single cell; only joint primitives use this
    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.0[(row, col)] = value;
    }

    /// Rigid composition `self · other`
    pub fn multiply(&self, other: &Pose) -> Pose {
        *self * *other
    }

    /// Inverse transform: rotation `Rᵀ`, translation `-Rᵀ·t`
    pub fn inv(&self) -> Pose {
        let rotation = self.rotation_matrix().transpose();
        let translation = -(rotation * self.translation());
        Self::from_parts(&rotation, &translation)
    }

    /// Inverse of the rotation alone, with zero translation
    ///
    /// Right-multiplying a pose derivative by this re-expresses its rotational
    /// block as a world-frame angular velocity generator.
    pub fn rotation_inv(&self) -> Pose {
        Self::from_parts(&self.rotation_matrix().transpose(), &Vector3::zeros())
    }

    /// Apply the rigid map to a point (rotate then translate)
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation_matrix() * point + self.translation()
    }

    /// Apply the homogeneous matrix to a 4-vector
    pub fn transform_homogeneous(&self, vector: &Vector4<f64>) -> Vector4<f64> {
        self.0 * vector
    }

    /// Right-compose with a pure translation, `self · Trans(v)`
    pub fn translate(&self, translation: &Vector3<f64>) -> Pose {
        *self * Pose::from_translation(translation)
    }

    /// Add `v` to the translation column, `Trans(v) · self`
    pub fn shift(&self, translation: &Vector3<f64>) -> Pose {
        let mut result = *self;
        result.set_translation(&(self.translation() + translation));
        result
    }

    /// Rotate about this pose's own x-axis, `self · Rx(angle)`
    pub fn rotate_by_x(&self, angle: f64) -> Pose {
        *self * Pose::rotation_x(angle)
    }

    /// Rotate about this pose's own y-axis, `self · Ry(angle)`
    pub fn rotate_by_y(&self, angle: f64) -> Pose {
        *self * Pose::rotation_y(angle)
    }

    /// Rotate about this pose's own z-axis, `self · Rz(angle)`
    pub fn rotate_by_z(&self, angle: f64) -> Pose {
        *self * Pose::rotation_z(angle)
    }

    /// Similarity transform `new_basis⁻¹ · self · new_basis`
    pub fn change_basis(&self, new_basis: &Pose) -> Pose {
        new_basis.inv() * *self * *new_basis
    }

    /// Fourth column of the homogeneous matrix, `[x, y, z, 1]`
    pub fn location(&self) -> Vector4<f64> {
        self.0.column(3).into_owned()
    }

    /// Translation component `[x, y, z]`
    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Set the translation component
    pub fn set_translation(&mut self, translation: &Vector3<f64>) {
        self.0.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    }

    /// Set the translation from a homogeneous location; the `w` entry is ignored
    pub fn set_location(&mut self, location: &Vector4<f64>) {
        self.set_translation(&location.xyz());
    }

    /// Rotation component as a 3×3 matrix
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Set the rotation component
    pub fn set_rotation_matrix(&mut self, rotation: &Matrix3<f64>) {
        self.0.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    }

    /// Convert to an `Isometry3`
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let rotation = Rotation3::from_matrix_unchecked(self.rotation_matrix());
        Isometry3::from_parts(
            Translation3::from(self.translation()),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }

    /// The homogeneous matrix as a flat column-major array (Eigen's layout)
    pub fn to_column_major(&self) -> [f64; 16] {
        let mut result = [0.0; 16];
        result.copy_from_slice(self.0.as_slice());
        result
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(isometry: Isometry3<f64>) -> Self {
        Self(isometry.to_homogeneous())
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose(self.0 * rhs.0)
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.translation();
        write!(f, "Pose(t = [{:.6}, {:.6}, {:.6}])", t.x, t.y, t.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn sample_pose() -> Pose {
        Pose::identity()
            .rotate_by_z(0.3)
            .rotate_by_y(-1.1)
            .rotate_by_x(0.7)
            .shift(&Vector3::new(1.0, -2.0, 0.5))
    }

    #[test]
    fn test_inverse_is_two_sided() {
        let pose = sample_pose();
        let identity = Matrix4::identity();
        assert_relative_eq!(*(pose.inv() * pose).matrix(), identity, epsilon = 1e-12);
        assert_relative_eq!(*(pose * pose.inv()).matrix(), identity, epsilon = 1e-12);
    }

    #[test]
    fn test_elementary_rotations() {
        let rz = Pose::rotation_z(FRAC_PI_2);
        let rotated = rz.transform_point(&Vector3::x());
        assert_relative_eq!(rotated, Vector3::y(), epsilon = 1e-12);

        let rx = Pose::rotation_x(FRAC_PI_2);
        assert_relative_eq!(rx.transform_point(&Vector3::y()), Vector3::z(), epsilon = 1e-12);

        let ry = Pose::rotation_y(FRAC_PI_2);
        assert_relative_eq!(ry.transform_point(&Vector3::z()), Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_translate_composes_on_the_right() {
        let pose = Pose::rotation_z(FRAC_PI_2).translate(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(pose.translation(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);

        let shifted = Pose::rotation_z(FRAC_PI_2).shift(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(shifted.translation(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_transform_homogeneous_matches_point() {
        let pose = sample_pose();
        let point = Vector3::new(0.2, 0.4, -0.6);
        let homogeneous = pose.transform_homogeneous(&point.push(1.0));
        assert_relative_eq!(homogeneous.xyz(), pose.transform_point(&point), epsilon = 1e-12);
        assert_relative_eq!(homogeneous.w, 1.0);
    }

    #[test]
    fn test_change_basis() {
        let pose = Pose::rotation_z(FRAC_PI_4);
        let basis = Pose::from_translation(&Vector3::new(1.0, 0.0, 0.0));
        let changed = pose.change_basis(&basis);
        let expected = basis.inv() * pose * basis;
        assert_relative_eq!(*changed.matrix(), *expected.matrix(), epsilon = 1e-12);
        // Rotation is invariant under a pure-translation basis change
        assert_relative_eq!(changed.rotation_matrix(), pose.rotation_matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_location_and_setters() {
        let mut pose = Pose::identity();
        pose.set_location(&Vector4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(pose.location(), Vector4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(pose.translation(), Vector3::new(1.0, 2.0, 3.0));

        let rotation = Pose::rotation_x(0.4).rotation_matrix();
        pose.set_rotation_matrix(&rotation);
        assert_eq!(pose.rotation_matrix(), rotation);
        assert!(Pose::try_from_matrix(*pose.matrix()).is_ok());
    }

    #[test]
    fn test_from_axis_is_orthonormal() {
        let axes = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-3.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.3, -0.2, 0.9),
            Vector3::new(1.0, 1.0e-9, 0.0),
        ];
        for axis in axes {
            let pose = Pose::from_axis(&axis);
            assert!(
                Pose::try_from_matrix(*pose.matrix()).is_ok(),
                "axis {axis:?} produced a non-rigid pose"
            );
            let z = pose.rotation_matrix().column(2).into_owned();
            assert_relative_eq!(z, axis.normalize(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_from_axis_degenerate() {
        assert_eq!(Pose::from_axis(&Vector3::zeros()), Pose::identity());
        assert_eq!(
            Pose::from_axis(&Vector3::new(1.0e-13, 0.0, 0.0)),
            Pose::identity()
        );
    }

    #[test]
    fn test_try_from_matrix_rejects_scaling() {
        let mut matrix = Matrix4::identity();
        matrix[(0, 0)] = 2.0;
        let err = Pose::try_from_matrix(matrix).unwrap_err();
        assert!(err.to_string().contains("orthonormal"));

        let mut reflection = Matrix4::identity();
        reflection[(2, 2)] = -1.0;
        let err = Pose::try_from_matrix(reflection).unwrap_err();
        assert!(err.to_string().contains("determinant"));
    }

    #[test]
    fn test_isometry_round_trip() {
        let pose = sample_pose();
        let back = Pose::from(pose.to_isometry());
        assert_relative_eq!(*back.matrix(), *pose.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn test_column_major_layout() {
        let pose = Pose::from_translation(&Vector3::new(1.0, 2.0, 3.0));
        let data = pose.to_column_major();
        assert_eq!(&data[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(data[15], 1.0);
        assert_eq!(data[0], 1.0);
    }
}
