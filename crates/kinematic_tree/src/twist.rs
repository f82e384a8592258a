use nalgebra::{Matrix4, Vector3, Vector4, Vector6};

use crate::pose::Pose;

/// An se(3) element in 4×4 "hat" form
///
/// The top-left 3×3 block is the skew-symmetric angular generator, rows 0–2
/// of the last column hold the linear velocity and the bottom row is zero.
/// The same representation carries pose derivatives (`∂T/∂q`), which share
/// the zero bottom row but not the skew symmetry.
///
/// Unlike [`Pose`], twists form a vector space: `+`, `-` and scaling are
/// defined. Multiplication by a pose or twist is a raw matrix product used
/// for chain-rule propagation, not a group operation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Twist(Matrix4<f64>);

impl Twist {
    /// The zero twist
    pub fn zeros() -> Self {
        Self(Matrix4::zeros())
    }

    /// Wrap an arbitrary 4×4 matrix
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }

    /// Pack `[tx, ty, tz, rx, ry, rz]` into hat form
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{Twist, Vector6};
    ///
    /// let v = Vector6::new(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
    /// assert_eq!(Twist::hat(&v).unhat(), v);
    /// ```
    pub fn hat(twist: &Vector6<f64>) -> Self {
        let mut m = Matrix4::zeros();
        m[(0, 3)] = twist[0];
        m[(1, 3)] = twist[1];
        m[(2, 3)] = twist[2];
        m[(1, 2)] = -twist[3];
        m[(2, 1)] = twist[3];
        m[(0, 2)] = twist[4];
        m[(2, 0)] = -twist[4];
        m[(0, 1)] = -twist[5];
        m[(1, 0)] = twist[5];
        Self(m)
    }

    /// Read `[tx, ty, tz, rx, ry, rz]` back out of the hat form
    pub fn unhat(&self) -> Vector6<f64> {
        let m = &self.0;
        Vector6::new(
            m[(0, 3)],
            m[(1, 3)],
            m[(2, 3)],
            m[(2, 1)],
            m[(0, 2)],
            m[(1, 0)],
        )
    }

    /// Linear part `[tx, ty, tz]`
    pub fn linear(&self) -> Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Angular part `[rx, ry, rz]`
    pub fn angular(&self) -> Vector3<f64> {
        let m = &self.0;
        Vector3::new(m[(2, 1)], m[(0, 2)], m[(1, 0)])
    }

    /// Fourth column; for a pose derivative this is the derivative of the location
    pub fn location(&self) -> Vector4<f64> {
        self.0.column(3).into_owned()
    }

    /// Underlying 4×4 matrix
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// Read a single cell
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[(row, col)]
    }

    /// Overwrite a single cell; only joint primitives use this
    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.0[(row, col)] = value;
    }

    /// Elementwise scaling
    pub fn scale(&self, value: f64) -> Twist {
        Twist(self.0 * value)
    }

    /// Whether every cell is within `tolerance` of zero
    pub fn is_zero(&self, tolerance: f64) -> bool {
        self.0.amax() <= tolerance
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self::zeros()
    }
}

impl std::ops::Add for Twist {
    type Output = Twist;

    fn add(self, rhs: Twist) -> Twist {
        Twist(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Twist {
    type Output = Twist;

    fn sub(self, rhs: Twist) -> Twist {
        Twist(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Twist {
    type Output = Twist;

    fn neg(self) -> Twist {
        Twist(-self.0)
    }
}

impl std::ops::Mul<f64> for Twist {
    type Output = Twist;

    fn mul(self, rhs: f64) -> Twist {
        self.scale(rhs)
    }
}

impl std::ops::Mul<Pose> for Twist {
    type Output = Twist;

    fn mul(self, rhs: Pose) -> Twist {
        Twist(self.0 * rhs.matrix())
    }
}

impl std::ops::Mul<Twist> for Pose {
    type Output = Twist;

    fn mul(self, rhs: Twist) -> Twist {
        Twist(self.matrix() * rhs.0)
    }
}

impl std::ops::Mul for Twist {
    type Output = Twist;

    fn mul(self, rhs: Twist) -> Twist {
        Twist(self.0 * rhs.0)
    }
}

impl std::iter::Sum for Twist {
    fn sum<I: Iterator<Item = Twist>>(iter: I) -> Twist {
        iter.fold(Twist::zeros(), |acc, t| acc + t)
    }
}
