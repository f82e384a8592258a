//! # Kinematic Tree
//!
//! Forward kinematics and analytic differentiation for articulated trees of
//! rigid-body frames.
//!
//! Every frame in a [`KinematicTree`] owns a relative [`Pose`] to its parent.
//! Movable frames add a single generalized coordinate `q` (and rate `q_dot`)
//! through one of the closed-form joint primitives in [`JointKind`]. A single
//! [`KinematicTree::update`] pass refreshes every frame's world pose and world
//! [`Twist`], after which first- and second-order partials of pose and twist
//! can be queried for any pair of coordinates.
//!
//! ## Features
//!
//! - SE(3) poses and se(3) twists on `nalgebra` 4×4 matrices
//! - Arena-backed frame tree with stable [`FrameId`] handles
//! - Closed-form local derivatives for the six elementary joints
//! - World and body Jacobians assembled from per-frame chain-rule queries
//! - Mass/inertia views over frames through [`Body`]
//!
//! ## Example
//!
//! ```rust
//! use kinematic_tree::{Frame, JointKind, KinematicTree};
//! use nalgebra::Vector3;
//! use std::f64::consts::FRAC_PI_2;
//!
//! let mut tree = KinematicTree::new();
//! tree.add_frame("shoulder", |_| Frame::joint(JointKind::RotateZ), None)?;
//! tree.add_frame(
//!     "tip",
//!     |_| Frame::from_translation(&Vector3::new(1.0, 0.0, 0.0)),
//!     Some("shoulder"),
//! )?;
//!
//! tree.set_coordinates(&[FRAC_PI_2])?;
//! let tip = tree.world_pose("tip")?;
//! assert!((tip.translation() - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
//!
//! let jacobian = tree.jacobian("tip", None)?;
//! assert_eq!(jacobian.ncols(), 1);
//! # Ok::<(), kinematic_tree::Error>(())
//! ```

pub mod body;
pub mod frame;
pub mod joint;
pub mod pose;
pub mod tree;
pub mod twist;

pub use body::{Body, Inertia};
pub use frame::{Frame, FrameArena, FrameId};
pub use joint::{JointKind, LocalState};
pub use nalgebra::{Matrix3, Matrix4, Matrix6xX, Vector3, Vector4, Vector6};
pub use pose::Pose;
pub use tree::{KinematicTree, ROOT_FRAME_NAME};
pub use twist::Twist;

/// Common result type for this library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for kinematic tree operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No frame is registered under the requested name
    #[error("Frame not found: {name}")]
    FrameNotFound { name: String },

    /// A frame with this name already exists in the tree
    #[error("Duplicate frame name: {name}")]
    DuplicateFrame { name: String },

    /// A frame was asked to become its own parent
    #[error("Frame '{name}' cannot be its own parent")]
    SelfParent { name: String },

    /// Coordinate or rate vector does not match the tree's degrees of freedom
    #[error("Expected {expected} coordinates, got {actual}")]
    InvalidCoordinateCount { expected: usize, actual: usize },

    /// Matrix does not satisfy the rigid-transform invariant
    #[error("Not a rigid transform: {message}")]
    NotRigid { message: String },

    /// A joint kind name that matches no [`JointKind`]
    #[error("Unknown joint kind: {name}")]
    UnknownJointKind { name: String },

    /// The frame exists but carries no inertia
    #[error("Frame '{name}' is not a body")]
    NotABody { name: String },
}
