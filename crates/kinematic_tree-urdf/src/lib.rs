//! # URDF loading for `kinematic_tree`
//!
//! Reads a URDF robot description with `quick-xml` and replays it as a
//! sequence of [`KinematicTree::add_frame`](kinematic_tree::KinematicTree::add_frame)
//! calls. Every movable joint becomes a fixed origin frame plus a `RotateZ`
//! or `TranslateZ` frame aligned with the joint axis.
//!
//! ## Example
//!
//! ```rust
//! let tree = kinematic_tree_urdf::load_str(
//!     r#"<robot name="pendulum">
//!          <link name="base"/>
//!          <link name="bob"/>
//!          <joint name="pivot" type="continuous">
//!            <parent link="base"/>
//!            <child link="bob"/>
//!            <origin xyz="0 0 1"/>
//!            <axis xyz="0 1 0"/>
//!          </joint>
//!        </robot>"#,
//! )?;
//! assert_eq!(tree.dof(), 1);
//! assert!(tree.contains("bob_f"));
//! # Ok::<(), kinematic_tree_urdf::UrdfError>(())
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;

pub use error::{Result, UrdfError};
pub use loader::{LoaderConfig, build_tree, load_file, load_str};
pub use model::{Origin, UrdfInertial, UrdfJoint, UrdfJointType, UrdfLink, UrdfModel};
pub use parser::{parse_file, parse_str};
