use std::collections::HashMap;

use nalgebra::{DVector, Matrix6xX, Vector3, Vector6};
use tracing::debug;

use crate::body::Body;
use crate::frame::{Frame, FrameArena, FrameId};
use crate::pose::Pose;
use crate::twist::Twist;
use crate::{Error, Result};

/// Name under which every tree registers its root frame
pub const ROOT_FRAME_NAME: &str = "spatial";

/// A named registry of frames plus the ordered list of generalized coordinates
///
/// The tree owns its frames through a [`FrameArena`]. Every movable frame is
/// appended to the coordinate list when it is added; that order defines the
/// layout of coordinate vectors and Jacobian columns.
#[derive(Clone, Debug)]
pub struct KinematicTree {
    frames: FrameArena,
    names: HashMap<String, FrameId>,
    coordinates: Vec<FrameId>,
}

impl KinematicTree {
    /// Create a tree holding only the root frame
    pub fn new() -> Self {
        let mut root = Frame::fixed(Pose::identity());
        root.set_name(ROOT_FRAME_NAME.to_string());
        let frames = FrameArena::new(root);
        let names = HashMap::from([(ROOT_FRAME_NAME.to_string(), frames.root())]);
        Self {
            frames,
            names,
            coordinates: Vec::new(),
        }
    }

    /// Build a frame from its parent and attach it under `name`
    ///
    /// # Arguments
    /// * `name` - Unique name of the new frame
    /// * `factory` - Builds the new frame; receives the (up to date) parent
    /// * `parent_name` - Parent to attach to, the root when `None`
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{Frame, JointKind, KinematicTree};
    ///
    /// let mut tree = KinematicTree::new();
    /// tree.add_frame("base", |_| Frame::joint(JointKind::TranslateZ), None)?;
    /// assert_eq!(tree.dof(), 1);
    /// assert!(tree.add_frame("base", |_| Frame::joint(JointKind::RotateZ), None).is_err());
    /// # Ok::<(), kinematic_tree::Error>(())
    /// ```
    pub fn add_frame<F>(
        &mut self,
        name: &str,
        factory: F,
        parent_name: Option<&str>,
    ) -> Result<FrameId>
    where
        F: FnOnce(&Frame) -> Frame,
    {
        if parent_name == Some(name) {
            return Err(Error::SelfParent {
                name: name.to_string(),
            });
        }
        if self.names.contains_key(name) {
            return Err(Error::DuplicateFrame {
                name: name.to_string(),
            });
        }
        let parent = match parent_name {
            Some(parent_name) => self.frame_id(parent_name)?,
            None => self.frames.root(),
        };

        let mut frame = factory(&self.frames[parent]);
        frame.set_name(name.to_string());
        let kind = frame.kind();
        let id = self.frames.attach(parent, frame);
        self.names.insert(name.to_string(), id);
        if !kind.is_fixed() {
            self.coordinates.push(id);
        }

        debug!(
            frame = name,
            parent = self.frames[parent].name(),
            %kind,
            dof = self.coordinates.len(),
            "added frame"
        );
        Ok(id)
    }

    /// Refresh every frame's local and world state
    pub fn update(&mut self) {
        self.frames.update();
    }

    /// Number of generalized coordinates
    pub fn dof(&self) -> usize {
        self.coordinates.len()
    }

    /// Movable frames in coordinate order
    pub fn coordinate_frames(&self) -> &[FrameId] {
        &self.coordinates
    }

    /// Names of the movable frames in coordinate order
    pub fn coordinate_names(&self) -> Vec<&str> {
        self.coordinates
            .iter()
            .map(|id| self.frames[*id].name())
            .collect()
    }

    /// Assign every coordinate in list order, then update once
    ///
    /// Nothing is assigned when the length does not match [`Self::dof`].
    pub fn set_coordinates(&mut self, q: &[f64]) -> Result<()> {
        self.check_len(q.len())?;
        for (id, value) in self.coordinates.iter().zip(q) {
            if let Some(frame) = self.frames.get_mut(*id) {
                frame.set_q(*value);
            }
        }
        debug!(?q, "set coordinates");
        self.update();
        Ok(())
    }

    /// Current coordinates in list order
    pub fn coordinates(&self) -> Vec<f64> {
        self.coordinates.iter().map(|id| self.frames[*id].q()).collect()
    }

    /// Assign every coordinate rate in list order, then update once
    pub fn set_velocities(&mut self, q_dot: &[f64]) -> Result<()> {
        self.check_len(q_dot.len())?;
        for (id, value) in self.coordinates.iter().zip(q_dot) {
            if let Some(frame) = self.frames.get_mut(*id) {
                frame.set_q_dot(*value);
            }
        }
        debug!(?q_dot, "set velocities");
        self.update();
        Ok(())
    }

    /// Current coordinate rates in list order
    pub fn velocities(&self) -> Vec<f64> {
        self.coordinates
            .iter()
            .map(|id| self.frames[*id].q_dot())
            .collect()
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.coordinates.len() {
            return Err(Error::InvalidCoordinateCount {
                expected: self.coordinates.len(),
                actual,
            });
        }
        Ok(())
    }

    pub fn frame_id(&self, name: &str) -> Result<FrameId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::FrameNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn frame(&self, name: &str) -> Result<&Frame> {
        let id = self.frame_id(name)?;
        Ok(&self.frames[id])
    }

    /// Mutable access for setting `q`/`q_dot` directly; call [`Self::update`] afterwards
    pub fn frame_mut(&mut self, name: &str) -> Result<&mut Frame> {
        let id = self.frame_id(name)?;
        self.frames.get_mut(id).ok_or_else(|| Error::FrameNotFound {
            name: name.to_string(),
        })
    }

    /// The underlying arena, for id-based queries
    pub fn frames(&self) -> &FrameArena {
        &self.frames
    }

    /// Frame names in insertion order, root first
    pub fn frame_names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|(_, frame)| frame.name())
    }

    /// World pose of a frame as of the last update
    pub fn world_pose(&self, name: &str) -> Result<Pose> {
        Ok(*self.frame(name)?.world_pose())
    }

    /// World twist of a frame (in its own coordinates) as of the last update
    pub fn world_twist(&self, name: &str) -> Result<Twist> {
        Ok(*self.frame(name)?.world_twist())
    }

    /// Mass-carrying view of a frame built with [`Frame::body`]
    pub fn body(&self, name: &str) -> Result<Body<'_>> {
        let id = self.frame_id(name)?;
        Body::new(&self.frames, id).ok_or_else(|| Error::NotABody {
            name: name.to_string(),
        })
    }

    /// World-frame velocity Jacobian of a frame, 6 × [`Self::dof`]
    ///
    /// Column `i` maps the rate of coordinate `i` to `[linear; angular]`
    /// velocity in world axes. The linear part is the velocity of the frame
    /// origin, or of `point` (given in the frame's own coordinates) when
    /// supplied.
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{Frame, JointKind, KinematicTree, Vector3};
    ///
    /// let mut tree = KinematicTree::new();
    /// tree.add_frame("slide", |_| Frame::joint(JointKind::TranslateX), None)?;
    /// let jacobian = tree.jacobian("slide", Some(&Vector3::new(0.0, 1.0, 0.0)))?;
    /// assert_eq!(jacobian[(0, 0)], 1.0);
    /// # Ok::<(), kinematic_tree::Error>(())
    /// ```
    pub fn jacobian(&self, name: &str, point: Option<&Vector3<f64>>) -> Result<Matrix6xX<f64>> {
        let id = self.frame_id(name)?;
        let world_pose = self.frames[id].world_pose();
        let rotation_inv = world_pose.rotation_inv();
        let offset = point.map(|p| world_pose.rotation_matrix() * p);

        let mut jacobian = Matrix6xX::zeros(self.dof());
        for (column, coordinate) in self.coordinates.iter().enumerate() {
            let mut twist = (self.frames.par_pose_q(id, *coordinate) * rotation_inv).unhat();
            if let Some(offset) = &offset {
                let angular = Vector3::new(twist[3], twist[4], twist[5]);
                let correction = angular.cross(offset);
                twist[0] += correction.x;
                twist[1] += correction.y;
                twist[2] += correction.z;
            }
            jacobian.set_column(column, &twist);
        }
        Ok(jacobian)
    }

    /// Velocity Jacobian of a frame expressed in the frame's own axes
    pub fn body_jacobian(&self, name: &str) -> Result<Matrix6xX<f64>> {
        let id = self.frame_id(name)?;
        let world_inv = self.frames[id].world_pose().inv();

        let mut jacobian = Matrix6xX::zeros(self.dof());
        for (column, coordinate) in self.coordinates.iter().enumerate() {
            let twist = (world_inv * self.frames.par_pose_q(id, *coordinate)).unhat();
            jacobian.set_column(column, &twist);
        }
        Ok(jacobian)
    }

    /// Generalized forces `Jᵀ · wrench` for a world-frame wrench `[force; torque]`
    /// applied at `point` of frame `name`
    pub fn generalized_force(
        &self,
        name: &str,
        point: Option<&Vector3<f64>>,
        wrench: &Vector6<f64>,
    ) -> Result<DVector<f64>> {
        Ok(self.jacobian(name, point)?.transpose() * wrench)
    }

    /// Nudge the coordinates along `gain · Jᵀ · [force; 0]` and update
    ///
    /// This is a first-order "drag" step: pulling on a point of a frame moves
    /// every ancestor joint in the direction that moves the point along `force`.
    pub fn poke(
        &mut self,
        name: &str,
        point: Option<&Vector3<f64>>,
        force: &Vector3<f64>,
        gain: f64,
    ) -> Result<()> {
        let wrench = Vector6::new(force.x, force.y, force.z, 0.0, 0.0, 0.0);
        let step = self.generalized_force(name, point, &wrench)? * gain;
        let q: Vec<f64> = self
            .coordinates()
            .iter()
            .zip(step.iter())
            .map(|(q, dq)| q + dq)
            .collect();
        debug!(frame = name, gain, "poke");
        self.set_coordinates(&q)
    }
}

impl Default for KinematicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KinematicTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "KinematicTree ({} frames, {} dof)",
            self.frames.len(),
            self.dof()
        )?;
        for (_, frame) in self.frames.iter() {
            writeln!(f, "  {frame}")?;
        }
        Ok(())
    }
}
