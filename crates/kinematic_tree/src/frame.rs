//! Frames and the arena that owns them
//!
//! A [`Frame`] holds its pose relative to its parent, the analytic local
//! derivatives of that pose, and cached world-space state. Frames live in a
//! [`FrameArena`] and refer to each other by [`FrameId`]. A parent is always
//! inserted before its children, so every id's parent has a smaller index and
//! walking up the parent chain always terminates at the root.
//!
//! The differentiation queries on [`FrameArena`] apply the chain rule along
//! that parent chain. Each joint's local transform depends on exactly one
//! coordinate, so a query either hits the frame that owns the coordinate and
//! differentiates its local factor, or passes the parent's partial through the
//! frame's constant local factor.

use nalgebra::Vector3;

use crate::body::Inertia;
use crate::joint::JointKind;
use crate::pose::Pose;
use crate::twist::Twist;

/// Stable handle to a frame inside a [`FrameArena`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameId(usize);

impl FrameId {
    /// Position of the frame in its arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the kinematic tree
#[derive(Clone, Debug)]
pub struct Frame {
    name: String,
    kind: JointKind,
    inertia: Option<Inertia>,
    parent: Option<FrameId>,
    children: Vec<FrameId>,

    parent_pose_child: Pose,
    child_pose_parent: Pose,
    parent_dif1_child: Twist,
    parent_dif2_child: Twist,
    child_dif1_parent: Twist,
    child_dif2_parent: Twist,
    parent_twist_child: Twist,

    world_pose_child: Pose,
    world_twist_child: Twist,

    q: f64,
    q_dot: f64,
}

impl Frame {
    fn with_kind(kind: JointKind, parent_pose_child: Pose) -> Self {
        Self {
            name: String::new(),
            kind,
            inertia: None,
            parent: None,
            children: Vec::new(),
            parent_pose_child,
            child_pose_parent: parent_pose_child.inv(),
            parent_dif1_child: Twist::zeros(),
            parent_dif2_child: Twist::zeros(),
            child_dif1_parent: Twist::zeros(),
            child_dif2_parent: Twist::zeros(),
            parent_twist_child: Twist::zeros(),
            world_pose_child: Pose::identity(),
            world_twist_child: Twist::zeros(),
            q: 0.0,
            q_dot: 0.0,
        }
    }

    /// A zero-DOF frame at a constant pose relative to its parent
    pub fn fixed(parent_pose_child: Pose) -> Self {
        Self::with_kind(JointKind::Fixed, parent_pose_child)
    }

    /// A zero-DOF frame offset from its parent by a pure translation
    pub fn from_translation(translation: &Vector3<f64>) -> Self {
        Self::fixed(Pose::from_translation(translation))
    }

    /// A joint primitive at `q = 0`, `q_dot = 0`
    pub fn joint(kind: JointKind) -> Self {
        Self::joint_with_state(kind, 0.0, 0.0)
    }

    /// A joint primitive with an initial position and rate
    ///
    /// # Example
    /// ```rust
    /// use kinematic_tree::{Frame, JointKind};
    ///
    /// let frame = Frame::joint_with_state(JointKind::TranslateX, 0.25, 1.0);
    /// assert!(!frame.is_fixed());
    /// assert_eq!(frame.parent_pose_child().translation().x, 0.25);
    /// ```
    pub fn joint_with_state(kind: JointKind, q: f64, q_dot: f64) -> Self {
        let mut frame = Self::with_kind(kind, Pose::identity());
        frame.q = q;
        frame.q_dot = q_dot;
        frame.update_local();
        frame
    }

    /// A fixed frame carrying mass properties, see [`crate::Body`]
    pub fn body(parent_pose_child: Pose, inertia: Inertia) -> Self {
        let mut frame = Self::fixed(parent_pose_child);
        frame.inertia = Some(inertia);
        frame
    }

    /// Recompute the local pose and its derivatives from `q`; no-op when fixed
    pub fn update_local(&mut self) {
        let Some(state) = self.kind.local_state(self.q) else {
            return;
        };
        self.parent_pose_child = state.parent_pose_child;
        self.child_pose_parent = state.child_pose_parent;
        self.parent_dif1_child = state.parent_dif1_child;
        self.parent_dif2_child = state.parent_dif2_child;
        self.child_dif1_parent = state.child_dif1_parent;
        self.child_dif2_parent = state.child_dif2_parent;
        self.parent_twist_child = state.parent_twist_child;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    /// Whether this frame contributes no degree of freedom
    pub fn is_fixed(&self) -> bool {
        self.kind.is_fixed()
    }

    pub fn inertia(&self) -> Option<&Inertia> {
        self.inertia.as_ref()
    }

    /// Parent id, `None` only for the root
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    /// Child ids in insertion order
    pub fn children(&self) -> &[FrameId] {
        &self.children
    }

    /// Generalized coordinate
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Generalized rate
    pub fn q_dot(&self) -> f64 {
        self.q_dot
    }

    /// Set the coordinate; takes effect on the next update
    pub fn set_q(&mut self, q: f64) {
        self.q = q;
    }

    /// Set the rate; takes effect on the next update
    pub fn set_q_dot(&mut self, q_dot: f64) {
        self.q_dot = q_dot;
    }

    pub fn parent_pose_child(&self) -> &Pose {
        &self.parent_pose_child
    }

    pub fn child_pose_parent(&self) -> &Pose {
        &self.child_pose_parent
    }

    pub fn parent_dif1_child(&self) -> &Twist {
        &self.parent_dif1_child
    }

    pub fn parent_dif2_child(&self) -> &Twist {
        &self.parent_dif2_child
    }

    pub fn child_dif1_parent(&self) -> &Twist {
        &self.child_dif1_parent
    }

    pub fn child_dif2_parent(&self) -> &Twist {
        &self.child_dif2_parent
    }

    /// Unit joint velocity, zero for fixed frames
    pub fn parent_twist_child(&self) -> &Twist {
        &self.parent_twist_child
    }

    /// Cached world pose as of the last update
    pub fn world_pose(&self) -> &Pose {
        &self.world_pose_child
    }

    /// Cached world twist (expressed in this frame) as of the last update
    pub fn world_twist(&self) -> &Twist {
        &self.world_twist_child
    }

    /// Derivative of `P⁻¹ · T · P` with respect to this frame's coordinate,
    /// where `T` does not depend on it
    fn differentiate_transport(&self, twist: Twist) -> Twist {
        self.child_dif1_parent * twist * self.parent_pose_child
            + self.child_pose_parent * twist * self.parent_dif1_child
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame '{}' ({}", self.name, self.kind)?;
        if !self.is_fixed() {
            write!(f, ", q: {}, q_dot: {}", self.q, self.q_dot)?;
        }
        match self.parent {
            Some(parent) => write!(f, ", parent: {parent})"),
            None => write!(f, ", root)"),
        }
    }
}

/// Contiguous owner of every frame in a tree
///
/// Arenas are built and grown only by [`crate::KinematicTree`], which keeps
/// every cached world state current; outside code gets shared access.
///
/// ```compile_fail
/// use kinematic_tree::{Frame, FrameArena, Pose};
///
/// let _ = FrameArena::new(Frame::fixed(Pose::identity()));
/// ```
///
/// ```compile_fail
/// use kinematic_tree::KinematicTree;
///
/// let tree = KinematicTree::new();
/// let mut arena = tree.frames().clone();
/// arena.update_from(arena.root());
/// ```
#[derive(Clone, Debug)]
pub struct FrameArena {
    frames: Vec<Frame>,
}

impl FrameArena {
    /// Create an arena holding only `root`, and bring the root up to date
    pub(crate) fn new(root: Frame) -> Self {
        let mut arena = Self { frames: vec![root] };
        arena.frames[0].parent = None;
        arena.frames[0].children.clear();
        arena.update();
        arena
    }

    pub fn root(&self) -> FrameId {
        FrameId(0)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false: an arena owns at least its root
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(id.0)
    }

    /// Frames with their ids, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().enumerate().map(|(i, f)| (FrameId(i), f))
    }

    /// Attach `frame` under `parent` and bring the new frame up to date
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this arena.
    pub(crate) fn attach(&mut self, parent: FrameId, mut frame: Frame) -> FrameId {
        assert!(parent.0 < self.frames.len(), "parent {parent} out of range");
        let id = FrameId(self.frames.len());
        frame.parent = Some(parent);
        frame.children.clear();
        self.frames.push(frame);
        self.frames[parent.0].children.push(id);
        self.update_from(id);
        id
    }

    /// `id` followed by each of its ancestors up to the root
    pub fn ancestry(&self, id: FrameId) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(Some(id), move |current| self[*current].parent)
    }

    /// Whether `ancestor` is `id` itself or lies on its parent chain
    pub fn is_ancestor(&self, ancestor: FrameId, id: FrameId) -> bool {
        ancestor <= id && self.ancestry(id).any(|a| a == ancestor)
    }

    /// Refresh every frame's local and world state, parents before children
    pub fn update(&mut self) {
        tracing::trace!(frames = self.frames.len(), "updating kinematic tree");
        self.update_from(self.root());
    }

    /// Refresh `id` and its subtree; the parent of `id` must be current
    pub(crate) fn update_from(&mut self, id: FrameId) {
        let parent_state = self.frames[id.0].parent.map(|p| {
            let parent = &self.frames[p.0];
            (parent.world_pose_child, parent.world_twist_child)
        });

        let frame = &mut self.frames[id.0];
        frame.update_local();
        match parent_state {
            None => {
                frame.world_pose_child = frame.parent_pose_child;
                frame.world_twist_child = Twist::zeros();
            }
            Some((world_pose_parent, world_twist_parent)) => {
                frame.world_pose_child = world_pose_parent * frame.parent_pose_child;
                let transported =
                    frame.child_pose_parent * world_twist_parent * frame.parent_pose_child;
                frame.world_twist_child = if frame.is_fixed() {
                    transported
                } else {
                    transported + frame.parent_twist_child * frame.q_dot
                };
            }
        }

        for k in 0..self.frames[id.0].children.len() {
            let child = self.frames[id.0].children[k];
            self.update_from(child);
        }
    }

    /// `∂(world pose of frame)/∂q_i`
    pub fn par_pose_q(&self, frame: FrameId, i: FrameId) -> Twist {
        let f = &self[frame];
        let Some(parent) = f.parent else {
            return Twist::zeros();
        };
        if i == frame {
            self[parent].world_pose_child * f.parent_dif1_child
        } else {
            self.par_pose_q(parent, i) * f.parent_pose_child
        }
    }

    /// `∂²(world pose of frame)/∂q_i∂q_j`
    pub fn par2_pose_qq(&self, frame: FrameId, i: FrameId, j: FrameId) -> Twist {
        let f = &self[frame];
        let Some(parent) = f.parent else {
            return Twist::zeros();
        };
        match (i == frame, j == frame) {
            (true, true) => self[parent].world_pose_child * f.parent_dif2_child,
            (true, false) => self.par_pose_q(parent, j) * f.parent_dif1_child,
            (false, true) => self.par_pose_q(parent, i) * f.parent_dif1_child,
            (false, false) => self.par2_pose_qq(parent, i, j) * f.parent_pose_child,
        }
    }

    /// `∂(world twist of frame)/∂q_i`
    pub fn par_twist_q(&self, frame: FrameId, i: FrameId) -> Twist {
        let f = &self[frame];
        let Some(parent) = f.parent else {
            return Twist::zeros();
        };
        if i == frame {
            f.differentiate_transport(self[parent].world_twist_child)
        } else {
            f.child_pose_parent * self.par_twist_q(parent, i) * f.parent_pose_child
        }
    }

    /// `∂²(world twist of frame)/∂q_i∂q_j`
    pub fn par2_twist_qq(&self, frame: FrameId, i: FrameId, j: FrameId) -> Twist {
        let f = &self[frame];
        let Some(parent) = f.parent else {
            return Twist::zeros();
        };
        match (i == frame, j == frame) {
            (true, true) => {
                let twist = self[parent].world_twist_child;
                f.child_dif2_parent * twist * f.parent_pose_child
                    + (f.child_dif1_parent * twist * f.parent_dif1_child) * 2.0
                    + f.child_pose_parent * twist * f.parent_dif2_child
            }
            (true, false) => f.differentiate_transport(self.par_twist_q(parent, j)),
            (false, true) => f.differentiate_transport(self.par_twist_q(parent, i)),
            (false, false) => {
                f.child_pose_parent * self.par2_twist_qq(parent, i, j) * f.parent_pose_child
            }
        }
    }

    /// `∂(world twist of frame)/∂q_dot_i`, one Jacobian column in hat form
    pub fn par_twist_qdot(&self, frame: FrameId, i: FrameId) -> Twist {
        let f = &self[frame];
        let Some(parent) = f.parent else {
            return Twist::zeros();
        };
        if i == frame {
            f.parent_twist_child
        } else {
            f.child_pose_parent * self.par_twist_qdot(parent, i) * f.parent_pose_child
        }
    }

    /// `∂²(world twist of frame)/∂q_dot_i∂q_dot_j`
    ///
    /// Always zero: the world twist is linear in every rate.
    pub fn par2_twist_qdot_qdot(&self, _frame: FrameId, _i: FrameId, _j: FrameId) -> Twist {
        Twist::zeros()
    }

    /// `∂²(world twist of frame)/∂q_i∂q_dot_j`
    pub fn par2_twist_q_qdot(
        &self,
        frame: FrameId,
        q_frame: FrameId,
        qdot_frame: FrameId,
    ) -> Twist {
        let f = &self[frame];
        let Some(parent) = f.parent else {
            return Twist::zeros();
        };
        if q_frame == frame {
            f.differentiate_transport(self.par_twist_qdot(parent, qdot_frame))
        } else if qdot_frame == frame {
            // The unit joint twist does not depend on any coordinate.
            Twist::zeros()
        } else {
            f.child_pose_parent * self.par2_twist_q_qdot(parent, q_frame, qdot_frame)
                * f.parent_pose_child
        }
    }
}

impl std::ops::Index<FrameId> for FrameArena {
    type Output = Frame;

    fn index(&self, id: FrameId) -> &Frame {
        &self.frames[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector6;
    use std::f64::consts::FRAC_PI_2;

    /// root -> shoulder (Rz) -> link (fixed +x) -> elbow (Ry) -> tip (fixed +x)
    fn arm() -> (FrameArena, [FrameId; 4]) {
        let mut arena = FrameArena::new(Frame::fixed(Pose::identity()));
        let root = arena.root();
        let shoulder = arena.attach(root, Frame::joint(JointKind::RotateZ));
        let link = arena.attach(shoulder, Frame::from_translation(&Vector3::new(1.0, 0.0, 0.0)));
        let elbow = arena.attach(link, Frame::joint(JointKind::RotateY));
        let tip = arena.attach(elbow, Frame::from_translation(&Vector3::new(0.5, 0.0, 0.0)));
        (arena, [shoulder, link, elbow, tip])
    }

    fn set_state(arena: &mut FrameArena, id: FrameId, q: f64, q_dot: f64) {
        let frame = arena.get_mut(id).unwrap();
        frame.set_q(q);
        frame.set_q_dot(q_dot);
    }

    #[test]
    fn test_attach_links_parent_and_children() {
        let (arena, [shoulder, link, elbow, tip]) = arm();
        assert_eq!(arena.len(), 5);
        assert_eq!(arena[shoulder].parent(), Some(arena.root()));
        assert_eq!(arena[arena.root()].children(), &[shoulder]);
        assert_eq!(arena[link].children(), &[elbow]);
        assert_eq!(arena[tip].children(), &[] as &[FrameId]);
        assert!(arena[arena.root()].parent().is_none());
    }

    #[test]
    fn test_ancestry_reaches_root() {
        let (arena, [shoulder, link, elbow, tip]) = arm();
        let chain: Vec<_> = arena.ancestry(tip).collect();
        assert_eq!(chain, vec![tip, elbow, link, shoulder, arena.root()]);
        assert!(arena.is_ancestor(shoulder, tip));
        assert!(arena.is_ancestor(tip, tip));
        assert!(!arena.is_ancestor(tip, shoulder));
    }

    #[test]
    fn test_update_world_pose() {
        let (mut arena, [shoulder, _, elbow, tip]) = arm();
        set_state(&mut arena, shoulder, FRAC_PI_2, 0.0);
        set_state(&mut arena, elbow, FRAC_PI_2, 0.0);
        arena.update();

        // Shoulder swings the arm onto +y; the elbow then pitches the
        // forearm from +x (of the elbow frame, now +y) down to -z.
        let tip_pose = arena[tip].world_pose();
        assert_relative_eq!(tip_pose.translation(), Vector3::new(0.0, 1.0, -0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_world_twist_of_spinning_joint() {
        let (mut arena, [shoulder, link, _, tip]) = arm();
        set_state(&mut arena, shoulder, 0.0, 2.0);
        arena.update();

        // Body twist of the link: angular 2 about z, origin at (1, 0, 0)
        // moving with 2 along +y.
        let twist = arena[link].world_twist().unhat();
        assert_relative_eq!(twist, Vector6::new(0.0, 2.0, 0.0, 0.0, 0.0, 2.0), epsilon = 1e-12);

        let tip_twist = arena[tip].world_twist().unhat();
        assert_relative_eq!(
            tip_twist,
            Vector6::new(0.0, 3.0, 0.0, 0.0, 0.0, 2.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_root_is_static() {
        let (arena, _) = arm();
        let root = arena.root();
        assert_eq!(*arena[root].world_pose(), Pose::identity());
        assert!(arena[root].world_twist().is_zero(0.0));
        assert!(arena.par_pose_q(root, root).is_zero(0.0));
        assert!(arena.par_twist_qdot(root, root).is_zero(0.0));
    }

    #[test]
    fn test_partials_vanish_for_non_ancestors() {
        let (mut arena, [shoulder, link, elbow, _]) = arm();
        set_state(&mut arena, shoulder, 0.3, 0.5);
        set_state(&mut arena, elbow, -0.2, 1.5);
        arena.update();

        assert!(arena.par_pose_q(link, elbow).is_zero(0.0));
        assert!(arena.par_twist_q(link, elbow).is_zero(0.0));
        assert!(arena.par_twist_qdot(shoulder, elbow).is_zero(0.0));
        assert!(arena.par2_pose_qq(link, shoulder, elbow).is_zero(0.0));
        assert!(arena.par2_twist_q_qdot(link, shoulder, elbow).is_zero(0.0));
    }

    #[test]
    fn test_par_twist_qdot_is_unit_twist_at_joint() {
        let (arena, [shoulder, _, elbow, _]) = arm();
        assert_eq!(
            arena.par_twist_qdot(shoulder, shoulder),
            *arena[shoulder].parent_twist_child()
        );
        assert_eq!(
            arena.par_twist_qdot(elbow, elbow).unhat(),
            Vector6::new(0.0, 0.0, 0.0, 0.0, 1.0, 0.0)
        );
    }

    #[test]
    fn test_second_rate_partial_is_zero() {
        let (arena, [shoulder, _, elbow, tip]) = arm();
        assert!(arena.par2_twist_qdot_qdot(tip, shoulder, elbow).is_zero(0.0));
    }

    #[test]
    fn test_mixed_partial_zero_on_own_rate_branch() {
        let (mut arena, [shoulder, _, elbow, _]) = arm();
        set_state(&mut arena, shoulder, 0.4, 1.0);
        arena.update();
        assert!(arena.par2_twist_q_qdot(elbow, shoulder, elbow).is_zero(0.0));
    }

    #[test]
    fn test_display() {
        let (arena, [shoulder, link, _, _]) = arm();
        let shown = arena[shoulder].to_string();
        assert!(shown.contains("rotate_z"));
        assert!(shown.contains("q: 0"));
        assert!(arena[link].to_string().contains("fixed"));
        assert!(arena[arena.root()].to_string().contains("root"));
    }
}
