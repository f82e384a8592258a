use nalgebra::{Vector3, Vector4, Vector6};

use crate::frame::{Frame, FrameArena, FrameId};

/// Mass and principal moments of inertia about a body's own axes
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Inertia {
    pub mass: f64,
    /// `[ixx, iyy, izz]`
    pub principal: Vector3<f64>,
}

impl Inertia {
    pub fn new(mass: f64, principal: Vector3<f64>) -> Self {
        Self { mass, principal }
    }

    /// Diagonal of the 6×6 spatial inertia, `[m, m, m, ixx, iyy, izz]`
    pub fn as_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.mass,
            self.mass,
            self.mass,
            self.principal.x,
            self.principal.y,
            self.principal.z,
        )
    }
}

/// Read-only view of a frame that carries an [`Inertia`]
///
/// Positions are homogeneous world locations and velocities are
/// `[linear; angular]` body twists; every partial takes the [`FrameId`] of the
/// coordinate to differentiate by.
#[derive(Clone, Copy, Debug)]
pub struct Body<'a> {
    frames: &'a FrameArena,
    id: FrameId,
    inertia: &'a Inertia,
}

impl<'a> Body<'a> {
    /// `None` when the frame has no inertia
    pub(crate) fn new(frames: &'a FrameArena, id: FrameId) -> Option<Self> {
        let inertia = frames.get(id)?.inertia()?;
        Some(Self {
            frames,
            id,
            inertia,
        })
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn frame(&self) -> &'a Frame {
        &self.frames[self.id]
    }

    pub fn mass(&self) -> f64 {
        self.inertia.mass
    }

    pub fn inertia(&self) -> &'a Inertia {
        self.inertia
    }

    pub fn position(&self) -> Vector4<f64> {
        self.frame().world_pose().location()
    }

    pub fn par_position_q(&self, i: FrameId) -> Vector4<f64> {
        self.frames.par_pose_q(self.id, i).location()
    }

    pub fn par2_position_qq(&self, i: FrameId, j: FrameId) -> Vector4<f64> {
        self.frames.par2_pose_qq(self.id, i, j).location()
    }

    pub fn velocity(&self) -> Vector6<f64> {
        self.frame().world_twist().unhat()
    }

    pub fn par_velocity_q(&self, i: FrameId) -> Vector6<f64> {
        self.frames.par_twist_q(self.id, i).unhat()
    }

    pub fn par2_velocity_qq(&self, i: FrameId, j: FrameId) -> Vector6<f64> {
        self.frames.par2_twist_qq(self.id, i, j).unhat()
    }

    pub fn par_velocity_qdot(&self, i: FrameId) -> Vector6<f64> {
        self.frames.par_twist_qdot(self.id, i).unhat()
    }

    pub fn par2_velocity_qdot_qdot(&self, i: FrameId, j: FrameId) -> Vector6<f64> {
        self.frames.par2_twist_qdot_qdot(self.id, i, j).unhat()
    }

    pub fn par2_velocity_q_qdot(&self, i: FrameId, j: FrameId) -> Vector6<f64> {
        self.frames.par2_twist_q_qdot(self.id, i, j).unhat()
    }
}
