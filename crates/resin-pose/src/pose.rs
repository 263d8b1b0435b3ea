//! Pose buffers.

use crate::error::{PoseError, Result};
use crate::skeleton::{JointId, Skeleton};
use crate::transform::Transform;
use glam::Vec3;

/// A fixed-size pose buffer.
///
/// Holds one transform per joint, in local or world space depending on its
/// owner, plus the root motion of the stream it was read from. The length is
/// fixed at creation and matches the skeleton's joint count.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    transforms: Vec<Transform>,
    /// Root linear velocity.
    pub velocity: Vec3,
    /// Root angular velocity.
    pub angular_velocity: Vec3,
}

impl Pose {
    /// Creates a pose with all identity transforms and no root motion.
    pub fn identity(joint_count: usize) -> Self {
        Self {
            transforms: vec![Transform::IDENTITY; joint_count],
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    /// Creates a pose from transforms.
    pub fn from_transforms(transforms: Vec<Transform>) -> Self {
        Self {
            transforms,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    /// Gets the transform for a joint, identity if out of range.
    pub fn get(&self, id: JointId) -> Transform {
        self.transforms
            .get(id.index())
            .copied()
            .unwrap_or(Transform::IDENTITY)
    }

    /// Sets the transform for a joint. Out of range IDs are ignored.
    pub fn set(&mut self, id: JointId, transform: Transform) {
        if let Some(t) = self.transforms.get_mut(id.index()) {
            *t = transform;
        }
    }

    /// Returns the number of joint transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Returns true if the pose is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Returns all transforms.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Returns mutable access to all transforms.
    pub fn transforms_mut(&mut self) -> &mut [Transform] {
        &mut self.transforms
    }

    /// Copies another pose of the same length into this one.
    pub fn copy_from(&mut self, source: &Pose) -> Result<()> {
        PoseError::check_len(self.len(), source.len())?;
        self.transforms.copy_from_slice(&source.transforms);
        self.velocity = source.velocity;
        self.angular_velocity = source.angular_velocity;
        Ok(())
    }

    /// Fills this pose with the world transforms of a local pose.
    ///
    /// Root motion is carried over unchanged.
    pub fn read_world(&mut self, skeleton: &Skeleton, local: &Pose) -> Result<()> {
        skeleton.compute_world(&local.transforms, &mut self.transforms)?;
        self.velocity = local.velocity;
        self.angular_velocity = local.angular_velocity;
        Ok(())
    }
}
