//! Pose velocity differentiation.
//!
//! Derives per-joint linear and angular velocities from two world poses one
//! frame apart. The root joint is not differentiated: it reports the root
//! motion carried by the current pose.

use crate::error::{PoseError, Result};
use crate::pose::Pose;
use crate::skeleton::{JointId, Skeleton};
use glam::{Quat, Vec3};

/// Converts a rotation into a rotation vector (axis scaled by angle in radians).
///
/// Takes the shortest arc, so `q` and `-q` give the same result. Identity
/// maps to zero.
pub fn angular_displacement(rotation: Quat) -> Vec3 {
    let q = rotation.normalize();
    let q = if q.w < 0.0 { -q } else { q };
    let axis = Vec3::new(q.x, q.y, q.z);
    let magnitude = axis.length();
    if magnitude == 0.0 {
        return Vec3::ZERO;
    }
    let angle = 2.0 * magnitude.min(1.0).asin();
    axis * (angle / magnitude)
}

/// Computes per-joint velocities between two world poses.
///
/// `velocities` and `angular_velocities` must be as long as the poses.
/// Joint 0 takes the root motion of `current`.
pub fn differentiate(
    current: &Pose,
    previous: &Pose,
    dt: f32,
    velocities: &mut [Vec3],
    angular_velocities: &mut [Vec3],
) -> Result<()> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(PoseError::InvalidDeltaTime(dt));
    }
    PoseError::check_len(current.len(), previous.len())?;
    PoseError::check_len(current.len(), velocities.len())?;
    PoseError::check_len(current.len(), angular_velocities.len())?;

    let frames = current.transforms().iter().zip(previous.transforms());
    let outputs = velocities.iter_mut().zip(angular_velocities.iter_mut());
    for (i, ((now, before), (linear, angular))) in frames.zip(outputs).enumerate() {
        if i == 0 {
            *linear = current.velocity;
            *angular = current.angular_velocity;
        } else {
            *linear = (now.translation - before.translation) / dt;
            *angular = angular_displacement(now.rotation * before.rotation.inverse()) / dt;
        }
    }
    Ok(())
}

/// Tracks velocities of a local pose stream frame by frame.
///
/// Keeps the last two world poses and differentiates them on every
/// [`track`](Self::track). Root motion is read from the local pose.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    previous: Pose,
    current: Pose,
    local: Pose,
    velocities: Vec<Vec3>,
    angular_velocities: Vec<Vec3>,
    primed: bool,
}

impl VelocityTracker {
    /// Creates a tracker sized to the skeleton.
    pub fn new(skeleton: &Skeleton) -> Self {
        let count = skeleton.joint_count();
        Self {
            previous: Pose::identity(count),
            current: Pose::identity(count),
            local: Pose::identity(count),
            velocities: vec![Vec3::ZERO; count],
            angular_velocities: vec![Vec3::ZERO; count],
            primed: false,
        }
    }

    /// Reads a new frame and updates the velocities.
    ///
    /// Returns `false` when the velocities were not updated: on the first
    /// frame after creation or [`reset`](Self::reset), and when `dt` is not
    /// positive (the frame is ignored entirely).
    pub fn track(&mut self, skeleton: &Skeleton, local: &Pose, dt: f32) -> Result<bool> {
        PoseError::check_len(self.local.len(), local.len())?;
        if self.primed && !(dt > 0.0 && dt.is_finite()) {
            return Ok(false);
        }

        std::mem::swap(&mut self.previous, &mut self.current);
        self.current.read_world(skeleton, local)?;
        self.local.copy_from(local)?;

        if !self.primed {
            self.primed = true;
            return Ok(false);
        }
        differentiate(
            &self.current,
            &self.previous,
            dt,
            &mut self.velocities,
            &mut self.angular_velocities,
        )?;
        Ok(true)
    }

    /// Forgets the previous frame and zeroes the velocities.
    pub fn reset(&mut self) {
        self.primed = false;
        self.velocities.fill(Vec3::ZERO);
        self.angular_velocities.fill(Vec3::ZERO);
    }

    /// Per-joint linear velocities.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Per-joint angular velocities (rotation vector per second).
    pub fn angular_velocities(&self) -> &[Vec3] {
        &self.angular_velocities
    }

    /// Latest world pose.
    pub fn world_pose(&self) -> &Pose {
        &self.current
    }

    /// Latest local pose.
    pub fn local_pose(&self) -> &Pose {
        &self.local
    }

    /// Velocity changes that bring bodies moving at `current_linear` and
    /// `current_angular` to the tracked velocities.
    ///
    /// The root joint is skipped; it is driven by root motion. Iteration stops
    /// at the shortest of the tracked and given slices.
    pub fn velocity_changes<'a>(
        &'a self,
        current_linear: &'a [Vec3],
        current_angular: &'a [Vec3],
    ) -> impl Iterator<Item = (JointId, Vec3, Vec3)> + 'a {
        let tracked = self.velocities.iter().zip(&self.angular_velocities);
        let bodies = current_linear.iter().zip(current_angular);
        tracked
            .zip(bodies)
            .enumerate()
            .skip(1)
            .map(|(i, ((v, w), (body_v, body_w)))| (JointId(i as u32), *v - *body_v, *w - *body_w))
    }
}
