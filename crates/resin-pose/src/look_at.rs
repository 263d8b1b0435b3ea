//! Single-joint aim constraint.
//!
//! Rotates a joint so one of its local axes points at a target, with the
//! aim angle clamped to a configured range.

use crate::error::{PoseError, Result};
use crate::pose::Pose;
use crate::skeleton::{JointId, Skeleton};
use glam::{Quat, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Local joint axis used for aiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    /// +Z.
    #[default]
    Forward,
    /// -Z.
    Back,
    /// +Y.
    Up,
    /// -Y.
    Down,
    /// -X.
    Left,
    /// +X.
    Right,
}

impl Axis {
    /// Returns the unit vector for this axis.
    pub fn vector(self) -> Vec3 {
        match self {
            Axis::Forward => Vec3::Z,
            Axis::Back => Vec3::NEG_Z,
            Axis::Up => Vec3::Y,
            Axis::Down => Vec3::NEG_Y,
            Axis::Left => Vec3::NEG_X,
            Axis::Right => Vec3::X,
        }
    }
}

/// Configuration for a look-at constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LookAtConfig {
    /// Joint axis that should point at the target.
    pub axis: Axis,
    /// Minimum aim angle in degrees.
    pub min_angle: f32,
    /// Maximum aim angle in degrees.
    pub max_angle: f32,
}

impl Default for LookAtConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Forward,
            min_angle: -60.0,
            max_angle: 60.0,
        }
    }
}

/// World-space rotation that turns `axis` (in the joint's frame) toward
/// `target`, with the angle clamped to `[min_angle, max_angle]` degrees.
///
/// Returns identity when the aim direction and the target direction are
/// parallel or either is zero.
pub fn aim_rotation(
    joint_position: Vec3,
    joint_rotation: Quat,
    axis: Vec3,
    target: Vec3,
    min_angle: f32,
    max_angle: f32,
) -> Quat {
    let from = joint_rotation * axis;
    let to = target - joint_position;
    let cross = from.cross(to).normalize_or_zero();
    if cross == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let angle = from.angle_between(to).to_degrees().clamp(min_angle, max_angle);
    Quat::from_axis_angle(cross, angle.to_radians())
}

/// Look-at operator for a single joint.
#[derive(Debug, Clone)]
pub struct LookAt {
    joint: JointId,
    axis: Vec3,
    min_angle: f32,
    max_angle: f32,
}

impl LookAt {
    /// Creates the operator. Swapped angle limits are reordered.
    pub fn new(skeleton: &Skeleton, joint: JointId, config: LookAtConfig) -> Result<Self> {
        skeleton.check(joint)?;
        Ok(Self {
            joint,
            axis: config.axis.vector(),
            min_angle: config.min_angle.min(config.max_angle),
            max_angle: config.min_angle.max(config.max_angle),
        })
    }

    /// Returns the constrained joint.
    pub fn joint(&self) -> JointId {
        self.joint
    }

    /// Returns the angle limits in degrees.
    pub fn limits(&self) -> (f32, f32) {
        (self.min_angle, self.max_angle)
    }

    /// Aims the joint at `target`. A missing target is a no-op.
    pub fn solve(&self, skeleton: &Skeleton, pose: &mut Pose, target: Option<Vec3>) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };
        PoseError::check_len(skeleton.joint_count(), pose.len())?;

        let world = skeleton.world_of(pose.transforms(), self.joint);
        let delta = aim_rotation(
            world.translation,
            world.rotation,
            self.axis,
            target,
            self.min_angle,
            self.max_angle,
        );
        let parent = skeleton
            .parent(self.joint)
            .map(|p| skeleton.world_of(pose.transforms(), p))
            .unwrap_or_default();

        let mut local = pose.get(self.joint);
        local.rotation = (parent.rotation.inverse() * delta * world.rotation).normalize();
        pose.set(self.joint, local);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Joint, SkeletonBuilder};
    use crate::transform::Transform;

    fn neck() -> (Skeleton, JointId) {
        let mut b = SkeletonBuilder::new();
        let body = b
            .add_joint(Joint::new("body").with_rest(Transform::new(
                Vec3::new(0.0, 1.0, 0.0),
                Quat::from_rotation_y(0.4),
            )))
            .unwrap();
        let head = b
            .add_joint(
                Joint::new("head")
                    .with_parent(body)
                    .with_translation(Vec3::new(0.0, 0.5, 0.0)),
            )
            .unwrap();
        (b.build().unwrap(), head)
    }

    #[test]
    fn test_axis_vectors() {
        assert_eq!(Axis::Forward.vector(), Vec3::Z);
        assert_eq!(Axis::Left.vector(), Vec3::NEG_X);
        assert_eq!(Axis::default(), Axis::Forward);
    }

    #[test]
    fn test_aim_within_limits() {
        let target = Vec3::new(1.0, 0.0, 1.0);
        let q = aim_rotation(Vec3::ZERO, Quat::IDENTITY, Vec3::Z, target, -90.0, 90.0);
        let aimed = q * Vec3::Z;
        assert!((aimed - target.normalize()).length() < 1e-5);
    }

    #[test]
    fn test_aim_clamped() {
        let q = aim_rotation(Vec3::ZERO, Quat::IDENTITY, Vec3::Z, Vec3::X, -30.0, 30.0);
        let aimed = q * Vec3::Z;
        assert!((aimed.angle_between(Vec3::Z).to_degrees() - 30.0).abs() < 1e-3);
        assert!(aimed.x > 0.0);
    }

    #[test]
    fn test_aim_degenerate() {
        assert_eq!(
            aim_rotation(Vec3::ZERO, Quat::IDENTITY, Vec3::Z, Vec3::ZERO, -60.0, 60.0),
            Quat::IDENTITY
        );
        assert_eq!(
            aim_rotation(Vec3::ZERO, Quat::IDENTITY, Vec3::Z, Vec3::Z * 4.0, -60.0, 60.0),
            Quat::IDENTITY
        );
    }

    #[test]
    fn test_swapped_limits() {
        let (skel, head) = neck();
        let look = LookAt::new(
            &skel,
            head,
            LookAtConfig {
                min_angle: 45.0,
                max_angle: -45.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(look.limits(), (-45.0, 45.0));
    }

    #[test]
    fn test_operator_points_at_target() {
        let (skel, head) = neck();
        let look = LookAt::new(
            &skel,
            head,
            LookAtConfig {
                min_angle: -180.0,
                max_angle: 180.0,
                ..Default::default()
            },
        )
        .unwrap();
        let mut pose = skel.rest_pose();
        let target = Vec3::new(3.0, 2.0, -1.0);
        look.solve(&skel, &mut pose, Some(target)).unwrap();

        let world = skel.world_of(pose.transforms(), head);
        let dir = world.rotation * Vec3::Z;
        assert!((dir - (target - world.translation).normalize()).length() < 1e-4);
    }

    #[test]
    fn test_operator_without_target() {
        let (skel, head) = neck();
        let look = LookAt::new(&skel, head, LookAtConfig::default()).unwrap();
        let mut pose = skel.rest_pose();
        look.solve(&skel, &mut pose, None).unwrap();
        assert_eq!(pose, skel.rest_pose());
    }
}
