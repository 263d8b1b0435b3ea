//! Damped spring chains.
//!
//! Each joint of a chain is a point mass pulled toward where its rest local
//! transform would place it under its (already simulated) parent. Joints are
//! processed parent to child, keep their rest segment length, and swing their
//! rotation to follow the segment. Suited to tails, antennae and hair strands.

use crate::error::{PoseError, Result};
use crate::pose::Pose;
use crate::skeleton::{JointId, Skeleton};
use crate::transform::{Transform, from_to_rotation};
use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Spring parameters of a damping chain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DampingConfig {
    /// Spring stiffness (higher = snappier return to rest).
    pub stiffness: f32,
    /// Damping coefficient (higher = less oscillation).
    pub damping: f32,
}

impl Default for DampingConfig {
    fn default() -> Self {
        Self {
            stiffness: 10.0,
            damping: 2.0,
        }
    }
}

/// A simulated joint chain.
#[derive(Debug, Clone)]
pub struct DampingChain {
    joints: Vec<JointId>,
    rest: Vec<Transform>,
    rest_positions: Vec<Vec3>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    config: DampingConfig,
}

impl DampingChain {
    /// Creates a chain at rest.
    ///
    /// `joints` must be ordered so that each joint is the direct child of the
    /// one before it.
    pub fn new(skeleton: &Skeleton, joints: &[JointId], config: DampingConfig) -> Result<Self> {
        if joints.is_empty() {
            return Err(PoseError::InvalidConfig("damping chain has no joints".into()));
        }
        for &joint in joints {
            skeleton.check(joint)?;
        }
        for pair in joints.windows(2) {
            if skeleton.parent(pair[1]) != Some(pair[0]) {
                return Err(PoseError::UnsupportedTopology {
                    joint: pair[1].0,
                    expected_parent: pair[0].0,
                });
            }
        }

        let rest: Vec<Transform> = joints
            .iter()
            .map(|&j| skeleton.joint(j).map(|joint| joint.rest).unwrap_or_default())
            .collect();
        let rest_positions: Vec<Vec3> = joints
            .iter()
            .map(|&j| skeleton.rest_world(j).translation)
            .collect();

        tracing::debug!(
            joints = joints.len(),
            stiffness = config.stiffness,
            damping = config.damping,
            "damping chain created"
        );
        Ok(Self {
            joints: joints.to_vec(),
            rest,
            positions: rest_positions.clone(),
            rest_positions,
            velocities: vec![Vec3::ZERO; joints.len()],
            config,
        })
    }

    /// Returns the chain joints, parent first.
    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    /// Simulated world positions, one per chain joint.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Simulated velocities, one per chain joint.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Puts every joint back at its rest position with no velocity.
    pub fn reset(&mut self) {
        self.positions.copy_from_slice(&self.rest_positions);
        self.velocities.fill(Vec3::ZERO);
    }

    /// Advances the simulation and writes the chain's local transforms.
    ///
    /// The chain hangs from the world transform of the first joint's parent
    /// in `pose`. A non-positive `dt` leaves everything untouched.
    pub fn step(&mut self, skeleton: &Skeleton, pose: &mut Pose, dt: f32) -> Result<()> {
        PoseError::check_len(skeleton.joint_count(), pose.len())?;
        if !(dt > 0.0 && dt.is_finite()) {
            return Ok(());
        }

        let mut parent = skeleton
            .parent(self.joints[0])
            .map(|p| skeleton.world_of(pose.transforms(), p))
            .unwrap_or_default();
        let DampingConfig { stiffness, damping } = self.config;

        for (i, &joint) in self.joints.iter().enumerate() {
            let rest = self.rest[i];
            let rest_offset = parent.rotation * rest.translation;
            let target = parent.translation + rest_offset;

            let acceleration =
                (target - self.positions[i]) * stiffness - self.velocities[i] * damping;
            self.velocities[i] += acceleration * dt;
            let moved = self.positions[i] + self.velocities[i] * dt;

            // Keep the segment at rest length.
            let direction = (moved - parent.translation).normalize_or_zero();
            let offset = if direction == Vec3::ZERO {
                rest_offset
            } else {
                direction * rest.translation.length()
            };
            let swing = from_to_rotation(rest_offset, offset);
            self.positions[i] = parent.translation + offset;

            let rotation = (swing * parent.rotation * rest.rotation).normalize();
            let world = Transform::new(self.positions[i], rotation);
            pose.set(joint, parent.to_local(&world));
            parent = world;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Joint, SkeletonBuilder};

    /// root -> tail0 -> tail1 -> tail2, hanging along -Z.
    fn tail() -> (Skeleton, Vec<JointId>) {
        let mut b = SkeletonBuilder::new();
        let mut parent = b.add_joint(Joint::new("root")).unwrap();
        let mut chain = Vec::new();
        for i in 0..3 {
            parent = b
                .add_joint(
                    Joint::new(format!("tail{i}"))
                        .with_parent(parent)
                        .with_translation(Vec3::new(0.0, 0.0, -0.5)),
                )
                .unwrap();
            chain.push(parent);
        }
        (b.build().unwrap(), chain)
    }

    #[test]
    fn test_rest_is_fixed_point() {
        let (skel, joints) = tail();
        let mut chain = DampingChain::new(&skel, &joints, DampingConfig::default()).unwrap();
        let mut pose = skel.rest_pose();
        for _ in 0..10 {
            chain.step(&skel, &mut pose, 1.0 / 60.0).unwrap();
        }
        for (i, &joint) in joints.iter().enumerate() {
            let rest = skel.rest_world(joint).translation;
            assert!((chain.positions()[i] - rest).length() < 1e-5);
            assert!(chain.velocities()[i].length() < 1e-4);
            assert!(pose.get(joint).abs_diff_eq(&skel.rest_pose().get(joint), 1e-5));
        }
    }

    #[test]
    fn test_lags_then_settles() {
        let (skel, joints) = tail();
        let mut chain = DampingChain::new(&skel, &joints, DampingConfig::default()).unwrap();
        let mut pose = skel.rest_pose();
        pose.set(JointId(0), Transform::from_translation(Vec3::new(0.1, 0.0, 0.0)));

        chain.step(&skel, &mut pose, 1.0 / 60.0).unwrap();
        // The tip trails behind the moved root.
        assert!(chain.positions()[2].x < 0.05);
        // Segment lengths are preserved.
        let segment = chain.positions()[2] - chain.positions()[1];
        assert!((segment.length() - 0.5).abs() < 1e-4);

        for _ in 0..1200 {
            chain.step(&skel, &mut pose, 1.0 / 60.0).unwrap();
        }
        let tip = skel.world_of(pose.transforms(), joints[2]).translation;
        assert!((tip - Vec3::new(0.1, 0.0, -1.5)).length() < 1e-3);
        assert!((chain.positions()[2] - tip).length() < 1e-4);
    }

    #[test]
    fn test_non_positive_dt_is_noop() {
        let (skel, joints) = tail();
        let mut chain = DampingChain::new(&skel, &joints, DampingConfig::default()).unwrap();
        let mut pose = skel.rest_pose();
        pose.set(JointId(0), Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let before = pose.clone();
        chain.step(&skel, &mut pose, 0.0).unwrap();
        chain.step(&skel, &mut pose, -1.0).unwrap();
        assert_eq!(pose, before);
        assert_eq!(chain.velocities(), &[Vec3::ZERO; 3]);
    }

    #[test]
    fn test_reset() {
        let (skel, joints) = tail();
        let mut chain = DampingChain::new(&skel, &joints, DampingConfig::default()).unwrap();
        let mut pose = skel.rest_pose();
        pose.set(JointId(0), Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)));
        chain.step(&skel, &mut pose, 0.1).unwrap();
        assert!(chain.velocities()[0].length() > 0.0);

        chain.reset();
        assert_eq!(chain.velocities(), &[Vec3::ZERO; 3]);
        assert_eq!(chain.positions()[2], skel.rest_world(joints[2]).translation);
    }

    #[test]
    fn test_rejects_non_chain() {
        let (skel, joints) = tail();
        let err = DampingChain::new(&skel, &[joints[0], joints[2]], DampingConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            PoseError::UnsupportedTopology {
                joint: joints[2].0,
                expected_parent: joints[0].0,
            }
        );
        assert!(DampingChain::new(&skel, &[], DampingConfig::default()).is_err());
    }
}
