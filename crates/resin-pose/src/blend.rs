//! Weighted pose blending.
//!
//! Mixes two source poses of the same skeleton joint by joint. Each joint uses
//! `weight * joint_weight` as its interpolation factor; root motion uses the
//! global weight alone. Endpoints are exact: a zero factor reproduces the first
//! pose bit for bit and a factor of one reproduces the second.

use crate::error::{PoseError, Result};
use crate::mask::WeightMask;
use crate::pose::Pose;
use crate::skeleton::Skeleton;
use crate::transform::lerp_exact;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MixerConfig {
    /// Global mix weight (0.0 = first pose, 1.0 = second pose).
    pub weight: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { weight: 0.0 }
    }
}

/// Blends `a` toward `b` into `out`.
///
/// `joint_weights` scales the global weight per joint; `None` means every
/// joint uses the global weight. Weights are clamped to `[0, 1]`.
pub fn blend_poses(
    a: &Pose,
    b: &Pose,
    weight: f32,
    joint_weights: Option<&[f32]>,
    out: &mut Pose,
) -> Result<()> {
    PoseError::check_len(a.len(), b.len())?;
    PoseError::check_len(a.len(), out.len())?;
    if let Some(weights) = joint_weights {
        PoseError::check_len(a.len(), weights.len())?;
    }

    let weight = weight.clamp(0.0, 1.0);
    let sources = a.transforms().iter().zip(b.transforms());
    for (i, (out, (ta, tb))) in out.transforms_mut().iter_mut().zip(sources).enumerate() {
        let joint_weight = joint_weights.map_or(1.0, |w| w[i].clamp(0.0, 1.0));
        *out = ta.lerp(tb, weight * joint_weight);
    }

    out.velocity = lerp_exact(a.velocity, b.velocity, weight);
    out.angular_velocity = lerp_exact(a.angular_velocity, b.angular_velocity, weight);
    Ok(())
}

/// A two-input mixer with per-joint weights.
#[derive(Debug, Clone)]
pub struct Mixer {
    /// Global mix weight.
    pub weight: f32,
    joint_weights: Vec<f32>,
}

impl Mixer {
    /// Creates a mixer with every joint weight at 1.0.
    pub fn new(skeleton: &Skeleton, config: MixerConfig) -> Self {
        Self {
            weight: config.weight,
            joint_weights: vec![1.0; skeleton.joint_count()],
        }
    }

    /// Creates a mixer whose joint weights come from a mask.
    pub fn with_mask(skeleton: &Skeleton, config: MixerConfig, mask: &WeightMask) -> Result<Self> {
        let mut mixer = Self::new(skeleton, config);
        mixer.set_joint_weights(mask.weights())?;
        Ok(mixer)
    }

    /// Replaces the per-joint weights.
    pub fn set_joint_weights(&mut self, weights: &[f32]) -> Result<()> {
        PoseError::check_len(self.joint_weights.len(), weights.len())?;
        self.joint_weights.copy_from_slice(weights);
        Ok(())
    }

    /// Returns the per-joint weights.
    pub fn joint_weights(&self) -> &[f32] {
        &self.joint_weights
    }

    /// Blends two local poses into `out`.
    pub fn blend(&self, a: &Pose, b: &Pose, out: &mut Pose) -> Result<()> {
        blend_poses(a, b, self.weight, Some(&self.joint_weights), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Joint, JointId, SkeletonBuilder};
    use crate::transform::Transform;
    use glam::{Quat, Vec3};

    fn skeleton() -> Skeleton {
        let mut b = SkeletonBuilder::new();
        let root = b.add_joint(Joint::new("root")).unwrap();
        let arm = b.add_joint(Joint::new("arm").with_parent(root)).unwrap();
        b.add_joint(Joint::new("hand").with_parent(arm)).unwrap();
        b.build().unwrap()
    }

    fn poses() -> (Pose, Pose) {
        let a = Pose::from_transforms(vec![
            Transform::new(Vec3::new(0.1, 0.2, 0.3), Quat::from_rotation_x(0.3)),
            Transform::new(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(-0.2)),
            Transform::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY),
        ]);
        let mut b = Pose::from_transforms(vec![
            Transform::new(Vec3::new(2.0, 0.0, -1.0), Quat::from_rotation_z(1.1)),
            Transform::new(Vec3::new(1.0, 3.0, 0.0), Quat::from_rotation_x(0.9)),
            Transform::new(Vec3::new(0.0, 1.0, 4.0), Quat::from_rotation_y(2.0)),
        ]);
        b.velocity = Vec3::new(0.0, 0.0, 2.0);
        b.angular_velocity = Vec3::Y;
        (a, b)
    }

    #[test]
    fn test_zero_weight_is_exactly_a() {
        let skel = skeleton();
        let (a, b) = poses();
        let mixer = Mixer::new(&skel, MixerConfig { weight: 0.0 });
        let mut out = Pose::identity(3);
        mixer.blend(&a, &b, &mut out).unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn test_full_weight_is_exactly_b() {
        let skel = skeleton();
        let (a, b) = poses();
        let mixer = Mixer::new(&skel, MixerConfig { weight: 1.0 });
        let mut out = Pose::identity(3);
        mixer.blend(&a, &b, &mut out).unwrap();
        assert_eq!(out, b);
    }

    #[test]
    fn test_zero_joint_weight_keeps_a() {
        let skel = skeleton();
        let (a, b) = poses();
        let mut mixer = Mixer::new(&skel, MixerConfig { weight: 1.0 });
        mixer.set_joint_weights(&[1.0, 0.0, 0.5]).unwrap();
        let mut out = Pose::identity(3);
        mixer.blend(&a, &b, &mut out).unwrap();

        assert_eq!(out.get(JointId(0)), b.get(JointId(0)));
        assert_eq!(out.get(JointId(1)), a.get(JointId(1)));
        let hand = out.get(JointId(2)).translation;
        assert!((hand - Vec3::new(0.0, 1.0, 2.0)).length() < 0.0001);
        // Root motion ignores joint weights.
        assert_eq!(out.velocity, b.velocity);
    }

    #[test]
    fn test_monotonic() {
        let skel = skeleton();
        let (a, b) = poses();
        let mut mixer = Mixer::new(&skel, MixerConfig::default());
        let mut out = Pose::identity(3);
        let mut last_distance = f32::MAX;
        let mut last_angle = f32::MAX;
        for step in 0..=10 {
            mixer.weight = step as f32 / 10.0;
            mixer.blend(&a, &b, &mut out).unwrap();
            let d = (out.get(JointId(0)).translation - b.get(JointId(0)).translation).length();
            let angle = out.get(JointId(0)).rotation.angle_between(b.get(JointId(0)).rotation);
            assert!(d <= last_distance + 1e-6);
            assert!(angle <= last_angle + 1e-5);
            last_distance = d;
            last_angle = angle;
        }
        assert_eq!(last_distance, 0.0);
        assert!(last_angle < 2e-3);
    }

    #[test]
    fn test_mask_weights() {
        let skel = skeleton();
        let (a, b) = poses();
        let mask = WeightMask::new(&skel, &[(JointId(2), 1.0)]).unwrap();
        let mixer = Mixer::with_mask(&skel, MixerConfig { weight: 1.0 }, &mask).unwrap();
        let mut out = Pose::identity(3);
        mixer.blend(&a, &b, &mut out).unwrap();
        assert_eq!(out.get(JointId(0)), a.get(JointId(0)));
        assert_eq!(out.get(JointId(2)), b.get(JointId(2)));
    }

    #[test]
    fn test_length_mismatch() {
        let (a, _) = poses();
        let b = Pose::identity(2);
        let mut out = Pose::identity(3);
        assert!(blend_poses(&a, &b, 0.5, None, &mut out).is_err());
    }
}
