//! Analytic two-bone inverse kinematics.
//!
//! Solves a top/middle/end limb in closed form with the law of cosines. The
//! middle joint bends in the plane spanned by the current segments, so limbs
//! keep their bend direction from frame to frame. Targets out of reach fully
//! extend the limb toward them instead of failing.

use crate::error::{PoseError, Result};
use crate::pose::Pose;
use crate::skeleton::{JointId, Skeleton};
use crate::transform::{Transform, from_to_rotation};
use glam::{Quat, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const SQR_EPSILON: f32 = 1e-8;

/// A target for a limb end.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IkTarget {
    /// World position to reach.
    pub position: Vec3,
    /// World rotation for the end joint.
    pub rotation: Quat,
    /// How strongly to reach the position (0..1).
    pub position_weight: f32,
    /// How strongly to match the rotation (0..1).
    pub rotation_weight: f32,
}

impl IkTarget {
    /// Creates a full-weight position target that leaves the end rotation alone.
    pub fn position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            position_weight: 1.0,
            rotation_weight: 0.0,
        }
    }
}

/// A pole hint that selects the bend direction of a limb.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IkHint {
    /// World position the middle joint should point toward.
    pub position: Vec3,
    /// Hint influence (0..1).
    pub weight: f32,
}

/// A top/middle/end joint chain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoBoneChain {
    /// First joint (shoulder, hip).
    pub top: JointId,
    /// Middle joint (elbow, knee).
    pub middle: JointId,
    /// End joint (wrist, ankle).
    pub end: JointId,
    /// Sum of both segment lengths in the rest pose.
    pub max_extension: f32,
}

impl TwoBoneChain {
    /// Creates a chain, checking that the joints are a direct parent chain.
    pub fn new(skeleton: &Skeleton, top: JointId, middle: JointId, end: JointId) -> Result<Self> {
        for id in [top, middle, end] {
            skeleton.check(id)?;
        }
        for (child, parent) in [(middle, top), (end, middle)] {
            if skeleton.parent(child) != Some(parent) {
                return Err(PoseError::UnsupportedTopology {
                    joint: child.0,
                    expected_parent: parent.0,
                });
            }
        }

        let rest_middle = skeleton.joint(middle).map(|j| j.rest.translation);
        let rest_end = skeleton.joint(end).map(|j| j.rest.translation);
        let max_extension =
            rest_middle.unwrap_or_default().length() + rest_end.unwrap_or_default().length();

        tracing::debug!(
            top = top.0,
            middle = middle.0,
            end = end.0,
            max_extension,
            "two-bone chain"
        );
        Ok(Self {
            top,
            middle,
            end,
            max_extension,
        })
    }

    /// Creates a chain from its end joint by walking two parents up.
    pub fn from_end(skeleton: &Skeleton, end: JointId) -> Result<Self> {
        skeleton.check(end)?;
        let no_parent = |joint: JointId| PoseError::UnsupportedTopology {
            joint: joint.0,
            expected_parent: joint.0,
        };
        let middle = skeleton.parent(end).ok_or_else(|| no_parent(end))?;
        let top = skeleton.parent(middle).ok_or_else(|| no_parent(middle))?;
        Self::new(skeleton, top, middle, end)
    }
}

/// World-space state of a limb for a single solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoBoneInput {
    /// Top joint world transform.
    pub top: Transform,
    /// Middle joint world transform.
    pub middle: Transform,
    /// End joint world position.
    pub end: Vec3,
    /// Position to reach.
    pub target: Vec3,
    /// Positional weight; 0 keeps the end where it is.
    pub weight: f32,
    /// Optional bend hint.
    pub hint: Option<IkHint>,
}

/// Result of a two-bone solve, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoBoneSolution {
    /// New top joint world rotation.
    pub top_rotation: Quat,
    /// New middle joint world rotation.
    pub middle_rotation: Quat,
    /// New middle joint world position.
    pub middle_position: Vec3,
    /// New end joint world position.
    pub end_position: Vec3,
}

/// Interior angle opposite side `a` in a triangle with sides `a`, `b`, `c`.
fn triangle_angle(a: f32, b: f32, c: f32) -> f32 {
    let cos = ((b * b + c * c - a * a) / (b * c) / 2.0).clamp(-1.0, 1.0);
    cos.acos()
}

/// Solves a two-bone limb in closed form.
pub fn solve_two_bone(input: &TwoBoneInput) -> TwoBoneSolution {
    let a = input.top.translation;
    let b = input.middle.translation;
    let c = input.end;
    let t = c.lerp(input.target, input.weight.clamp(0.0, 1.0));

    let unchanged = TwoBoneSolution {
        top_rotation: input.top.rotation,
        middle_rotation: input.middle.rotation,
        middle_position: b,
        end_position: c,
    };

    let ab = b - a;
    let bc = c - b;
    let ab_len = ab.length();
    let bc_len = bc.length();
    if ab_len * bc_len < SQR_EPSILON {
        return unchanged;
    }
    let ac_len = (c - a).length();
    let at = t - a;
    let at_len = at.length();

    let old_angle = triangle_angle(ac_len, ab_len, bc_len);
    let new_angle = triangle_angle(at_len, ab_len, bc_len);

    // Keep the current bend plane; fall back to the hint, then to the target
    // direction, when the limb is straight.
    let mut axis = ab.cross(bc);
    if axis.length_squared() < SQR_EPSILON {
        axis = match input.hint {
            Some(hint) if hint.weight > 0.0 => (hint.position - a).cross(bc),
            _ => Vec3::ZERO,
        };
        if axis.length_squared() < SQR_EPSILON {
            axis = at.cross(bc);
        }
        if axis.length_squared() < SQR_EPSILON {
            axis = ab.any_orthonormal_vector();
        }
    }
    let axis = axis.normalize();

    let bend = Quat::from_axis_angle(axis, old_angle - new_angle);
    let c = b + bend * bc;

    let mut swing = from_to_rotation(c - a, at);

    if let Some(hint) = input.hint.filter(|h| h.weight > 0.0) {
        let ac = swing * (c - a);
        let ac_sqr = ac.length_squared();
        if ac_sqr > 0.0 {
            let ac_norm = ac / ac_sqr.sqrt();
            let ab = swing * ab;
            let ah = hint.position - a;
            let ab_proj = ab - ac_norm * ab.dot(ac_norm);
            let ah_proj = ah - ac_norm * ah.dot(ac_norm);
            let max_reach = ab_len + bc_len;
            if ab_proj.length_squared() > max_reach * max_reach * 0.001
                && ah_proj.length_squared() > 0.0
            {
                // Twist about the top->end axis so the end stays put.
                let angle = ac_norm
                    .dot(ab_proj.cross(ah_proj))
                    .atan2(ab_proj.dot(ah_proj));
                let pole = Quat::from_axis_angle(ac_norm, angle * hint.weight.min(1.0));
                swing = pole * swing;
            }
        }
    }

    TwoBoneSolution {
        top_rotation: (swing * input.top.rotation).normalize(),
        middle_rotation: (swing * bend * input.middle.rotation).normalize(),
        middle_position: a + swing * ab,
        end_position: a + swing * (c - a),
    }
}

/// Solves a limb in place on world and local buffers.
///
/// Updates top, middle and end entries of both buffers. Descendants of the
/// end joint are left stale in `world`.
pub(crate) fn apply_two_bone(
    skeleton: &Skeleton,
    chain: &TwoBoneChain,
    world: &mut [Transform],
    local: &mut [Transform],
    target: &IkTarget,
    hint: Option<IkHint>,
) {
    let (top, middle, end) = (chain.top.index(), chain.middle.index(), chain.end.index());

    let solution = solve_two_bone(&TwoBoneInput {
        top: world[top],
        middle: world[middle],
        end: world[end].translation,
        target: target.position,
        weight: target.position_weight,
        hint,
    });

    let parent = skeleton.parent_world(world, chain.top);
    world[top].rotation = solution.top_rotation;
    world[middle] = Transform::new(solution.middle_position, solution.middle_rotation);

    let end_rotation = if target.rotation_weight >= 1.0 {
        target.rotation
    } else if target.rotation_weight > 0.0 {
        let current = world[middle].rotation * local[end].rotation;
        current.slerp(target.rotation, target.rotation_weight)
    } else {
        world[middle].rotation * local[end].rotation
    };
    world[end] = Transform::new(solution.end_position, end_rotation);

    local[top].rotation = (parent.rotation.inverse() * world[top].rotation).normalize();
    local[middle].rotation = (world[top].rotation.inverse() * world[middle].rotation).normalize();
    local[end].rotation = (world[middle].rotation.inverse() * end_rotation).normalize();
}

/// Two-bone IK operator for a single limb.
#[derive(Debug, Clone)]
pub struct TwoBoneIk {
    chain: TwoBoneChain,
    world: Vec<Transform>,
}

impl TwoBoneIk {
    /// Creates the operator, allocating its world-space scratch buffer.
    ///
    /// Fails when a chain joint is outside `skeleton`.
    pub fn new(skeleton: &Skeleton, chain: TwoBoneChain) -> Result<Self> {
        for id in [chain.top, chain.middle, chain.end] {
            skeleton.check(id)?;
        }
        Ok(Self {
            chain,
            world: vec![Transform::IDENTITY; skeleton.joint_count()],
        })
    }

    /// Returns the solved chain.
    pub fn chain(&self) -> &TwoBoneChain {
        &self.chain
    }

    /// Solves the limb toward `target`, writing local rotations into `pose`.
    ///
    /// A missing target leaves the pose untouched.
    pub fn solve(
        &mut self,
        skeleton: &Skeleton,
        pose: &mut Pose,
        target: Option<&IkTarget>,
        hint: Option<IkHint>,
    ) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };
        skeleton.compute_world(pose.transforms(), &mut self.world)?;
        apply_two_bone(
            skeleton,
            &self.chain,
            &mut self.world,
            pose.transforms_mut(),
            target,
            hint,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Joint, SkeletonBuilder};

    fn bent_input(target: Vec3) -> TwoBoneInput {
        TwoBoneInput {
            top: Transform::IDENTITY,
            middle: Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            end: Vec3::new(1.0, 1.0, 0.0),
            target,
            weight: 1.0,
            hint: None,
        }
    }

    fn arm() -> (Skeleton, TwoBoneChain) {
        let mut b = SkeletonBuilder::new();
        let shoulder = b.add_joint(Joint::new("shoulder")).unwrap();
        let elbow = b
            .add_joint(
                Joint::new("elbow")
                    .with_parent(shoulder)
                    .with_translation(Vec3::new(0.0, 1.0, 0.0)),
            )
            .unwrap();
        let wrist = b
            .add_joint(
                Joint::new("wrist")
                    .with_parent(elbow)
                    .with_translation(Vec3::new(1.0, 0.0, 0.0)),
            )
            .unwrap();
        let skel = b.build().unwrap();
        let chain = TwoBoneChain::new(&skel, shoulder, elbow, wrist).unwrap();
        (skel, chain)
    }

    #[test]
    fn test_max_extension() {
        let (_, chain) = arm();
        assert!((chain.max_extension - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_end() {
        let (skel, chain) = arm();
        assert_eq!(TwoBoneChain::from_end(&skel, chain.end).unwrap(), chain);
        assert!(TwoBoneChain::from_end(&skel, chain.middle).is_err());
    }

    #[test]
    fn test_rejects_non_chain() {
        let (skel, chain) = arm();
        let err = TwoBoneChain::new(&skel, chain.top, chain.end, chain.middle).unwrap_err();
        assert!(matches!(err, PoseError::UnsupportedTopology { .. }));
    }

    #[test]
    fn test_full_extension_is_straight() {
        let target = Vec3::new(2.0, 0.0, 0.0);
        let s = solve_two_bone(&bent_input(target));
        assert!((s.end_position - target).length() < 1e-5);
        assert!((s.middle_position - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_unreachable_saturates() {
        let target = Vec3::new(10.0, 0.0, 0.0);
        let s = solve_two_bone(&bent_input(target));
        assert!((s.end_position - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4);
        assert!(s.top_rotation.is_finite());
    }

    #[test]
    fn test_near_target_no_nan() {
        let target = Vec3::new(0.1, 0.0, 0.0);
        let s = solve_two_bone(&bent_input(target));
        assert!(s.top_rotation.is_finite());
        assert!(s.middle_rotation.is_finite());
        assert!((s.end_position - target).length() < 1e-5);
        // Segment lengths are preserved.
        assert!((s.middle_position.length() - 1.0).abs() < 1e-5);
        assert!(((s.end_position - s.middle_position).length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_weight_keeps_end() {
        let mut input = bent_input(Vec3::new(0.5, 0.5, 0.5));
        input.weight = 0.0;
        let s = solve_two_bone(&input);
        assert!((s.end_position - input.end).length() < 1e-5);
    }

    #[test]
    fn test_straight_chain_bends() {
        let input = TwoBoneInput {
            top: Transform::IDENTITY,
            middle: Transform::from_translation(Vec3::Y),
            end: Vec3::new(0.0, 2.0, 0.0),
            target: Vec3::new(0.5, 1.0, 0.0),
            weight: 1.0,
            hint: None,
        };
        let s = solve_two_bone(&input);
        assert!((s.end_position - input.target).length() < 1e-4);
    }

    #[test]
    fn test_hint_selects_bend_side() {
        let input = TwoBoneInput {
            top: Transform::IDENTITY,
            middle: Transform::from_translation(Vec3::new(0.0, 1.0, 0.1)),
            end: Vec3::new(0.0, 2.0, 0.0),
            target: Vec3::new(0.0, 1.2, 0.0),
            weight: 1.0,
            hint: Some(IkHint {
                position: Vec3::new(0.0, 0.6, -5.0),
                weight: 1.0,
            }),
        };
        let s = solve_two_bone(&input);
        assert!((s.end_position - input.target).length() < 1e-4);
        assert!(s.middle_position.z < 0.0);
    }

    #[test]
    fn test_operator_reaches_target() {
        let (skel, chain) = arm();
        let mut ik = TwoBoneIk::new(&skel, chain).unwrap();
        let mut pose = skel.rest_pose();
        let target = Vec3::new(0.8, 0.9, 0.6);

        ik.solve(&skel, &mut pose, Some(&IkTarget::position(target)), None)
            .unwrap();

        let end = skel.world_of(pose.transforms(), chain.end).translation;
        assert!((end - target).length() < 1e-4);
        // Only rotations change.
        assert_eq!(pose.get(chain.middle).translation, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_operator_end_rotation() {
        let (skel, chain) = arm();
        let mut ik = TwoBoneIk::new(&skel, chain).unwrap();
        let mut pose = skel.rest_pose();
        let rotation = Quat::from_rotation_x(0.7);
        let target = IkTarget {
            position: Vec3::new(1.0, 1.0, 0.0),
            rotation,
            position_weight: 1.0,
            rotation_weight: 1.0,
        };
        ik.solve(&skel, &mut pose, Some(&target), None).unwrap();
        let end = skel.world_of(pose.transforms(), chain.end);
        assert!(
            end.rotation.abs_diff_eq(rotation, 1e-4) || end.rotation.abs_diff_eq(-rotation, 1e-4)
        );
    }

    #[test]
    fn test_operator_without_target() {
        let (skel, chain) = arm();
        let mut ik = TwoBoneIk::new(&skel, chain).unwrap();
        let mut pose = skel.rest_pose();
        ik.solve(&skel, &mut pose, None, None).unwrap();
        assert_eq!(pose, skel.rest_pose());
    }

    #[test]
    fn test_operator_rejects_foreign_chain() {
        let (_, chain) = arm();
        let mut b = SkeletonBuilder::new();
        b.add_joint(Joint::new("shoulder")).unwrap();
        let small = b.build().unwrap();
        let err = TwoBoneIk::new(&small, chain).unwrap_err();
        assert!(matches!(err, PoseError::JointOutOfRange { joint: 1, count: 1 }));
    }
}
