//! Full-body IK with body balancing.
//!
//! Solves a humanoid's four limbs toward their effectors after first moving
//! the body so over-stretched limbs can reach. Two strategies are available
//! for that displacement:
//!
//! - [`BodyStrategy::Pull`]: iterative relaxation where each limb stretched
//!   past its rest extension pulls the body like a spring.
//! - [`BodyStrategy::Average`]: the weighted average of how far each goal
//!   moved from its limb's current end, without any spring model.
//!
//! After the limbs, an optional look-at turns spine, head and eyes toward a
//! point. Effectors that are not bound (`None`) contribute nothing.
//!
//! # Example
//!
//! ```
//! use rhizome_resin_pose::{LimbPart, solve_pull};
//! use glam::Vec3;
//!
//! let hand = LimbPart {
//!     anchor_offset: Vec3::ZERO,
//!     goal_position: Vec3::new(3.0, 0.0, 0.0),
//!     goal_weight: 1.0,
//!     pull_weight: 1.0,
//!     max_extension: 2.0,
//!     stiffness: 1.0,
//!     end_position: Vec3::new(2.0, 0.0, 0.0),
//! };
//!
//! // The body is dragged until the limb is back at its rest extension.
//! let delta = solve_pull(Vec3::ZERO, &[hand], 5);
//! assert!((delta - Vec3::X).length() < 1e-5);
//! ```

use crate::error::{PoseError, Result};
use crate::ik::{IkHint, IkTarget, TwoBoneChain, apply_two_bone};
use crate::look_at::{Axis, aim_rotation};
use crate::pose::Pose;
use crate::skeleton::{JointId, Skeleton};
use crate::transform::{Transform, weighted_rotation};
use glam::{Quat, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Limb goals, in solve order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Goal {
    /// Left foot.
    LeftFoot,
    /// Right foot.
    RightFoot,
    /// Left hand.
    LeftHand,
    /// Right hand.
    RightHand,
}

impl Goal {
    /// All goals in solve order.
    pub const ALL: [Goal; 4] = [Goal::LeftFoot, Goal::RightFoot, Goal::LeftHand, Goal::RightHand];

    /// Index into per-goal arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Bend hints, one per goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Hint {
    /// Left knee, bends the left leg.
    LeftKnee,
    /// Right knee, bends the right leg.
    RightKnee,
    /// Left elbow, bends the left arm.
    LeftElbow,
    /// Right elbow, bends the right arm.
    RightElbow,
}

impl Hint {
    /// Returns the goal whose limb this hint bends.
    pub fn goal(self) -> Goal {
        match self {
            Hint::LeftKnee => Goal::LeftFoot,
            Hint::RightKnee => Goal::RightFoot,
            Hint::LeftElbow => Goal::LeftHand,
            Hint::RightElbow => Goal::RightHand,
        }
    }
}

/// A limb goal effector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Effector {
    /// Goal world position.
    pub position: Vec3,
    /// Goal world rotation.
    pub rotation: Quat,
    /// Reach weight.
    pub position_weight: f32,
    /// Rotation weight.
    pub rotation_weight: f32,
    /// How strongly an over-extended limb drags the body.
    pub pull_weight: f32,
}

impl Effector {
    /// Creates an effector with full position and rotation weight and no pull.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            position_weight: 1.0,
            rotation_weight: 1.0,
            pull_weight: 0.0,
        }
    }

    /// Sets the pull weight.
    pub fn with_pull_weight(mut self, pull_weight: f32) -> Self {
        self.pull_weight = pull_weight;
        self
    }

    /// Sets the rotation weight.
    pub fn with_rotation_weight(mut self, rotation_weight: f32) -> Self {
        self.rotation_weight = rotation_weight;
        self
    }
}

/// A bend hint effector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HintEffector {
    /// Hint world position.
    pub position: Vec3,
    /// Hint weight.
    pub weight: f32,
}

/// A look-at effector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LookAtEffector {
    /// Point to look at.
    pub position: Vec3,
    /// Eye weight.
    pub eyes_weight: f32,
    /// Head weight.
    pub head_weight: f32,
    /// Spine weight.
    pub body_weight: f32,
    /// 0 = free rotation, 1 = no rotation at all.
    pub clamp_weight: f32,
}

/// A body rotation override.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyEffector {
    /// Desired body world rotation.
    pub rotation: Quat,
    /// Override weight.
    pub weight: f32,
}

/// Per-frame inputs of the full-body solver.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FullBodyInput {
    /// Limb effectors, indexed by [`Goal::index`].
    pub effectors: [Option<Effector>; 4],
    /// Bend hints, indexed by the goal they bend.
    pub hints: [Option<HintEffector>; 4],
    /// Look-at effector.
    pub look_at: Option<LookAtEffector>,
    /// Body rotation override.
    pub body: Option<BodyEffector>,
}

impl FullBodyInput {
    /// Creates an input with nothing bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a limb effector.
    pub fn with_effector(mut self, goal: Goal, effector: Effector) -> Self {
        self.effectors[goal.index()] = Some(effector);
        self
    }

    /// Binds a bend hint.
    pub fn with_hint(mut self, hint: Hint, effector: HintEffector) -> Self {
        self.hints[hint.goal().index()] = Some(effector);
        self
    }

    /// Binds the look-at effector.
    pub fn with_look_at(mut self, look_at: LookAtEffector) -> Self {
        self.look_at = Some(look_at);
        self
    }

    /// Binds the body rotation override.
    pub fn with_body(mut self, body: BodyEffector) -> Self {
        self.body = Some(body);
        self
    }
}

/// How the body displacement is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyStrategy {
    /// Iterative spring relaxation driven by limb over-extension.
    #[default]
    Pull,
    /// Weighted average of goal offsets.
    Average,
}

/// Configuration for the full-body solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FullBodyConfig {
    /// Limb stiffness. 0 leaves the body anchored; above 1 may overshoot.
    pub stiffness: f32,
    /// Relaxation iterations for [`BodyStrategy::Pull`].
    pub max_pull_iterations: u32,
    /// Body displacement strategy.
    pub strategy: BodyStrategy,
    /// Forward axis of spine, head and eye joints.
    pub look_axis: Axis,
}

impl Default for FullBodyConfig {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            max_pull_iterations: 5,
            strategy: BodyStrategy::Pull,
            look_axis: Axis::Forward,
        }
    }
}

/// Solver view of one limb.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimbPart {
    /// Limb top position relative to the body.
    pub anchor_offset: Vec3,
    /// Goal world position.
    pub goal_position: Vec3,
    /// Goal reach weight.
    pub goal_weight: f32,
    /// Goal pull weight.
    pub pull_weight: f32,
    /// Extension at which the limb starts pulling (spring rest length).
    pub max_extension: f32,
    /// Spring stiffness.
    pub stiffness: f32,
    /// Current world position of the limb end.
    pub end_position: Vec3,
}

/// Computes the body displacement that relaxes over-extended limbs.
///
/// Runs `max_iterations` relaxation steps; step `i` applies
/// `1 / (max_iterations - i)` of the summed pull, so later steps are damped.
pub fn solve_pull(body_position: Vec3, limbs: &[LimbPart], max_iterations: u32) -> Vec3 {
    let mut position = body_position;
    for iteration in 0..max_iterations {
        let mut delta = Vec3::ZERO;
        for limb in limbs {
            let top = position + limb.anchor_offset;
            let to_goal = limb.goal_position - top;
            let extension = to_goal.length();
            let force = (limb.stiffness * (extension - limb.max_extension)).max(0.0);
            delta += to_goal.normalize_or_zero() * force * limb.pull_weight * limb.goal_weight;
        }
        delta /= (max_iterations - iteration) as f32;
        position += delta;
    }
    position - body_position
}

/// Computes the body displacement as the weighted average goal offset.
///
/// Offsets are summed by goal weight; when the weights add up to more than
/// one the sum is divided by the total.
pub fn solve_average(limbs: &[LimbPart]) -> Vec3 {
    let mut total = 0.0;
    let mut delta = Vec3::ZERO;
    for limb in limbs {
        total += limb.goal_weight;
        delta += (limb.goal_position - limb.end_position) * limb.goal_weight;
    }
    if total > 1.0 { delta / total } else { delta }
}

/// Humanoid joints by role.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HumanoidJoints {
    /// Body (hips) joint; displaced by the balance solve.
    pub body: JointId,
    /// Left hip, knee, ankle.
    pub left_leg: [JointId; 3],
    /// Right hip, knee, ankle.
    pub right_leg: [JointId; 3],
    /// Left shoulder, elbow, wrist.
    pub left_arm: [JointId; 3],
    /// Right shoulder, elbow, wrist.
    pub right_arm: [JointId; 3],
    /// Spine joint turned by the look-at body weight.
    pub spine: Option<JointId>,
    /// Head joint.
    pub head: Option<JointId>,
    /// Left eye joint.
    pub left_eye: Option<JointId>,
    /// Right eye joint.
    pub right_eye: Option<JointId>,
}

impl HumanoidJoints {
    /// Looks joints up by their conventional humanoid names
    /// (`Hips`, `LeftUpperLeg`, `LeftLowerLeg`, `LeftFoot`, ..., `Head`).
    pub fn find(skeleton: &Skeleton) -> Result<Self> {
        let required = |name: &str| {
            skeleton
                .find_joint(name)
                .ok_or_else(|| PoseError::InvalidConfig(format!("missing humanoid joint {name}")))
        };
        let limb = |side: &str, upper: &str, lower: &str, end: &str| -> Result<[JointId; 3]> {
            Ok([
                required(&format!("{side}{upper}"))?,
                required(&format!("{side}{lower}"))?,
                required(&format!("{side}{end}"))?,
            ])
        };
        Ok(Self {
            body: required("Hips")?,
            left_leg: limb("Left", "UpperLeg", "LowerLeg", "Foot")?,
            right_leg: limb("Right", "UpperLeg", "LowerLeg", "Foot")?,
            left_arm: limb("Left", "UpperArm", "LowerArm", "Hand")?,
            right_arm: limb("Right", "UpperArm", "LowerArm", "Hand")?,
            spine: skeleton.find_joint("Spine"),
            head: skeleton.find_joint("Head"),
            left_eye: skeleton.find_joint("LeftEye"),
            right_eye: skeleton.find_joint("RightEye"),
        })
    }
}

/// A validated humanoid rig.
#[derive(Debug, Clone, PartialEq)]
pub struct HumanoidRig {
    body: JointId,
    limbs: [TwoBoneChain; 4],
    spine: Option<JointId>,
    head: Option<JointId>,
    eyes: [Option<JointId>; 2],
}

impl HumanoidRig {
    /// Validates the joints and caches limb extensions.
    ///
    /// Every limb must be a direct three-joint chain below the body.
    pub fn new(skeleton: &Skeleton, joints: &HumanoidJoints) -> Result<Self> {
        skeleton.check(joints.body)?;
        let chain = |[top, middle, end]: [JointId; 3]| -> Result<TwoBoneChain> {
            let chain = TwoBoneChain::new(skeleton, top, middle, end)?;
            if top == joints.body || !skeleton.is_ancestor(joints.body, top) {
                return Err(PoseError::UnsupportedTopology {
                    joint: top.0,
                    expected_parent: joints.body.0,
                });
            }
            Ok(chain)
        };
        // Same order as `Goal`.
        let limbs = [
            chain(joints.left_leg)?,
            chain(joints.right_leg)?,
            chain(joints.left_arm)?,
            chain(joints.right_arm)?,
        ];
        for id in [joints.spine, joints.head, joints.left_eye, joints.right_eye]
            .into_iter()
            .flatten()
        {
            skeleton.check(id)?;
        }

        Ok(Self {
            body: joints.body,
            limbs,
            spine: joints.spine,
            head: joints.head,
            eyes: [joints.left_eye, joints.right_eye],
        })
    }

    /// Returns the body joint.
    pub fn body(&self) -> JointId {
        self.body
    }

    /// Returns the limb chain driven by a goal.
    pub fn limb(&self, goal: Goal) -> &TwoBoneChain {
        &self.limbs[goal.index()]
    }

    /// Fails when a rig joint is outside `skeleton`.
    fn check(&self, skeleton: &Skeleton) -> Result<()> {
        skeleton.check(self.body)?;
        for limb in &self.limbs {
            for id in [limb.top, limb.middle, limb.end] {
                skeleton.check(id)?;
            }
        }
        let optional = [self.spine, self.head, self.eyes[0], self.eyes[1]];
        for id in optional.into_iter().flatten() {
            skeleton.check(id)?;
        }
        Ok(())
    }
}

/// Full-body IK operator.
#[derive(Debug, Clone)]
pub struct FullBodyIk {
    rig: HumanoidRig,
    config: FullBodyConfig,
    world: Vec<Transform>,
}

impl FullBodyIk {
    /// Creates the operator and allocates its scratch buffer.
    ///
    /// Fails on an invalid config or when a rig joint is outside `skeleton`.
    pub fn new(skeleton: &Skeleton, rig: HumanoidRig, config: FullBodyConfig) -> Result<Self> {
        if !config.stiffness.is_finite() || config.stiffness < 0.0 {
            return Err(PoseError::InvalidConfig(format!(
                "stiffness must be finite and non-negative, got {}",
                config.stiffness
            )));
        }
        if config.strategy == BodyStrategy::Pull && config.max_pull_iterations == 0 {
            return Err(PoseError::InvalidConfig(
                "pull strategy needs at least one iteration".into(),
            ));
        }
        rig.check(skeleton)?;
        tracing::debug!(
            joints = skeleton.joint_count(),
            strategy = ?config.strategy,
            iterations = config.max_pull_iterations,
            "full-body ik created"
        );
        Ok(Self {
            rig,
            config,
            world: vec![Transform::IDENTITY; skeleton.joint_count()],
        })
    }

    /// Returns the rig.
    pub fn rig(&self) -> &HumanoidRig {
        &self.rig
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FullBodyConfig {
        &self.config
    }

    /// Solves one frame in place on a local pose.
    ///
    /// Returns the world-space body displacement that was applied.
    pub fn solve(
        &mut self,
        skeleton: &Skeleton,
        pose: &mut Pose,
        input: &FullBodyInput,
    ) -> Result<Vec3> {
        PoseError::check_len(self.world.len(), pose.len())?;
        let local = pose.transforms_mut();
        skeleton.compute_world(local, &mut self.world)?;
        let body = self.rig.body;

        if let Some(effector) = input.body.filter(|b| b.weight > 0.0) {
            let current = self.world[body.index()].rotation;
            let rotation = if effector.weight >= 1.0 {
                effector.rotation
            } else {
                current.slerp(effector.rotation, effector.weight)
            };
            self.set_world_rotation(skeleton, local, body, rotation)?;
        }

        let delta = self.body_displacement(input);
        if delta != Vec3::ZERO {
            let parent = skeleton.parent_world(&self.world, body);
            local[body.index()].translation += parent.rotation.inverse() * delta;
            skeleton.compute_world(local, &mut self.world)?;
        }

        for goal in Goal::ALL {
            let Some(effector) = input.effectors[goal.index()] else {
                continue;
            };
            if effector.position_weight <= 0.0 && effector.rotation_weight <= 0.0 {
                continue;
            }
            let target = IkTarget {
                position: effector.position,
                rotation: effector.rotation,
                position_weight: effector.position_weight,
                rotation_weight: effector.rotation_weight,
            };
            let hint = input.hints[goal.index()].map(|h| IkHint {
                position: h.position,
                weight: h.weight,
            });
            apply_two_bone(
                skeleton,
                &self.rig.limbs[goal.index()],
                &mut self.world,
                local,
                &target,
                hint,
            );
            skeleton.compute_world(local, &mut self.world)?;
        }

        if let Some(look) = input.look_at {
            let limit = (1.0 - look.clamp_weight.clamp(0.0, 1.0)) * 180.0;
            let aims = [
                (self.rig.spine, look.body_weight),
                (self.rig.head, look.head_weight),
                (self.rig.eyes[0], look.eyes_weight),
                (self.rig.eyes[1], look.eyes_weight),
            ];
            for (joint, weight) in aims {
                let Some(joint) = joint.filter(|_| weight > 0.0) else {
                    continue;
                };
                let world = self.world[joint.index()];
                let aim = aim_rotation(
                    world.translation,
                    world.rotation,
                    self.config.look_axis.vector(),
                    look.position,
                    -limit,
                    limit,
                );
                let rotation = weighted_rotation(aim, weight) * world.rotation;
                self.set_world_rotation(skeleton, local, joint, rotation)?;
            }
        }

        tracing::trace!(?delta, "full-body solve");
        Ok(delta)
    }

    fn body_displacement(&self, input: &FullBodyInput) -> Vec3 {
        let body_position = self.world[self.rig.body.index()].translation;
        let mut limbs = [LimbPart::default(); 4];
        for goal in Goal::ALL {
            let chain = &self.rig.limbs[goal.index()];
            let end_position = self.world[chain.end.index()].translation;
            let mut part = LimbPart {
                anchor_offset: self.world[chain.top.index()].translation - body_position,
                goal_position: end_position,
                max_extension: chain.max_extension,
                stiffness: self.config.stiffness,
                end_position,
                ..LimbPart::default()
            };
            if let Some(effector) = input.effectors[goal.index()] {
                part.goal_position = effector.position;
                part.goal_weight = effector.position_weight;
                part.pull_weight = effector.pull_weight;
            }
            limbs[goal.index()] = part;
        }

        match self.config.strategy {
            BodyStrategy::Pull => {
                solve_pull(body_position, &limbs, self.config.max_pull_iterations)
            }
            BodyStrategy::Average => solve_average(&limbs),
        }
    }

    fn set_world_rotation(
        &mut self,
        skeleton: &Skeleton,
        local: &mut [Transform],
        joint: JointId,
        rotation: Quat,
    ) -> Result<()> {
        let parent = skeleton.parent_world(&self.world, joint);
        local[joint.index()].rotation = (parent.rotation.inverse() * rotation).normalize();
        skeleton.compute_world(local, &mut self.world)
    }
}
