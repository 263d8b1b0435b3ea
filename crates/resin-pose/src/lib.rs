//! Per-frame pose operators for skeletal animation.
//!
//! Each operator is created once for a [`Skeleton`], allocates its buffers up
//! front, and is then stepped every frame over a local-space [`Pose`]:
//!
//! - [`Mixer`] blends two poses with per-joint weights, optionally from a
//!   [`WeightMask`].
//! - [`TwoBoneIk`] solves a single limb analytically.
//! - [`FullBodyIk`] balances the body between four limb goals, then solves
//!   the limbs and a look-at.
//! - [`LookAt`] aims a single joint.
//! - [`VelocityTracker`] differentiates joint velocities between frames.
//! - [`DampingChain`] runs a spring chain toward its rest pose.
//! - [`PhysicsMixer`] hands a character to a ragdoll and blends it back.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use rhizome_resin_pose::{IkTarget, Joint, SkeletonBuilder, TwoBoneChain, TwoBoneIk};
//!
//! let mut builder = SkeletonBuilder::new();
//! let shoulder = builder.add_joint(Joint::new("shoulder"))?;
//! let elbow = builder.add_joint(
//!     Joint::new("elbow")
//!         .with_parent(shoulder)
//!         .with_translation(Vec3::new(1.0, 0.0, 0.0)),
//! )?;
//! let wrist = builder.add_joint(
//!     Joint::new("wrist")
//!         .with_parent(elbow)
//!         .with_translation(Vec3::new(1.0, 0.0, 0.0)),
//! )?;
//! let skeleton = builder.build()?;
//!
//! let chain = TwoBoneChain::new(&skeleton, shoulder, elbow, wrist)?;
//! let mut ik = TwoBoneIk::new(&skeleton, chain)?;
//! let mut pose = skeleton.rest_pose();
//!
//! let target = IkTarget::position(Vec3::new(1.0, 1.0, 0.0));
//! ik.solve(&skeleton, &mut pose, Some(&target), None)?;
//!
//! let reached = skeleton.world_of(pose.transforms(), wrist).translation;
//! assert!((reached - target.position).length() < 1e-4);
//! # Ok::<(), rhizome_resin_pose::PoseError>(())
//! ```

mod blend;
mod damping;
mod error;
mod full_body;
mod ik;
mod look_at;
mod mask;
mod pose;
mod ragdoll;
mod skeleton;
mod transform;
mod velocity;

pub use blend::{Mixer, MixerConfig, blend_poses};
pub use damping::{DampingChain, DampingConfig};
pub use error::{PoseError, Result};
pub use full_body::{
    BodyEffector, BodyStrategy, Effector, FullBodyConfig, FullBodyIk, FullBodyInput, Goal, Hint,
    HintEffector, HumanoidJoints, HumanoidRig, LimbPart, LookAtEffector, solve_average, solve_pull,
};
pub use ik::{
    IkHint, IkTarget, TwoBoneChain, TwoBoneIk, TwoBoneInput, TwoBoneSolution, solve_two_bone,
};
pub use look_at::{Axis, LookAt, LookAtConfig, aim_rotation};
pub use mask::WeightMask;
pub use pose::Pose;
pub use ragdoll::{PhysicsMixer, PhysicsMixerConfig, RagdollState, VelocityHandoff};
pub use skeleton::{Joint, JointId, Skeleton, SkeletonBuilder};
pub use transform::Transform;
pub use velocity::{VelocityTracker, angular_displacement, differentiate};
