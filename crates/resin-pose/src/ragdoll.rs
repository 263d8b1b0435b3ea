//! Physics-to-animation hand-off.
//!
//! [`PhysicsMixer`] drives a character through three states. While animated
//! the output follows animation. While simulated an external rigid-body
//! simulation owns the pose for a fixed time. While blending the output
//! crossfades from the last simulated pose back to animation. Joint
//! velocities are tracked on the output pose in every state, so a trigger
//! right after a blend still hands off current velocities.
//!
//! ```text
//! Animated --trigger--> Simulated --simulation_time--> Blending --blend_time--> Animated
//! ```

use crate::blend::blend_poses;
use crate::error::{PoseError, Result};
use crate::pose::Pose;
use crate::skeleton::Skeleton;
use crate::velocity::VelocityTracker;
use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Current phase of a [`PhysicsMixer`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RagdollState {
    /// Output follows animation.
    #[default]
    Animated,
    /// Output follows the physics pose.
    Simulated {
        /// Seconds since the simulation started.
        elapsed: f32,
    },
    /// Output crossfades from the last physics pose to animation.
    Blending {
        /// Seconds since the blend started.
        elapsed: f32,
        /// Blend length in seconds.
        duration: f32,
    },
}

/// Timing of a [`PhysicsMixer`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicsMixerConfig {
    /// Seconds the simulation owns the pose.
    pub simulation_time: f32,
    /// Seconds spent blending back to animation.
    pub blend_time: f32,
}

impl Default for PhysicsMixerConfig {
    fn default() -> Self {
        Self {
            simulation_time: 1.0,
            blend_time: 0.4,
        }
    }
}

/// Joint velocities handed to the rigid bodies when simulation starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityHandoff<'a> {
    /// Linear velocity per joint.
    pub velocities: &'a [Vec3],
    /// Angular velocity per joint.
    pub angular_velocities: &'a [Vec3],
}

/// Switches a character between animation and an external ragdoll.
#[derive(Debug, Clone)]
pub struct PhysicsMixer {
    config: PhysicsMixerConfig,
    state: RagdollState,
    tracker: VelocityTracker,
    snapshot: Pose,
}

impl PhysicsMixer {
    /// Creates a mixer in the animated state.
    pub fn new(skeleton: &Skeleton, config: PhysicsMixerConfig) -> Result<Self> {
        for (name, value) in [
            ("simulation_time", config.simulation_time),
            ("blend_time", config.blend_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PoseError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(Self {
            config,
            state: RagdollState::Animated,
            tracker: VelocityTracker::new(skeleton),
            snapshot: skeleton.rest_pose(),
        })
    }

    /// Returns the current state.
    pub fn state(&self) -> RagdollState {
        self.state
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PhysicsMixerConfig {
        &self.config
    }

    /// Returns the velocity tracker fed by the output pose.
    pub fn tracker(&self) -> &VelocityTracker {
        &self.tracker
    }

    /// Weight of the animated pose in the output (0 = physics, 1 = animation).
    pub fn animation_weight(&self) -> f32 {
        match self.state {
            RagdollState::Animated => 1.0,
            RagdollState::Simulated { .. } => 0.0,
            RagdollState::Blending { elapsed, duration } => blend_weight(elapsed, duration),
        }
    }

    /// Starts the simulation.
    ///
    /// Returns the last tracked velocities for the rigid bodies, or `None`
    /// when the mixer is not in the animated state.
    pub fn trigger(&mut self) -> Option<VelocityHandoff<'_>> {
        if self.state != RagdollState::Animated {
            return None;
        }
        self.state = RagdollState::Simulated { elapsed: 0.0 };
        self.snapshot.clone_from(self.tracker.local_pose());
        tracing::debug!(
            simulation_time = self.config.simulation_time,
            "ragdoll simulation started"
        );
        Some(VelocityHandoff {
            velocities: self.tracker.velocities(),
            angular_velocities: self.tracker.angular_velocities(),
        })
    }

    /// Advances the mixer by `dt` and writes the output pose.
    ///
    /// `physics` is the pose read back from the rigid bodies; while simulated
    /// without one, the last known pose is held.
    pub fn tick(
        &mut self,
        skeleton: &Skeleton,
        dt: f32,
        animated: &Pose,
        physics: Option<&Pose>,
        out: &mut Pose,
    ) -> Result<()> {
        PoseError::check_len(self.snapshot.len(), animated.len())?;
        PoseError::check_len(self.snapshot.len(), out.len())?;
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        match self.state {
            RagdollState::Animated => out.copy_from(animated)?,
            RagdollState::Simulated { elapsed } => {
                if let Some(physics) = physics {
                    self.snapshot.copy_from(physics)?;
                }
                out.copy_from(&self.snapshot)?;

                let elapsed = elapsed + dt;
                self.state = if elapsed < self.config.simulation_time {
                    RagdollState::Simulated { elapsed }
                } else if self.config.blend_time > 0.0 {
                    tracing::debug!(blend_time = self.config.blend_time, "blending to animation");
                    RagdollState::Blending {
                        elapsed: 0.0,
                        duration: self.config.blend_time,
                    }
                } else {
                    self.finish()
                };
            }
            RagdollState::Blending { elapsed, duration } => {
                blend_poses(&self.snapshot, animated, blend_weight(elapsed, duration), None, out)?;

                let elapsed = elapsed + dt;
                self.state = if elapsed > duration {
                    self.finish()
                } else {
                    RagdollState::Blending { elapsed, duration }
                };
            }
        }
        self.tracker.track(skeleton, out, dt)?;
        Ok(())
    }

    fn finish(&self) -> RagdollState {
        tracing::debug!("back to animation");
        RagdollState::Animated
    }
}

fn blend_weight(elapsed: f32, duration: f32) -> f32 {
    if duration > 0.0 {
        (elapsed / duration).clamp(0.0, 1.0)
    } else {
        1.0
    }
}
