//! Error types for resin-pose.
//!
//! Errors are only produced at setup time or by explicit operations with a
//! precondition (such as differentiation over a positive time step). Per-frame
//! solving never fails on missing effectors; those are skipped instead.

use thiserror::Error;

/// Result alias for pose operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Errors that can occur while setting up or driving a pose operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseError {
    /// The skeleton has no joints.
    #[error("skeleton has no joints")]
    EmptySkeleton,

    /// A joint references a parent that does not come before it.
    #[error("joint {joint} has parent {parent}, parents must precede their children")]
    ParentOutOfOrder {
        /// Joint index.
        joint: u32,
        /// Parent index.
        parent: u32,
    },

    /// A joint reference is outside the skeleton.
    #[error("joint {joint} out of range for skeleton with {count} joints")]
    JointOutOfRange {
        /// Joint index.
        joint: u32,
        /// Number of joints in the skeleton.
        count: usize,
    },

    /// A pose buffer does not match the operator's joint count.
    #[error("pose has {got} transforms, expected {expected}")]
    PoseLength {
        /// Expected joint count.
        expected: usize,
        /// Actual buffer length.
        got: usize,
    },

    /// A time step that must be positive was not.
    #[error("delta time must be positive and finite, got {0}")]
    InvalidDeltaTime(f32),

    /// Joints do not form the chain an operator needs.
    #[error("unsupported topology: joint {joint} is not a child of {expected_parent}")]
    UnsupportedTopology {
        /// Offending joint index.
        joint: u32,
        /// Joint that was expected to be its parent.
        expected_parent: u32,
    },

    /// Other configuration problem detected at setup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PoseError {
    /// Checks that a pose buffer has the expected length.
    pub(crate) fn check_len(expected: usize, got: usize) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(PoseError::PoseLength { expected, got })
        }
    }
}
