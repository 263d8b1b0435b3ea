//! Rigid transform type for joint poses.

use glam::{Quat, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid transform (translation and rotation).
///
/// Joint poses carry no scale; the rotation is expected to be a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform {
    /// Position offset.
    pub translation: Vec3,
    /// Rotation quaternion.
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Identity transform (no translation or rotation).
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Creates a new transform.
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Creates a transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Creates a transform with only rotation.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Combines two transforms (self then other).
    ///
    /// With `self` a parent's world transform and `other` a child's local
    /// transform, the result is the child's world transform.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * other.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Returns the inverse transform.
    pub fn inverse(&self) -> Transform {
        let inv_rotation = self.rotation.inverse();
        Transform {
            translation: inv_rotation * -self.translation,
            rotation: inv_rotation,
        }
    }

    /// Expresses a world transform relative to this (parent) transform.
    pub fn to_local(&self, world: &Transform) -> Transform {
        let inv_rotation = self.rotation.inverse();
        Transform {
            translation: inv_rotation * (world.translation - self.translation),
            rotation: inv_rotation * world.rotation,
        }
    }

    /// Transforms a point.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * point
    }

    /// Transforms a vector (ignores translation).
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Interpolates between two transforms.
    ///
    /// Translation is lerped and rotation slerped. `t <= 0` returns `self`
    /// and `t >= 1` returns `other` bit for bit.
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        if t <= 0.0 {
            *self
        } else if t >= 1.0 {
            *other
        } else {
            Transform {
                translation: self.translation.lerp(other.translation, t),
                rotation: self.rotation.slerp(other.rotation, t),
            }
        }
    }

    /// Returns true if both transforms are within `epsilon` of each other.
    pub fn abs_diff_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, epsilon)
            && (self.rotation.abs_diff_eq(other.rotation, epsilon)
                || self.rotation.abs_diff_eq(-other.rotation, epsilon))
    }
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
///
/// Inputs need not be normalized. Returns identity when either is zero.
pub(crate) fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}

/// Lerps two vectors with exact endpoints.
pub(crate) fn lerp_exact(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        a
    } else if t >= 1.0 {
        b
    } else {
        a.lerp(b, t)
    }
}

/// Slerps from identity toward `rotation` by `weight`, with exact endpoints.
pub(crate) fn weighted_rotation(rotation: Quat, weight: f32) -> Quat {
    if weight <= 0.0 {
        Quat::IDENTITY
    } else if weight >= 1.0 {
        rotation
    } else {
        Quat::IDENTITY.slerp(rotation, weight)
    }
}
