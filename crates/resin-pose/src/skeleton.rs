//! Skeleton and joint types.
//!
//! A [`Skeleton`] is validated once on construction and never changes
//! afterwards: joints are stored so that every parent precedes its children,
//! which lets world transforms be computed in a single root-to-tip pass.

use crate::error::{PoseError, Result};
use crate::pose::Pose;
use crate::transform::Transform;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A joint identifier (index into skeleton).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointId(pub u32);

impl JointId {
    /// Creates a new joint ID.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A joint in a skeleton.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Joint {
    /// Human-readable name.
    pub name: String,
    /// Parent joint (None for root).
    pub parent: Option<JointId>,
    /// Rest transform in parent space.
    pub rest: Transform,
}

impl Joint {
    /// Creates a root joint at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            rest: Transform::IDENTITY,
        }
    }

    /// Sets the parent joint.
    pub fn with_parent(mut self, parent: JointId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the rest transform.
    pub fn with_rest(mut self, rest: Transform) -> Self {
        self.rest = rest;
        self
    }

    /// Sets only the rest translation.
    pub fn with_translation(mut self, translation: glam::Vec3) -> Self {
        self.rest.translation = translation;
        self
    }
}

/// Incrementally builds a [`Skeleton`].
#[derive(Debug, Clone, Default)]
pub struct SkeletonBuilder {
    joints: Vec<Joint>,
}

impl SkeletonBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a joint. Its parent must already have been added.
    pub fn add_joint(&mut self, joint: Joint) -> Result<JointId> {
        let id = JointId(self.joints.len() as u32);
        if let Some(parent) = joint.parent {
            if parent.0 >= id.0 {
                return Err(PoseError::ParentOutOfOrder {
                    joint: id.0,
                    parent: parent.0,
                });
            }
        }
        self.joints.push(joint);
        Ok(id)
    }

    /// Finishes the skeleton.
    pub fn build(self) -> Result<Skeleton> {
        Skeleton::from_joints(self.joints)
    }
}

/// An immutable joint hierarchy.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Skeleton {
    joints: Vec<Joint>,
}

impl Skeleton {
    /// Creates a skeleton from joints ordered parents-first.
    pub fn from_joints(joints: Vec<Joint>) -> Result<Self> {
        if joints.is_empty() {
            return Err(PoseError::EmptySkeleton);
        }
        for (i, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                if parent.index() >= i {
                    return Err(PoseError::ParentOutOfOrder {
                        joint: i as u32,
                        parent: parent.0,
                    });
                }
            }
        }
        tracing::debug!(joints = joints.len(), "skeleton created");
        Ok(Self { joints })
    }

    /// Returns the number of joints.
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Returns a joint by ID.
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.index())
    }

    /// Returns all joints.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Returns the parent of a joint.
    pub fn parent(&self, id: JointId) -> Option<JointId> {
        self.joint(id).and_then(|j| j.parent)
    }

    /// Returns true if `id` refers to a joint of this skeleton.
    pub fn contains(&self, id: JointId) -> bool {
        id.index() < self.joints.len()
    }

    /// Returns an error unless `id` refers to a joint of this skeleton.
    pub fn check(&self, id: JointId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(PoseError::JointOutOfRange {
                joint: id.0,
                count: self.joints.len(),
            })
        }
    }

    /// Finds a joint by name.
    pub fn find_joint(&self, name: &str) -> Option<JointId> {
        self.joints
            .iter()
            .position(|j| j.name == name)
            .map(|i| JointId(i as u32))
    }

    /// Returns children of a joint.
    pub fn children(&self, parent: JointId) -> Vec<JointId> {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parent == Some(parent))
            .map(|(i, _)| JointId(i as u32))
            .collect()
    }

    /// Returns `root` and all of its descendants, in index order.
    pub fn subtree(&self, root: JointId) -> Vec<JointId> {
        if !self.contains(root) {
            return Vec::new();
        }
        let start = root.index();
        let mut inside = vec![false; self.joints.len() - start];
        inside[0] = true;
        let mut result = vec![root];
        for i in start + 1..self.joints.len() {
            // Parents precede children, so a parent at or after `start` has
            // already been classified.
            if let Some(parent) = self.joints[i].parent {
                if parent.index() >= start && inside[parent.index() - start] {
                    inside[i - start] = true;
                    result.push(JointId(i as u32));
                }
            }
        }
        result
    }

    /// Returns true if `ancestor` is `joint` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: JointId, joint: JointId) -> bool {
        let mut current = Some(joint);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Creates a pose holding the rest transforms.
    pub fn rest_pose(&self) -> Pose {
        let mut pose = Pose::identity(self.joint_count());
        for (slot, joint) in pose.transforms_mut().iter_mut().zip(&self.joints) {
            *slot = joint.rest;
        }
        pose
    }

    /// Computes world transforms from local transforms in one pass.
    pub fn compute_world(&self, local: &[Transform], world: &mut [Transform]) -> Result<()> {
        PoseError::check_len(self.joints.len(), local.len())?;
        PoseError::check_len(self.joints.len(), world.len())?;
        for (i, joint) in self.joints.iter().enumerate() {
            world[i] = match joint.parent {
                Some(parent) => world[parent.index()].then(&local[i]),
                None => local[i],
            };
        }
        Ok(())
    }

    /// Converts world transforms back to parent-relative transforms.
    pub fn compute_local(&self, world: &[Transform], local: &mut [Transform]) -> Result<()> {
        PoseError::check_len(self.joints.len(), local.len())?;
        PoseError::check_len(self.joints.len(), world.len())?;
        for (i, joint) in self.joints.iter().enumerate() {
            local[i] = match joint.parent {
                Some(parent) => world[parent.index()].to_local(&world[i]),
                None => world[i],
            };
        }
        Ok(())
    }

    /// Computes the world transform of a single joint by walking its parents.
    pub fn world_of(&self, local: &[Transform], id: JointId) -> Transform {
        let mut transform = local.get(id.index()).copied().unwrap_or_default();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if let Some(parent_local) = local.get(parent.index()) {
                transform = parent_local.then(&transform);
            }
            current = self.parent(parent);
        }
        transform
    }

    /// World transform of a joint's parent, identity for roots.
    pub(crate) fn parent_world(&self, world: &[Transform], id: JointId) -> Transform {
        self.parent(id)
            .and_then(|p| world.get(p.index()).copied())
            .unwrap_or(Transform::IDENTITY)
    }

    /// Rest-pose world transform of a joint.
    pub fn rest_world(&self, id: JointId) -> Transform {
        let rest: Vec<Transform> = self.joints.iter().map(|j| j.rest).collect();
        self.world_of(&rest, id)
    }
}
