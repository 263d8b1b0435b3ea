//! Hierarchical joint weight masks.
//!
//! A [`WeightMask`] turns a short list of authored `(joint, weight)`
//! assignments into one weight per joint by copying each assignment's weight
//! onto the whole subtree below its joint. Later assignments overwrite earlier
//! ones where subtrees overlap, and joints no assignment reaches stay at zero.

use crate::error::Result;
use crate::skeleton::{JointId, Skeleton};

/// An authored weight for a joint and its descendants.
#[derive(Debug, Clone)]
struct Assignment {
    weight: f32,
    /// Cached subtree indices (topology never changes).
    members: Vec<usize>,
}

/// Per-joint weights propagated from sparse subtree assignments.
#[derive(Debug, Clone)]
pub struct WeightMask {
    assignments: Vec<Assignment>,
    weights: Vec<f32>,
}

impl WeightMask {
    /// Creates a mask and computes the initial weights.
    ///
    /// Fails if an assignment names a joint outside the skeleton.
    pub fn new(skeleton: &Skeleton, assignments: &[(JointId, f32)]) -> Result<Self> {
        let mut cached = Vec::with_capacity(assignments.len());
        for &(joint, weight) in assignments {
            skeleton.check(joint)?;
            let members = skeleton
                .subtree(joint)
                .into_iter()
                .map(JointId::index)
                .collect();
            cached.push(Assignment { weight, members });
        }

        let mut mask = Self {
            assignments: cached,
            weights: vec![0.0; skeleton.joint_count()],
        };
        mask.update();
        tracing::debug!(
            joints = skeleton.joint_count(),
            assignments = assignments.len(),
            "weight mask created"
        );
        Ok(mask)
    }

    /// Sets the authored weight of an assignment. Unknown indices are ignored.
    ///
    /// Call [`update`](Self::update) afterwards to propagate.
    pub fn set_weight(&mut self, assignment: usize, weight: f32) {
        if let Some(a) = self.assignments.get_mut(assignment) {
            a.weight = weight;
        }
    }

    /// Returns the authored weight of an assignment.
    pub fn weight(&self, assignment: usize) -> Option<f32> {
        self.assignments.get(assignment).map(|a| a.weight)
    }

    /// Returns the number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Recomputes propagated weights in assignment order.
    pub fn update(&mut self) {
        self.weights.fill(0.0);
        for assignment in &self.assignments {
            for &index in &assignment.members {
                self.weights[index] = assignment.weight;
            }
        }
    }

    /// Returns the propagated per-joint weights.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoseError;
    use crate::skeleton::{Joint, SkeletonBuilder};

    /// root -> spine -> (arm -> hand), (head)
    fn skeleton() -> Skeleton {
        let mut b = SkeletonBuilder::new();
        let root = b.add_joint(Joint::new("root")).unwrap();
        let spine = b.add_joint(Joint::new("spine").with_parent(root)).unwrap();
        let arm = b.add_joint(Joint::new("arm").with_parent(spine)).unwrap();
        b.add_joint(Joint::new("hand").with_parent(arm)).unwrap();
        b.add_joint(Joint::new("head").with_parent(spine)).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_root_covers_everything() {
        let skel = skeleton();
        let mask = WeightMask::new(&skel, &[(JointId(0), 1.0)]).unwrap();
        assert!(mask.weights().iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_leaf_only_affects_leaf() {
        let skel = skeleton();
        let hand = skel.find_joint("hand").unwrap();
        let mask = WeightMask::new(&skel, &[(hand, 0.3)]).unwrap();
        assert_eq!(mask.weights(), &[0.0, 0.0, 0.0, 0.3, 0.0]);
    }

    #[test]
    fn test_last_write_wins() {
        let skel = skeleton();
        let spine = skel.find_joint("spine").unwrap();
        let arm = skel.find_joint("arm").unwrap();

        let mask = WeightMask::new(&skel, &[(spine, 0.5), (arm, 1.0)]).unwrap();
        assert_eq!(mask.weights(), &[0.0, 0.5, 1.0, 1.0, 0.5]);

        // Reversed order: the spine subtree overwrites the arm.
        let mask = WeightMask::new(&skel, &[(arm, 1.0), (spine, 0.5)]).unwrap();
        assert_eq!(mask.weights(), &[0.0, 0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_update_after_weight_change() {
        let skel = skeleton();
        let arm = skel.find_joint("arm").unwrap();
        let mut mask = WeightMask::new(&skel, &[(arm, 1.0)]).unwrap();
        mask.set_weight(0, 0.25);
        mask.set_weight(7, 0.9);
        assert_eq!(mask.weights()[arm.index()], 1.0);
        mask.update();
        assert_eq!(mask.weights(), &[0.0, 0.0, 0.25, 0.25, 0.0]);
        assert_eq!(mask.weight(0), Some(0.25));
    }

    #[test]
    fn test_out_of_range_joint() {
        let skel = skeleton();
        let err = WeightMask::new(&skel, &[(JointId(10), 1.0)]).unwrap_err();
        assert_eq!(
            err,
            PoseError::JointOutOfRange {
                joint: 10,
                count: 5
            }
        );
    }
}
