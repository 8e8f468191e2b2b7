//! Skeleton rigs.
//!
//! Nodes are stored in a precomputed topological order (parents strictly
//! before children) so the evaluator accumulates hierarchy matrices in one
//! forward walk.

use glam::{Mat4, Quat, Vec3};

use crate::animation::clip::AnimationClip;

/// One node of the joint tree.
#[derive(Debug, Clone)]
pub struct RigNode {
    /// Index of the parent node; `None` for roots. Always less than this
    /// node's own index.
    pub parent: Option<usize>,
    pub default_translation: Vec3,
    pub default_rotation: Quat,
    pub default_scale: Vec3,
    /// Optional retarget adjustment applied between the parent's accumulated
    /// matrix and this node's local transform.
    pub retarget_adjustment: Option<Mat4>,
}

impl Default for RigNode {
    fn default() -> Self {
        Self {
            parent: None,
            default_translation: Vec3::ZERO,
            default_rotation: Quat::IDENTITY,
            default_scale: Vec3::ONE,
            retarget_adjustment: None,
        }
    }
}

/// The joint tree plus skinning data.
#[derive(Debug, Clone)]
pub struct AnimationRig {
    /// Topologically ordered nodes.
    pub nodes: Vec<RigNode>,
    /// Node index of each skinning joint.
    pub joint_nodes: Vec<usize>,
    /// Inverse bind matrix per node (identity for non-joint nodes).
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl AnimationRig {
    #[inline]
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.joint_nodes.len()
    }

    /// Checks the topological-order invariant.
    #[must_use]
    pub fn is_topologically_ordered(&self) -> bool {
        self.nodes
            .iter()
            .enumerate()
            .all(|(i, n)| n.parent.is_none_or(|p| p < i))
    }
}

/// A rig together with its clips; shared between every object using the
/// mesh that carries it.
#[derive(Debug, Clone)]
pub struct AnimationData {
    pub rig: AnimationRig,
    pub clips: Vec<AnimationClip>,
}

impl AnimationData {
    #[must_use]
    pub fn find_clip(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.name == name)
    }
}
