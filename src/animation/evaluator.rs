//! Per-frame joint matrix evaluation.
//!
//! For each visible animated object the evaluator samples its current
//! animation A (and, during a transition, the next animation B), blends the
//! two with a smoothstep of the transition interval, walks the rig nodes in
//! topological order composing local TRS transforms up the hierarchy, and
//! finally produces `joint_matrices[j] = node_hierarchical_to_object[n_j] *
//! inverse_bind[n_j]` for upload to the joint table.
//!
//! Keyframe lookups are hoisted: each time accessor used by an active clip
//! is resolved once per object per frame into a `(i0, i1, frac)` triple.
//!
//! Work is distributed over the worker pool through a single atomic
//! next-index counter; each worker keeps scratch vectors to avoid per-object
//! allocation.

use glam::{Mat4, Quat, Vec3};

use crate::animation::clip::{AnimationClip, KeyFrameLoc};
use crate::animation::rig::AnimationData;
use crate::utils::task_pool::TaskPool;

/// Smoothstep of `t` over `[e0, e1]`, clamped.
#[inline]
#[must_use]
pub fn smoothstep(e0: f32, e1: f32, t: f32) -> f32 {
    if e1 <= e0 {
        return if t >= e1 { 1.0 } else { 0.0 };
    }
    let x = ((t - e0) / (e1 - e0)).clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

// ============================================================================
// Per-object animation state
// ============================================================================

/// Procedural overrides applied during the node walk.
#[derive(Debug, Clone)]
pub struct NodeProcedural {
    /// Replaces the animated rotation when set (the head-look override).
    pub rotation_override: Option<Quat>,
    /// Post-multiplied onto the node's local transform.
    pub procedural_transform: Mat4,
}

impl Default for NodeProcedural {
    fn default() -> Self {
        Self {
            rotation_override: None,
            procedural_transform: Mat4::IDENTITY,
        }
    }
}

/// Mutable animation state owned by one object.
#[derive(Debug, Clone, Default)]
pub struct AnimationState {
    /// Clip index of the current animation A.
    pub current_anim: Option<usize>,
    /// Clip index of the next animation B, blended in over the transition
    /// interval.
    pub next_anim: Option<usize>,
    pub transition_start_time: f32,
    pub transition_end_time: f32,

    /// Per-node procedural overrides; empty means none.
    pub node_procedural: Vec<NodeProcedural>,

    /// Evaluated joint matrices, uploaded to the joint table after the
    /// worker join.
    pub joint_matrices: Vec<Mat4>,

    // Caches for downstream queries (attachment points, head orientation).
    pub node_hierarchical_to_object: Vec<Mat4>,
    pub last_pre_proc_to_object: Vec<Mat4>,
    pub last_rot: Vec<Quat>,
}

impl AnimationState {
    /// Transition fraction at `time`: 0 = pure A, 1 = pure B.
    #[must_use]
    pub fn transition_frac(&self, time: f32) -> f32 {
        if self.next_anim.is_none() {
            return 0.0;
        }
        smoothstep(self.transition_start_time, self.transition_end_time, time)
    }
}

// ============================================================================
// Scratch
// ============================================================================

/// Per-worker scratch; reused across objects to avoid allocation.
#[derive(Default)]
pub struct EvalScratch {
    key_frame_locs_a: Vec<KeyFrameLoc>,
    key_frame_locs_b: Vec<KeyFrameLoc>,
    node_matrices: Vec<Mat4>,
}

// ============================================================================
// Evaluation
// ============================================================================

fn resolve_accessor_locs(clip: &AnimationClip, time: f32, out: &mut Vec<KeyFrameLoc>) {
    out.clear();
    out.extend(clip.accessors.iter().map(|a| a.locate(time)));
}

struct SampledTrs {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

fn sample_node(
    clip: &AnimationClip,
    locs: &[KeyFrameLoc],
    node: usize,
    defaults: &SampledTrs,
) -> SampledTrs {
    let Some(channels) = clip.node_channels.get(node) else {
        return SampledTrs {
            translation: defaults.translation,
            rotation: defaults.rotation,
            scale: defaults.scale,
        };
    };
    let mut out = SampledTrs {
        translation: defaults.translation,
        rotation: defaults.rotation,
        scale: defaults.scale,
    };
    if let Some(ci) = channels.translation {
        let ch = &clip.channels[ci];
        if let Some(v) = ch.sample_vector(locs[ch.accessor]) {
            out.translation = v;
        }
    }
    if let Some(ci) = channels.rotation {
        let ch = &clip.channels[ci];
        if let Some(q) = ch.sample_rotation(locs[ch.accessor]) {
            out.rotation = q;
        }
    }
    if let Some(ci) = channels.scale {
        let ch = &clip.channels[ci];
        if let Some(v) = ch.sample_vector(locs[ch.accessor]) {
            out.scale = v;
        }
    }
    out
}

#[inline]
fn nlerp(a: Quat, mut b: Quat, t: f32) -> Quat {
    if a.dot(b) < 0.0 {
        b = -b;
    }
    (a * (1.0 - t) + b * t).normalize()
}

/// Evaluates all joint matrices for one object at `time`.
///
/// Writes `state.joint_matrices` (resized to the rig's joint count) and the
/// per-node caches.
pub fn evaluate_object(
    data: &AnimationData,
    state: &mut AnimationState,
    time: f32,
    scratch: &mut EvalScratch,
) {
    let rig = &data.rig;
    let num_nodes = rig.num_nodes();

    let clip_a = state.current_anim.and_then(|i| data.clips.get(i));
    let clip_b = state.next_anim.and_then(|i| data.clips.get(i));
    let frac = state.transition_frac(time);

    // When the blend sits at an endpoint the other clip's work is skipped
    // entirely.
    let (clip_a, clip_b) = if frac <= 0.0 {
        (clip_a, None)
    } else if frac >= 1.0 {
        (clip_b, None)
    } else {
        (clip_a, clip_b)
    };
    let frac = if clip_b.is_some() { frac } else { 0.0 };

    if let Some(c) = clip_a {
        resolve_accessor_locs(c, time % c.length.max(1e-6), &mut scratch.key_frame_locs_a);
    }
    if let Some(c) = clip_b {
        resolve_accessor_locs(c, time % c.length.max(1e-6), &mut scratch.key_frame_locs_b);
    }

    scratch.node_matrices.clear();
    scratch.node_matrices.resize(num_nodes, Mat4::IDENTITY);
    state
        .node_hierarchical_to_object
        .resize(num_nodes, Mat4::IDENTITY);
    state
        .last_pre_proc_to_object
        .resize(num_nodes, Mat4::IDENTITY);
    state.last_rot.resize(num_nodes, Quat::IDENTITY);

    for (i, node) in rig.nodes.iter().enumerate() {
        let defaults = SampledTrs {
            translation: node.default_translation,
            rotation: node.default_rotation,
            scale: node.default_scale,
        };

        let trs_a = clip_a.map_or_else(
            || SampledTrs {
                translation: defaults.translation,
                rotation: defaults.rotation,
                scale: defaults.scale,
            },
            |c| sample_node(c, &scratch.key_frame_locs_a, i, &defaults),
        );

        let (mut translation, mut rotation, mut scale) =
            (trs_a.translation, trs_a.rotation, trs_a.scale);
        if let Some(c) = clip_b {
            let trs_b = sample_node(c, &scratch.key_frame_locs_b, i, &defaults);
            translation = translation.lerp(trs_b.translation, frac);
            rotation = nlerp(rotation, trs_b.rotation, frac);
            scale = scale.lerp(trs_b.scale, frac);
        }

        // Procedural rotation overrides the animated rotation wholesale.
        if let Some(proc_data) = state.node_procedural.get(i)
            && let Some(over) = proc_data.rotation_override
        {
            rotation = over;
        }
        state.last_rot[i] = rotation;

        let local = Mat4::from_scale_rotation_translation(scale, rotation, translation);
        let parented = match node.parent {
            Some(p) => {
                let adjusted = match &node.retarget_adjustment {
                    Some(adj) => *adj * local,
                    None => local,
                };
                scratch.node_matrices[p] * adjusted
            }
            None => local,
        };
        state.last_pre_proc_to_object[i] = parented;

        let final_matrix = match state.node_procedural.get(i) {
            Some(proc_data) => parented * proc_data.procedural_transform,
            None => parented,
        };
        scratch.node_matrices[i] = final_matrix;
        state.node_hierarchical_to_object[i] = final_matrix;
    }

    state.joint_matrices.resize(rig.num_joints(), Mat4::IDENTITY);
    for (j, &node_i) in rig.joint_nodes.iter().enumerate() {
        state.joint_matrices[j] =
            scratch.node_matrices[node_i] * rig.inverse_bind_matrices[node_i];
    }
}

// ============================================================================
// Parallel driver
// ============================================================================

/// One unit of animation work: the state is moved out of its object for the
/// duration of the parallel section and put back afterwards.
pub struct AnimationWorkItem {
    pub data: std::sync::Arc<AnimationData>,
    pub state: Box<AnimationState>,
}

/// Evaluates a batch of work items across the pool via one shared next-index
/// counter, joining before return.
pub fn evaluate_parallel(pool: &TaskPool, items: &mut [parking_lot::Mutex<AnimationWorkItem>], time: f32) {
    pool.for_each_index(
        items.len(),
        EvalScratch::default,
        |scratch, i| {
            let mut item = items[i].lock();
            let AnimationWorkItem { data, state } = &mut *item;
            evaluate_object(data, state, time, scratch);
        },
    );
}
