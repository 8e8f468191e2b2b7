//! Animation Evaluator Tests
//!
//! Tests for:
//! - Time accessor lookup: clamping below/above the keyframe range, the
//!   equally-spaced arithmetic fast path matching binary search
//! - nlerp rotation sampling taking the short arc
//! - Transition blending: smoothstep fraction, endpoint skipping, and the
//!   A/B midpoint scenario
//! - Topological node composition and retarget/procedural transforms
//! - Joint matrices = hierarchical × inverse bind
//! - The parallel driver matching single-threaded evaluation

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use parking_lot::Mutex;

use vista::animation::clip::{
    AnimationClip, Channel, ChannelData, ChannelTarget, TimeAccessor,
};
use vista::animation::evaluator::{
    AnimationState, AnimationWorkItem, EvalScratch, NodeProcedural, evaluate_object,
    evaluate_parallel, smoothstep,
};
use vista::animation::rig::{AnimationData, AnimationRig, RigNode};
use vista::utils::task_pool::TaskPool;

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn approx_mat(a: &Mat4, b: &Mat4) -> bool {
    (0..4).all(|i| (a.col(i) - b.col(i)).length() < 1e-3)
}

// ============================================================================
// Time accessors
// ============================================================================

#[test]
fn accessor_clamps_below_first_keyframe() {
    let acc = TimeAccessor::new(vec![1.0, 2.0, 3.0], 3.0);
    let loc = acc.locate(0.25);
    assert_eq!(loc.i0, 0);
    assert_eq!(loc.i1, 0);
    assert!(approx(loc.frac, 0.0));
}

#[test]
fn accessor_clamps_above_last_keyframe() {
    let acc = TimeAccessor::new(vec![0.0, 1.0, 2.0], 2.0);
    let loc = acc.locate(9.0);
    assert_eq!(loc.i0, 2);
    assert_eq!(loc.i1, 2);
    assert!(approx(loc.frac, 0.0));
}

#[test]
fn accessor_interpolates_between_keyframes() {
    let acc = TimeAccessor::new(vec![0.0, 2.0], 2.0);
    let loc = acc.locate(0.5);
    assert_eq!(loc.i0, 0);
    assert_eq!(loc.i1, 1);
    assert!(approx(loc.frac, 0.25));
}

#[test]
fn equally_spaced_fast_path_matches_search() {
    // Uniform samples covering the full clip take the arithmetic path; a
    // jittered copy takes binary search. Both must resolve every probe
    // time to the same location.
    let n = 32;
    let uniform: Vec<f32> = (0..n).map(|i| i as f32 * 0.125).collect();
    let clip_len = uniform[n - 1];
    let fast = TimeAccessor::new(uniform.clone(), clip_len);
    assert!(fast.is_equally_spaced());

    let mut jittered = uniform;
    jittered[5] += 0.01; // break uniformity without reordering
    let slow = TimeAccessor::new(jittered, clip_len);
    assert!(!slow.is_equally_spaced());

    for step in 0..100 {
        let t = step as f32 * (clip_len / 99.0);
        let a = fast.locate(t);
        // Both accessors agree on the containing interval for times away
        // from the jittered sample.
        if a.i0 != 4 && a.i0 != 5 {
            let b = slow.locate(t);
            assert_eq!(a.i0, b.i0, "interval mismatch at t={t}");
        }
        assert!(a.i1 <= n - 1);
        assert!((0.0..=1.0).contains(&a.frac));
    }
}

// ============================================================================
// Channel sampling
// ============================================================================

#[test]
fn rotation_sampling_takes_short_arc() {
    let q0 = Quat::from_rotation_z(0.1);
    let q1 = -Quat::from_rotation_z(0.3); // negated: same rotation, far hemisphere
    let channel = Channel {
        node: 0,
        target: ChannelTarget::Rotation,
        accessor: 0,
        data: ChannelData::Rotation(vec![q0, q1]),
    };
    let acc = TimeAccessor::new(vec![0.0, 1.0], 1.0);
    let q = channel.sample_rotation(acc.locate(0.5)).unwrap();

    let expected = Quat::from_rotation_z(0.2);
    assert!(
        q.dot(expected).abs() > 0.999,
        "nlerp must interpolate along the short arc"
    );
}

// ============================================================================
// Rig / clip fixtures
// ============================================================================

/// Two-node chain: root translates, child is a joint 1 unit along X.
fn chain_rig() -> AnimationRig {
    AnimationRig {
        nodes: vec![
            RigNode::default(),
            RigNode {
                parent: Some(0),
                default_translation: Vec3::X,
                ..RigNode::default()
            },
        ],
        joint_nodes: vec![1],
        inverse_bind_matrices: vec![Mat4::IDENTITY, Mat4::from_translation(-Vec3::X)],
    }
}

/// Clip translating the root from `from` to `to` over `len` seconds.
fn translation_clip(name: &str, from: Vec3, to: Vec3, len: f32, num_nodes: usize) -> AnimationClip {
    AnimationClip::new(
        name.to_owned(),
        len,
        vec![TimeAccessor::new(vec![0.0, len], len)],
        vec![Channel {
            node: 0,
            target: ChannelTarget::Translation,
            accessor: 0,
            data: ChannelData::Vector(vec![from, to]),
        }],
        num_nodes,
    )
}

fn chain_data() -> AnimationData {
    let rig = chain_rig();
    let num_nodes = rig.num_nodes();
    AnimationData {
        rig,
        clips: vec![
            translation_clip("a", Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), 1.0, num_nodes),
            translation_clip("b", Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 2.0, num_nodes),
        ],
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn rig_ordering_invariant_holds() {
    assert!(chain_rig().is_topologically_ordered());
}

#[test]
fn single_clip_joint_matrices() {
    let data = chain_data();
    let mut state = AnimationState {
        current_anim: Some(0),
        ..AnimationState::default()
    };
    let mut scratch = EvalScratch::default();

    evaluate_object(&data, &mut state, 0.5, &mut scratch);

    // Root at (0,0,1); child at root + X; joint = child * inverse_bind
    // cancels the bind offset, leaving the root motion.
    let expected = Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0));
    assert!(
        approx_mat(&state.joint_matrices[0], &expected),
        "joint matrix should equal the root translation"
    );
    // Downstream caches are populated.
    assert!(approx_vec(
        state.node_hierarchical_to_object[1].w_axis.truncate(),
        Vec3::new(1.0, 0.0, 1.0)
    ));
}

#[test]
fn transition_midpoint_blends_half_and_half() {
    // Animation A (1 s) transitioning to B (2 s) over [0, 1]; at t = 0.5
    // the smoothstep fraction is exactly 0.5 and the joints must equal
    // lerp(A(0.5), B(0.5), 0.5).
    let data = chain_data();
    let mut state = AnimationState {
        current_anim: Some(0),
        next_anim: Some(1),
        transition_start_time: 0.0,
        transition_end_time: 1.0,
        ..AnimationState::default()
    };
    assert!(approx(state.transition_frac(0.5), 0.5));

    let mut scratch = EvalScratch::default();
    evaluate_object(&data, &mut state, 0.5, &mut scratch);

    // A(0.5) root = (0,0,1); B(0.5) root = (1,0,0); blended = (0.5,0,0.5).
    let root = state.node_hierarchical_to_object[0].w_axis.truncate();
    assert!(
        approx_vec(root, Vec3::new(0.5, 0.0, 0.5)),
        "expected half-blend of A and B, got {root}"
    );
}

#[test]
fn transition_endpoints_use_single_clip() {
    let data = chain_data();
    let mut scratch = EvalScratch::default();

    // Before the transition starts: pure A.
    let mut state = AnimationState {
        current_anim: Some(0),
        next_anim: Some(1),
        transition_start_time: 10.0,
        transition_end_time: 11.0,
        ..AnimationState::default()
    };
    evaluate_object(&data, &mut state, 0.5, &mut scratch);
    let root = state.node_hierarchical_to_object[0].w_axis.truncate();
    assert!(approx_vec(root, Vec3::new(0.0, 0.0, 1.0)));

    // Far past the transition end: pure B, A's sampling skipped.
    let mut state = AnimationState {
        current_anim: Some(0),
        next_anim: Some(1),
        transition_start_time: 0.0,
        transition_end_time: 0.1,
        ..AnimationState::default()
    };
    evaluate_object(&data, &mut state, 1.0, &mut scratch);
    let root = state.node_hierarchical_to_object[0].w_axis.truncate();
    assert!(approx_vec(root, Vec3::new(2.0, 0.0, 0.0)), "B(1.0) root");
}

#[test]
fn smoothstep_shape() {
    assert!(approx(smoothstep(0.0, 1.0, -1.0), 0.0));
    assert!(approx(smoothstep(0.0, 1.0, 0.5), 0.5));
    assert!(approx(smoothstep(0.0, 1.0, 2.0), 1.0));
    // Ease-in/ease-out: quarter point is below linear.
    assert!(smoothstep(0.0, 1.0, 0.25) < 0.25);
}

#[test]
fn procedural_rotation_overrides_animated_rotation() {
    let mut data = chain_data();
    // Give the root an animated rotation channel.
    let num_nodes = data.rig.num_nodes();
    data.clips[0] = AnimationClip::new(
        "a".to_owned(),
        1.0,
        vec![TimeAccessor::new(vec![0.0, 1.0], 1.0)],
        vec![Channel {
            node: 0,
            target: ChannelTarget::Rotation,
            accessor: 0,
            data: ChannelData::Rotation(vec![
                Quat::IDENTITY,
                Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            ]),
        }],
        num_nodes,
    );

    let over = Quat::from_rotation_x(1.0);
    let mut state = AnimationState {
        current_anim: Some(0),
        node_procedural: vec![
            NodeProcedural {
                rotation_override: Some(over),
                ..NodeProcedural::default()
            },
            NodeProcedural::default(),
        ],
        ..AnimationState::default()
    };
    let mut scratch = EvalScratch::default();
    evaluate_object(&data, &mut state, 0.5, &mut scratch);

    assert!(
        state.last_rot[0].dot(over).abs() > 0.999,
        "override must replace the animated rotation"
    );
}

#[test]
fn retarget_adjustment_applies_between_parent_and_local() {
    let mut data = chain_data();
    data.rig.nodes[1].retarget_adjustment =
        Some(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));

    let mut state = AnimationState {
        current_anim: Some(0),
        ..AnimationState::default()
    };
    let mut scratch = EvalScratch::default();
    evaluate_object(&data, &mut state, 0.0, &mut scratch);

    let child = state.node_hierarchical_to_object[1].w_axis.truncate();
    assert!(approx_vec(child, Vec3::new(1.0, 5.0, 0.0)));
}

#[test]
fn procedural_transform_post_multiplies() {
    let data = chain_data();
    let mut state = AnimationState {
        current_anim: Some(0),
        node_procedural: vec![
            NodeProcedural::default(),
            NodeProcedural {
                rotation_override: None,
                procedural_transform: Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
            },
        ],
        ..AnimationState::default()
    };
    let mut scratch = EvalScratch::default();
    evaluate_object(&data, &mut state, 0.0, &mut scratch);

    let child = state.node_hierarchical_to_object[1].w_axis.truncate();
    assert!(approx_vec(child, Vec3::new(1.0, 0.0, 3.0)));
    // The pre-procedural cache excludes the procedural transform.
    let pre = state.last_pre_proc_to_object[1].w_axis.truncate();
    assert!(approx_vec(pre, Vec3::new(1.0, 0.0, 0.0)));
}

// ============================================================================
// Parallel driver
// ============================================================================

#[test]
fn parallel_evaluation_matches_serial() {
    let data = Arc::new(chain_data());
    let time = 0.35;

    // Serial reference.
    let mut reference = AnimationState {
        current_anim: Some(0),
        ..AnimationState::default()
    };
    evaluate_object(&data, &mut reference, time, &mut EvalScratch::default());

    // Parallel batch of identical objects.
    let mut items: Vec<Mutex<AnimationWorkItem>> = (0..32)
        .map(|_| {
            Mutex::new(AnimationWorkItem {
                data: data.clone(),
                state: Box::new(AnimationState {
                    current_anim: Some(0),
                    ..AnimationState::default()
                }),
            })
        })
        .collect();

    let pool = TaskPool::with_threads(4);
    evaluate_parallel(&pool, &mut items, time);

    for item in &items {
        let item = item.lock();
        assert_eq!(
            item.state.joint_matrices.len(),
            reference.joint_matrices.len()
        );
        for (a, b) in item.state.joint_matrices.iter().zip(&reference.joint_matrices) {
            assert!(approx_mat(a, b), "parallel result diverged from serial");
        }
    }
}
