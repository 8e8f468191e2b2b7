//! Shadow Cascade Tests
//!
//! Tests for:
//! - Dynamic cascade slice geometry (geometric growth, contiguity)
//! - Sun-basis orthographic construction containing the slice corners
//! - Texel snapping stability
//! - The cascade bias matrix mapping NDC into the cascade's texture slice
//! - The 12-frame static stagger: (cascade, subset) schedule and full
//!   coverage before the stacks swap
//! - Camera-position quantisation for static volume centres

use glam::{Mat4, Vec3, Vec4};

use vista::renderer::passes::{
    NUM_STATIC_CASCADES, STATIC_UPDATE_PERIOD, build_sun_ortho, cascade_bias_matrix,
    dynamic_cascade_slice, quantise_centre, static_update_phase,
};
use vista::scene::camera::{Camera, ProjectionMode, SensorParams};

const EPSILON: f32 = 1e-3;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Dynamic cascade slices
// ============================================================================

#[test]
fn cascade_slices_are_contiguous_and_growing() {
    let (near0, far0) = dynamic_cascade_slice(0);
    let (near1, far1) = dynamic_cascade_slice(1);
    let (near2, far2) = dynamic_cascade_slice(2);

    assert!(near0 > 0.0);
    assert!(approx(far0, near1), "slice 1 starts where slice 0 ends");
    assert!(approx(far1, near2), "slice 2 starts where slice 1 ends");

    let scale0 = far0 / near0;
    let scale1 = far1 / near1;
    assert!(approx(scale0, scale1), "slices grow by a constant factor");
    assert!(far2 > far1 && far1 > far0);
}

// ============================================================================
// Sun-basis orthographic projection
// ============================================================================

fn slice_corners() -> [Vec3; 8] {
    let mut cam = Camera::new(true);
    cam.set_projection(ProjectionMode::Perspective, SensorParams::default());
    cam.set_near_and_far(0.1, 500.0);
    cam.set_transform(Mat4::IDENTITY);
    let (near, far) = dynamic_cascade_slice(1);
    cam.world_corners_for_slice(near, far)
}

#[test]
fn sun_ortho_contains_all_slice_corners() {
    let corners = slice_corners();
    let sun = Vec3::new(0.3, 0.2, 0.93).normalize();
    let (proj, view) = build_sun_ortho(sun, &corners, 2048, 100.0);
    let vp = proj * view;

    for (i, c) in corners.iter().enumerate() {
        let clip = vp * Vec4::new(c.x, c.y, c.z, 1.0);
        let ndc = clip / clip.w;
        assert!(
            ndc.x >= -1.0 - EPSILON && ndc.x <= 1.0 + EPSILON,
            "corner {i} x outside ortho volume: {}",
            ndc.x
        );
        assert!(
            ndc.y >= -1.0 - EPSILON && ndc.y <= 1.0 + EPSILON,
            "corner {i} y outside ortho volume: {}",
            ndc.y
        );
        assert!(
            ndc.z >= -EPSILON && ndc.z <= 1.0 + EPSILON,
            "corner {i} depth outside [0, 1]: {}",
            ndc.z
        );
    }
}

#[test]
fn sun_ortho_admits_casters_toward_sun() {
    // A caster offset toward the sun by less than the extension distance
    // must land inside the depth range so it can shadow the slice.
    let corners = slice_corners();
    let sun = Vec3::Z;
    let extension = 100.0;
    let (proj, view) = build_sun_ortho(sun, &corners, 2048, extension);
    let vp = proj * view;

    let centre: Vec3 = corners.iter().copied().sum::<Vec3>() / 8.0;
    let caster = centre + sun * (extension * 0.5);
    let clip = vp * Vec4::new(caster.x, caster.y, caster.z, 1.0);
    let ndc_z = clip.z / clip.w;
    assert!(
        (-EPSILON..=1.0 + EPSILON).contains(&ndc_z),
        "caster toward the sun must be inside the depth range, got {ndc_z}"
    );
}

#[test]
fn sun_ortho_is_deterministic_and_invertible() {
    let corners = slice_corners();
    let sun = Vec3::new(0.1, 0.2, 0.97).normalize();

    let (proj_a, view_a) = build_sun_ortho(sun, &corners, 1024, 50.0);
    let (proj_b, view_b) = build_sun_ortho(sun, &corners, 1024, 50.0);
    assert_eq!(proj_a, proj_b, "identical input must snap identically");
    assert_eq!(view_a, view_b);

    let det = (proj_a * view_a).determinant();
    assert!(det.abs() > 1e-12, "cascade VP must be invertible, det={det}");
}

#[test]
fn sub_texel_camera_motion_keeps_ortho_extent() {
    // Texel snapping means a sub-texel shift of the slice cannot shrink or
    // grow the snapped volume by more than one texel on each edge.
    let corners = slice_corners();
    let sun = Vec3::new(0.1, 0.2, 0.97).normalize();
    let map_size = 1024;

    let (proj_a, _) = build_sun_ortho(sun, &corners, map_size, 50.0);
    let shifted: [Vec3; 8] = core::array::from_fn(|i| corners[i] + Vec3::splat(0.001));
    let (proj_b, _) = build_sun_ortho(sun, &shifted, map_size, 50.0);

    // Orthographic scale terms encode 2 / extent; extents may differ by at
    // most ~2 texels' worth.
    let extent = |proj: Mat4| 2.0 / proj.x_axis.x;
    let ea = extent(proj_a);
    let eb = extent(proj_b);
    let texel = ea / map_size as f32;
    assert!(
        (ea - eb).abs() <= 2.5 * texel,
        "snapped extents drifted: {ea} vs {eb}"
    );
}

// ============================================================================
// Cascade bias matrices
// ============================================================================

#[test]
fn bias_matrix_maps_ndc_into_cascade_slice() {
    let num = 3;
    for cascade in 0..num {
        let m = cascade_bias_matrix(cascade, num);

        // NDC centre lands at the centre of the cascade's vertical slice.
        let centre = m * Vec4::new(0.0, 0.0, 0.5, 1.0);
        assert!(approx(centre.x, 0.5));
        let expected_v = (0.5 + cascade as f32) / num as f32;
        assert!(
            approx(centre.y, expected_v),
            "cascade {cascade}: expected v {expected_v}, got {}",
            centre.y
        );
        // Depth passes through unchanged.
        assert!(approx(centre.z, 0.5));

        // Full NDC corners stay within the slice's v range.
        let top = m * Vec4::new(0.0, 1.0, 0.0, 1.0);
        let bottom = m * Vec4::new(0.0, -1.0, 0.0, 1.0);
        let v0 = cascade as f32 / num as f32;
        let v1 = (cascade + 1) as f32 / num as f32;
        for v in [top.y, bottom.y] {
            assert!(
                v >= v0 - EPSILON && v <= v1 + EPSILON,
                "cascade {cascade}: v {v} escapes slice [{v0}, {v1}]"
            );
        }
    }
}

// ============================================================================
// Static stagger schedule
// ============================================================================

#[test]
fn stagger_schedule_shape() {
    assert_eq!(static_update_phase(0), (0, 0));
    assert_eq!(static_update_phase(3), (0, 3));
    assert_eq!(static_update_phase(4), (1, 0));
    assert_eq!(static_update_phase(11), (2, 3));
    // Wraps after the full period.
    assert_eq!(static_update_phase(STATIC_UPDATE_PERIOD), (0, 0));
}

#[test]
fn stagger_covers_every_cascade_and_subset_once_per_period() {
    let mut seen = std::collections::HashSet::new();
    for frame in 0..STATIC_UPDATE_PERIOD {
        let (cascade, subset) = static_update_phase(frame);
        assert!(cascade < NUM_STATIC_CASCADES as u32);
        assert!(subset < 4);
        assert!(
            seen.insert((cascade, subset)),
            "(cascade {cascade}, subset {subset}) scheduled twice in one period"
        );
    }
    assert_eq!(
        seen.len(),
        NUM_STATIC_CASCADES * 4,
        "after 12 frames every cascade has drawn all 4 subsets"
    );
}

#[test]
fn every_object_subset_is_drawn_within_a_period() {
    // Objects pick their subset from random_num & 3; over one period each
    // cascade must see all four subset values.
    for wanted_subset in 0u32..4 {
        let frames_for_subset: Vec<u64> = (0..STATIC_UPDATE_PERIOD)
            .filter(|&f| static_update_phase(f).1 == wanted_subset)
            .collect();
        assert_eq!(
            frames_for_subset.len(),
            NUM_STATIC_CASCADES,
            "subset {wanted_subset} draws once per cascade"
        );
    }
}

// ============================================================================
// Quantisation
// ============================================================================

#[test]
fn centre_quantisation_is_stable_within_a_cell() {
    // Small camera motion inside one 10-unit cell keeps the snapped centre
    // fixed, preventing shimmer from static-volume drift.
    let a = quantise_centre(Vec3::new(12.0, 27.0, 3.0));
    let b = quantise_centre(Vec3::new(14.0, 22.0, 7.0));
    assert_eq!(a, b);

    let c = quantise_centre(Vec3::new(22.0, 27.0, 3.0));
    assert_ne!(a, c, "crossing a cell boundary moves the snapped centre");
}
