//! Camera and Culling Volume Tests
//!
//! Tests for:
//! - Projection construction per mode (perspective, ortho, diagonal-ortho)
//! - Reverse-Z conventions and depth comparison selection
//! - Frustum plane counts (5 for infinite-far perspective, 6 for ortho)
//! - Tangent AABBs counting as intersecting (not disjoint)
//! - Diagonal-orthographic clip planes derived from the true sheared volume
//! - Sun-extruded shadow volume containment

use glam::{Mat4, Vec2, Vec3};

use vista::scene::bounds::Aabb;
use vista::scene::camera::{Camera, CullVolume, ProjectionMode, SensorParams};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn perspective_camera() -> Camera {
    let mut cam = Camera::new(true);
    cam.set_projection(ProjectionMode::Perspective, SensorParams::default());
    cam.set_near_and_far(0.1, 500.0);
    cam.set_transform(Mat4::IDENTITY);
    cam
}

// ============================================================================
// Projection matrices
// ============================================================================

#[test]
fn perspective_reverse_z_maps_near_to_one() {
    let cam = perspective_camera();
    let proj = cam.projection_matrix();

    // A point on the near plane (z = -near) must land at clip depth 1.
    let clip = proj * glam::Vec4::new(0.0, 0.0, -0.1, 1.0);
    let ndc_z = clip.z / clip.w;
    assert!(approx(ndc_z, 1.0), "near plane should map to depth 1, got {ndc_z}");

    // A very distant point tends toward depth 0.
    let clip_far = proj * glam::Vec4::new(0.0, 0.0, -100_000.0, 1.0);
    let ndc_z_far = clip_far.z / clip_far.w;
    assert!(ndc_z_far < 1e-3, "far points should map near depth 0, got {ndc_z_far}");
}

#[test]
fn perspective_standard_z_maps_near_to_zero() {
    let mut cam = Camera::new(false);
    cam.set_projection(ProjectionMode::Perspective, SensorParams::default());
    cam.set_near_and_far(0.1, 500.0);
    let proj = cam.projection_matrix();

    let clip = proj * glam::Vec4::new(0.0, 0.0, -0.1, 1.0);
    assert!(approx(clip.z / clip.w, 0.0));
}

#[test]
fn depth_compare_follows_convention() {
    assert_eq!(
        Camera::new(true).depth_compare(),
        wgpu::CompareFunction::Greater
    );
    assert_eq!(
        Camera::new(false).depth_compare(),
        wgpu::CompareFunction::Less
    );
}

#[test]
fn perspective_frustum_has_five_planes() {
    let cam = perspective_camera();
    assert_eq!(
        cam.frustum().planes().len(),
        5,
        "infinite-far perspective culls with 4 side planes + explicit far"
    );
}

#[test]
fn orthographic_frustum_has_six_planes() {
    let mut cam = Camera::new(true);
    cam.set_projection(
        ProjectionMode::Orthographic,
        SensorParams {
            use_sensor_width: 20.0,
            use_sensor_height: 20.0,
            ..SensorParams::default()
        },
    );
    cam.set_near_and_far(0.1, 100.0);
    assert_eq!(cam.frustum().planes().len(), 6);
}

// ============================================================================
// Frustum culling
// ============================================================================

#[test]
fn box_in_front_of_camera_is_visible() {
    let cam = perspective_camera();
    let aabb = Aabb::new(Vec3::new(-0.5, -0.5, -5.5), Vec3::new(0.5, 0.5, -4.5));
    assert!(cam.frustum().intersects_aabb(&aabb));
}

#[test]
fn box_behind_far_plane_is_culled() {
    let cam = perspective_camera();
    let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -700.0), Vec3::new(1.0, 1.0, -600.0));
    assert!(!cam.frustum().intersects_aabb(&aabb));
}

#[test]
fn box_outside_side_plane_is_culled() {
    let cam = perspective_camera();
    // Far off to the left at modest depth: outside the left plane.
    let aabb = Aabb::new(Vec3::new(-500.0, -1.0, -6.0), Vec3::new(-400.0, 1.0, -5.0));
    assert!(!cam.frustum().intersects_aabb(&aabb));
}

#[test]
fn tangent_box_counts_as_intersecting() {
    // A box whose max face exactly touches the explicit far plane must be
    // included: tangency is not disjoint.
    let cam = perspective_camera();
    let far = cam.max_draw_dist;
    let aabb = Aabb::new(
        Vec3::new(-0.5, -0.5, -far - 10.0),
        Vec3::new(0.5, 0.5, -far),
    );
    assert!(
        cam.frustum().intersects_aabb(&aabb),
        "box tangent to the far plane should not be culled"
    );
}

#[test]
fn frustum_aabb_prefilter_rejects_distant_boxes() {
    let cam = perspective_camera();
    let frustum_aabb = cam.frustum().aabb();
    let outside = Aabb::new(
        frustum_aabb.max + Vec3::splat(1.0),
        frustum_aabb.max + Vec3::splat(2.0),
    );
    assert!(!cam.frustum().intersects_aabb(&outside));
}

// ============================================================================
// Diagonal-orthographic
// ============================================================================

#[test]
fn diagonal_ortho_culls_by_sheared_volume() {
    // With slope (1, 0), a point at depth d drifts by d in camera X before
    // the orthographic map, so the clip volume leans sideways in camera
    // space. A box that sits inside the *sheared* volume but outside the
    // unsheared one must be accepted: the planes come from the composed
    // matrix, not from a widened sensor estimate.
    let mut cam = Camera::new(false);
    cam.diagonal_slope = Vec2::new(1.0, 0.0);
    cam.set_near_and_far(0.1, 100.0);
    cam.set_projection(
        ProjectionMode::DiagonalOrthographic,
        SensorParams {
            use_sensor_width: 2.0,
            use_sensor_height: 2.0,
            lens_sensor_dist: 1.0,
            lens_shift_x: 0.0,
            lens_shift_y: 0.0,
        },
    );

    // The volume's centre ray at depth 50 passes through camera-space
    // x = 50 (the shear maps x - slope*depth into sensor space).
    let inside_sheared = Aabb::new(Vec3::new(49.5, -0.5, -50.5), Vec3::new(50.5, 0.5, -49.5));
    assert!(
        cam.frustum().intersects_aabb(&inside_sheared),
        "box on the sheared axis should be visible"
    );

    // The unsheared centre at the same depth is far outside the leaning
    // volume.
    let outside_sheared = Aabb::new(Vec3::new(-0.5, -0.5, -50.5), Vec3::new(0.5, 0.5, -49.5));
    assert!(
        !cam.frustum().intersects_aabb(&outside_sheared),
        "the unsheared centre should be culled at depth"
    );
}

// ============================================================================
// Shadow / animation volume
// ============================================================================

#[test]
fn shadow_volume_contains_view_frustum() {
    let cam = perspective_camera();
    let volume = cam.shadow_volume(Vec3::Z, 100.0, 50.0);

    let inside = Aabb::new(Vec3::new(-0.2, -0.2, -10.2), Vec3::new(0.2, 0.2, -9.8));
    assert!(volume.intersects_aabb(&inside));
}

#[test]
fn shadow_volume_admits_extruded_casters() {
    // A caster above the frustum (toward the sun at +Z) within the
    // extrusion distance must be inside the volume even though it is
    // outside the view frustum.
    let cam = perspective_camera();
    let sun = Vec3::Z;
    let volume = cam.shadow_volume(sun, 100.0, 50.0);

    let above = Aabb::new(Vec3::new(-0.5, -0.5, 40.0), Vec3::new(0.5, 0.5, 41.0));
    assert!(
        !cam.frustum().intersects_aabb(&above),
        "sanity: the caster is not in the view frustum"
    );
    assert!(
        volume.intersects_aabb(&above),
        "caster between frustum and sun must be in the shadow volume"
    );
}

#[test]
fn shadow_volume_rejects_casters_beyond_extrusion() {
    let cam = perspective_camera();
    let volume = cam.shadow_volume(Vec3::Z, 100.0, 50.0);

    let far_above = Aabb::new(Vec3::new(-0.5, -0.5, 400.0), Vec3::new(0.5, 0.5, 401.0));
    assert!(!volume.intersects_aabb(&far_above));
}

#[test]
fn extruded_volume_from_axis_box() {
    // Hand-built "frustum": a unit cube. Sweeping along +X doubles the
    // reach in X and keeps Y/Z bounds.
    let corners = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(0.0, 1.0, 1.0),
    ];
    let volume = CullVolume::from_extruded_frustum(&corners, Vec3::new(5.0, 0.0, 0.0));

    assert!(volume.intersects_aabb(&Aabb::new(
        Vec3::new(3.0, 0.2, 0.2),
        Vec3::new(3.5, 0.8, 0.8)
    )));
    assert!(!volume.intersects_aabb(&Aabb::new(
        Vec3::new(7.0, 0.2, 0.2),
        Vec3::new(8.0, 0.8, 0.8)
    )));
    assert!(!volume.intersects_aabb(&Aabb::new(
        Vec3::new(3.0, 2.0, 0.2),
        Vec3::new(3.5, 3.0, 0.8)
    )));
}
