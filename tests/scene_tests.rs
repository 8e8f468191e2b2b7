//! Scene and Object Tests
//!
//! Tests for:
//! - Primary-set exclusivity (`objects` xor `always_visible_objects`)
//! - Secondary set membership derived from material/object flags
//! - Removal exactly reversing insertion
//! - Normal matrix (adjugate transpose) and determinant-sign tracking
//! - World AABB derivation from the object-space box

use glam::{Mat4, Vec3};

use vista::resources::material::{Material, MaterialFlags};
use vista::resources::mesh::MeshHandle;
use vista::scene::Scene;
use vista::scene::bounds::Aabb;
use vista::scene::object::{Object, ObjectFlags, adjugate_transpose_3x3, upper_left_det};

fn dangling_mesh() -> MeshHandle {
    MeshHandle::default()
}

fn object_with_flags(material_flags: MaterialFlags, object_flags: ObjectFlags) -> Object {
    let material = Material {
        flags: material_flags,
        ..Material::default()
    };
    let mut ob = Object::new(dangling_mesh(), vec![material], Mat4::IDENTITY);
    ob.flags = object_flags;
    ob
}

// ============================================================================
// Set membership
// ============================================================================

#[test]
fn plain_object_joins_the_primary_set_only() {
    let mut scene = Scene::new(true);
    let key = scene
        .objects
        .insert(object_with_flags(MaterialFlags::empty(), ObjectFlags::empty()));
    scene.insert_into_sets(key);

    assert!(scene.primary_set_membership_ok(key));
    assert!(scene.object_set.contains(&key));
    assert!(!scene.always_visible_objects.contains(&key));
    assert!(scene.transparent_objects.is_empty());
    assert!(scene.water_objects.is_empty());
}

#[test]
fn always_visible_object_leaves_the_culled_set() {
    let mut scene = Scene::new(true);
    let key = scene.objects.insert(object_with_flags(
        MaterialFlags::empty(),
        ObjectFlags::ALWAYS_VISIBLE,
    ));
    scene.insert_into_sets(key);

    assert!(scene.primary_set_membership_ok(key));
    assert!(scene.always_visible_objects.contains(&key));
    assert!(!scene.object_set.contains(&key));
}

#[test]
fn material_flags_drive_secondary_sets() {
    let mut scene = Scene::new(true);
    let key = scene.objects.insert(object_with_flags(
        MaterialFlags::TRANSPARENT | MaterialFlags::WATER,
        ObjectFlags::empty(),
    ));
    scene.insert_into_sets(key);

    assert!(scene.transparent_objects.contains(&key));
    assert!(scene.water_objects.contains(&key));
    assert!(!scene.decal_objects.contains(&key));
    assert!(!scene.alpha_blended_objects.contains(&key));
}

#[test]
fn participating_media_counts_as_alpha_blended() {
    let mut scene = Scene::new(true);
    let key = scene.objects.insert(object_with_flags(
        MaterialFlags::PARTICIPATING_MEDIA,
        ObjectFlags::empty(),
    ));
    scene.insert_into_sets(key);
    assert!(scene.alpha_blended_objects.contains(&key));
}

#[test]
fn removal_reverses_insertion() {
    let mut scene = Scene::new(true);
    let key = scene.objects.insert(object_with_flags(
        MaterialFlags::TRANSPARENT | MaterialFlags::DECAL | MaterialFlags::MATERIALISE_EFFECT,
        ObjectFlags::empty(),
    ));
    scene.insert_into_sets(key);
    scene.selected_objects.push(key);

    scene.remove_from_sets(key);
    scene.objects.remove(key);

    assert!(scene.object_set.is_empty());
    assert!(scene.always_visible_objects.is_empty());
    assert!(scene.transparent_objects.is_empty());
    assert!(scene.decal_objects.is_empty());
    assert!(scene.materialise_objects.is_empty());
    assert!(scene.selected_objects.is_empty());
    assert_eq!(scene.num_objects(), 0);
}

// ============================================================================
// Transform-derived state
// ============================================================================

#[test]
fn adjugate_transpose_matches_inverse_transpose_up_to_det() {
    // For an invertible M: adjT(M) = det(M) · inverse(M)ᵀ.
    let m = Mat4::from_scale_rotation_translation(
        Vec3::new(2.0, 3.0, 0.5),
        glam::Quat::from_rotation_y(0.7),
        Vec3::new(5.0, -2.0, 1.0),
    );
    let adj_t = adjugate_transpose_3x3(&m);
    let det = upper_left_det(&m);

    let m3 = glam::Mat3::from_mat4(m);
    let expected = m3.inverse().transpose() * det;
    let got = glam::Mat3::from_mat4(adj_t);
    for c in 0..3 {
        assert!(
            (got.col(c) - expected.col(c)).length() < 1e-3,
            "column {c}: {:?} vs {:?}",
            got.col(c),
            expected.col(c)
        );
    }
}

#[test]
fn determinant_sign_flips_with_mirroring() {
    let mut ob = object_with_flags(MaterialFlags::empty(), ObjectFlags::empty());
    assert!(ob.det_sign > 0.0);

    ob.set_transform(Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)));
    assert!(ob.det_sign < 0.0, "mirrored transform must flip the sign");
}

#[test]
fn world_aabb_follows_transform() {
    let mut ob = object_with_flags(MaterialFlags::empty(), ObjectFlags::empty());
    ob.aabb_os = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    ob.set_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));

    assert_eq!(ob.aabb_ws.min, Vec3::new(9.0, -1.0, -1.0));
    assert_eq!(ob.aabb_ws.max, Vec3::new(11.0, 1.0, 1.0));

    // Rotation by 45° about Z grows the XY extents to √2.
    ob.set_transform(Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4));
    let expected = 2f32.sqrt();
    assert!((ob.aabb_ws.max.x - expected).abs() < 1e-4);
    assert!((ob.aabb_ws.max.y - expected).abs() < 1e-4);
    assert!((ob.aabb_ws.max.z - 1.0).abs() < 1e-4);
}

#[test]
fn aabb_tangent_boxes_intersect() {
    let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
    let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
    assert!(a.intersects(&b), "face-sharing boxes are not disjoint");
}
