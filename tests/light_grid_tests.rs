//! Light Grid Tests
//!
//! Tests for:
//! - Cone volume AABB construction
//! - AABB queries returning exactly the touching lights
//! - Closest-first ordering and deduplication across cells
//! - The `MAX_NUM_LIGHT_INDICES` cap and −1 padding
//! - Insert/update/remove keeping assignments equal to a from-scratch query

use glam::Vec3;

use vista::scene::bounds::Aabb;
use vista::scene::light::{Light, LightGrid, MAX_NUM_LIGHT_INDICES};

fn down_light(pos: Vec3, max_dist: f32, buffer_index: i32) -> Light {
    let mut light = Light::new(
        pos,
        Vec3::new(0.0, 0.0, -1.0),
        0.8,
        max_dist,
        Vec3::ONE,
    );
    light.buffer_index = buffer_index;
    light
}

// ============================================================================
// Volume AABB
// ============================================================================

#[test]
fn volume_aabb_contains_tip_and_base() {
    let light = down_light(Vec3::new(10.0, 20.0, 30.0), 15.0, 0);
    let aabb = light.volume_aabb();

    assert!(aabb.contains_point(light.pos), "tip must be inside");
    assert!(
        aabb.contains_point(light.pos + light.dir * light.max_dist),
        "base disc centre must be inside"
    );
}

#[test]
fn volume_aabb_widens_with_cone_angle() {
    let narrow = down_light(Vec3::ZERO, 10.0, 0);
    let mut wide = down_light(Vec3::ZERO, 10.0, 0);
    wide.cone_cos_angle = 0.3;

    let narrow_size = narrow.volume_aabb().size();
    let wide_size = wide.volume_aabb().size();
    assert!(
        wide_size.x > narrow_size.x,
        "wider cone should produce a wider AABB ({} <= {})",
        wide_size.x,
        narrow_size.x
    );
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn query_finds_touching_light() {
    let mut grid = LightGrid::new();
    grid.insert(down_light(Vec3::new(0.0, 0.0, 10.0), 20.0, 3));

    let ob = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
    let indices = grid.assign_light_indices(&ob);
    assert_eq!(indices[0], 3);
    assert_eq!(indices[1], -1);
}

#[test]
fn query_ignores_distant_light() {
    let mut grid = LightGrid::new();
    grid.insert(down_light(Vec3::new(1000.0, 1000.0, 1000.0), 5.0, 1));

    let ob = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(grid.assign_light_indices(&ob), [-1; MAX_NUM_LIGHT_INDICES]);
}

#[test]
fn overlapping_lights_sorted_by_distance_no_duplicates() {
    // Two lights whose volumes both cover the object; the nearer one must
    // come first and each appears exactly once even though both volumes
    // span many grid cells.
    let mut grid = LightGrid::new();
    grid.insert(down_light(Vec3::new(0.0, 0.0, 5.0), 200.0, 0));
    grid.insert(down_light(Vec3::new(0.0, 0.0, 60.0), 200.0, 1));

    let ob = Aabb::new(Vec3::new(-2.0, -2.0, -2.0), Vec3::new(2.0, 2.0, 2.0));
    let indices = grid.assign_light_indices(&ob);

    assert_eq!(indices[0], 0, "nearer light first");
    assert_eq!(indices[1], 1);
    assert_eq!(indices[2], -1);
    let occurrences = indices.iter().filter(|&&i| i == 0).count();
    assert_eq!(occurrences, 1, "no duplicate entries across cells");
}

#[test]
fn assignment_caps_at_max_indices() {
    let mut grid = LightGrid::new();
    for i in 0..12 {
        grid.insert(down_light(Vec3::new(i as f32, 0.0, 5.0), 100.0, i));
    }

    let ob = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
    let indices = grid.assign_light_indices(&ob);
    assert!(indices.iter().all(|&i| i >= 0), "all slots filled");
    assert_eq!(indices.len(), MAX_NUM_LIGHT_INDICES);
    // Closest-first: light 0 sits nearest the origin centroid.
    assert_eq!(indices[0], 0);
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn add_then_remove_restores_assignments() {
    let mut grid = LightGrid::new();
    grid.insert(down_light(Vec3::new(0.0, 0.0, 5.0), 50.0, 0));

    let ob = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
    let before = grid.assign_light_indices(&ob);

    let key = grid.insert(down_light(Vec3::new(0.5, 0.0, 5.0), 50.0, 1));
    let with_light = grid.assign_light_indices(&ob);
    assert_ne!(before, with_light);

    grid.remove(key);
    let after = grid.assign_light_indices(&ob);
    assert_eq!(before, after, "removal must restore the original set");
}

#[test]
fn moving_a_light_reindexes_it() {
    let mut grid = LightGrid::new();
    let key = grid.insert(down_light(Vec3::new(500.0, 500.0, 500.0), 10.0, 0));

    let ob = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(grid.assign_light_indices(&ob)[0], -1);

    grid.update(key, down_light(Vec3::new(0.0, 0.0, 5.0), 10.0, 0));
    assert_eq!(
        grid.assign_light_indices(&ob)[0],
        0,
        "after the move the light must be found at the new cells"
    );

    // And it must no longer be found at the old location.
    let old_spot = Aabb::new(Vec3::new(499.0, 499.0, 499.0), Vec3::new(501.0, 501.0, 501.0));
    assert_eq!(grid.assign_light_indices(&old_spot)[0], -1);
}

#[test]
fn query_matches_brute_force() {
    // The grid query must equal a from-scratch scan over all lights.
    let mut grid = LightGrid::new();
    let positions = [
        Vec3::new(0.0, 0.0, 8.0),
        Vec3::new(100.0, 0.0, 8.0),
        Vec3::new(-40.0, 70.0, 8.0),
        Vec3::new(3.0, -2.0, 20.0),
        Vec3::new(900.0, 900.0, 8.0),
    ];
    for (i, pos) in positions.iter().enumerate() {
        grid.insert(down_light(*pos, 60.0, i as i32));
    }

    let ob = Aabb::new(Vec3::new(-5.0, -5.0, -1.0), Vec3::new(5.0, 5.0, 3.0));
    let via_grid = grid.assign_light_indices(&ob);

    // Brute force: all touching lights sorted by squared distance.
    let centroid = ob.centroid();
    let mut touching: Vec<(f32, i32)> = grid
        .iter()
        .filter(|(_, l)| l.volume_aabb().intersects(&ob))
        .map(|(_, l)| (l.pos.distance_squared(centroid), l.buffer_index))
        .collect();
    touching.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (slot, (_, expected)) in touching.iter().take(MAX_NUM_LIGHT_INDICES).enumerate() {
        assert_eq!(via_grid[slot], *expected, "slot {slot} mismatch");
    }
}
