//! Allocator and Resident Table Tests
//!
//! Tests for:
//! - FreeIndexAllocator uniqueness, LRU recycling and expand
//! - BestFitAllocator placement, coalescing and power-of-two expand
//! - ResidentTable / MatrixBlockTable free-set round trips (the CPU side of
//!   the add-object / remove-object idempotence contract)

use glam::Mat4;

use vista::renderer::buffers::{
    BestFitAllocator, FreeIndexAllocator, MatrixBlockTable, PerObjectVertData, ResidentTable,
    validate_block_sizes,
};

// ============================================================================
// FreeIndexAllocator
// ============================================================================

#[test]
fn indices_are_unique_while_live() {
    let mut alloc = FreeIndexAllocator::new(64);
    let mut seen = std::collections::HashSet::new();
    for _ in 0..64 {
        let i = alloc.allocate().expect("capacity not yet exhausted");
        assert!(seen.insert(i), "index {i} handed out twice");
    }
    assert!(alloc.allocate().is_none(), "allocator must report exhaustion");
}

#[test]
fn freed_indices_recycle_least_recently_freed_first() {
    let mut alloc = FreeIndexAllocator::new(4);
    let a = alloc.allocate().unwrap();
    let b = alloc.allocate().unwrap();
    let _c = alloc.allocate().unwrap();
    let _d = alloc.allocate().unwrap();

    alloc.free(b);
    alloc.free(a);

    // b was freed first, so b comes back first.
    assert_eq!(alloc.allocate(), Some(b));
    assert_eq!(alloc.allocate(), Some(a));
}

#[test]
fn expand_preserves_live_indices() {
    let mut alloc = FreeIndexAllocator::new(2);
    let a = alloc.allocate().unwrap();
    let b = alloc.allocate().unwrap();
    alloc.expand_to(8);
    assert_eq!(alloc.capacity(), 8);
    assert_eq!(alloc.num_allocated(), 2);
    let c = alloc.allocate().unwrap();
    assert!(c != a && c != b, "fresh index after expand must be new");
}

#[test]
fn allocate_free_round_trip_restores_counts() {
    let mut alloc = FreeIndexAllocator::new(16);
    let before_free = alloc.num_free();
    let i = alloc.allocate().unwrap();
    alloc.free(i);
    assert_eq!(alloc.num_free(), before_free);
    assert_eq!(alloc.num_allocated(), 0);
}

// ============================================================================
// BestFitAllocator
// ============================================================================

#[test]
fn best_fit_picks_smallest_sufficient_block() {
    let mut alloc = BestFitAllocator::new(100);
    let a = alloc.allocate(10).unwrap(); // [0, 10)
    let _b = alloc.allocate(20).unwrap(); // [10, 30)
    let c = alloc.allocate(30).unwrap(); // [30, 60)
    let _d = alloc.allocate(40).unwrap(); // [60, 100)

    // Two non-adjacent holes: 10 elements at 0 and 30 elements at 30.
    alloc.free(a);
    alloc.free(c);

    // A request for 8 fits both; best-fit must choose the 10-element hole.
    assert_eq!(alloc.allocate(8), Some(0));
    // A request for 25 only fits the 30-element hole.
    assert_eq!(alloc.allocate(25), Some(30));
}

#[test]
fn free_coalesces_neighbours() {
    let mut alloc = BestFitAllocator::new(64);
    let a = alloc.allocate(16).unwrap();
    let b = alloc.allocate(16).unwrap();
    let c = alloc.allocate(16).unwrap();

    alloc.free(a);
    alloc.free(c);
    alloc.free(b); // joins both neighbours

    assert_eq!(alloc.free_size(), 64);
    assert_eq!(
        alloc.allocate(64),
        Some(0),
        "fully coalesced region should satisfy a full-size request"
    );
}

#[test]
fn expand_rounds_to_next_power_of_two() {
    let mut alloc = BestFitAllocator::new(64);
    let _ = alloc.allocate(64).unwrap();
    let new_capacity = alloc.expand(10);
    assert_eq!(new_capacity, 128, "64 + 10 rounds up to 128");

    // The added tail is allocatable, and old blocks keep their offsets.
    let tail = alloc.allocate(64).unwrap();
    assert_eq!(tail, 64);
}

#[test]
fn expand_covers_large_requests() {
    let mut alloc = BestFitAllocator::new(64);
    assert!(alloc.allocate(200).is_none());
    alloc.expand(200);
    assert_eq!(alloc.capacity(), 512, "64 + 200 rounds up to 512");
    assert!(alloc.allocate(200).is_some());
}

// ============================================================================
// Resident tables (CPU side)
// ============================================================================

#[test]
fn block_sizes_match_shader_declarations() {
    validate_block_sizes().expect("CPU structs must match WGSL block sizes");
}

#[test]
fn table_add_remove_restores_free_set_by_value() {
    let mut table: ResidentTable<PerObjectVertData> =
        ResidentTable::new("test", 8, wgpu::BufferUsages::STORAGE);

    let free_before = table.num_free();

    let i = table.allocate();
    let mut row = PerObjectVertData::default();
    row.uv0_scale = 7.0;
    table.update(i, row);
    table.free(i);

    assert_eq!(table.num_free(), free_before);
    // Freed rows are zeroed, so the table contents match the prior state
    // by value.
    assert_eq!(table.get(i).uv0_scale, PerObjectVertData::default().uv0_scale);
}

#[test]
fn table_expands_transparently() {
    let mut table: ResidentTable<PerObjectVertData> =
        ResidentTable::new("test", 2, wgpu::BufferUsages::STORAGE);
    let a = table.allocate();
    let b = table.allocate();
    let c = table.allocate(); // forces growth
    assert!(a != b && b != c && a != c);
    assert!(table.capacity() >= 3);
}

#[test]
fn joint_table_blocks_round_trip() {
    let mut joints = MatrixBlockTable::new("joint_matrices", 16);
    let before = joints.allocator.free_size();

    let base = joints.allocate_block(4);
    joints.update_block(base, &[Mat4::from_scale(glam::Vec3::splat(2.0)); 4]);
    assert_eq!(joints.block(base, 4).len(), 4);

    joints.free_block(base);
    assert_eq!(joints.allocator.free_size(), before);
}

#[test]
fn joint_table_grows_for_oversized_blocks() {
    let mut joints = MatrixBlockTable::new("joint_matrices", 8);
    let base = joints.allocate_block(100);
    joints.update_block(base, &[Mat4::IDENTITY; 100]);
    assert_eq!(joints.allocator.capacity(), 128, "8 + 100 rounds up to 128");
}
