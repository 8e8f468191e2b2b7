//! Texture Residency Cache Tests
//!
//! Tests for:
//! - Byte accounting across insert/remove
//! - Eviction only of unused entries, least-recently-unused first
//! - Budget-driven trimming on both the CPU and GPU axes
//! - Resurrection (`texture_became_used`) protecting an entry again
//! - The deferred became-unused queue drained on the render thread

use vista::resources::texture::{TextureBudgets, TextureCache};

fn cache_with_budgets(cpu: u64, gpu: u64) -> TextureCache {
    TextureCache::new(TextureBudgets {
        max_cpu_bytes: cpu,
        max_gpu_bytes: gpu,
    })
}

// ============================================================================
// Accounting
// ============================================================================

#[test]
fn insert_and_remove_track_bytes() {
    let mut cache = cache_with_budgets(1_000_000, 1_000_000);
    cache.insert("a.png".to_owned(), 100, 200, None);
    cache.insert("b.png".to_owned(), 50, 70, None);

    assert_eq!(cache.cpu_bytes_used(), 150);
    assert_eq!(cache.gpu_bytes_used(), 270);

    cache.remove("a.png");
    assert_eq!(cache.cpu_bytes_used(), 50);
    assert_eq!(cache.gpu_bytes_used(), 70);
}

#[test]
fn reinserting_a_key_replaces_its_accounting() {
    let mut cache = cache_with_budgets(1_000_000, 1_000_000);
    cache.insert("a.png".to_owned(), 100, 100, None);
    cache.insert("a.png".to_owned(), 10, 20, None);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.cpu_bytes_used(), 10);
    assert_eq!(cache.gpu_bytes_used(), 20);
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn used_entries_are_never_evicted() {
    let mut cache = cache_with_budgets(100, 1_000_000);
    cache.insert("a.png".to_owned(), 80, 0, None);
    // Over budget, but "a" is still used: trimming cannot touch it.
    cache.insert("b.png".to_owned(), 80, 0, None);

    assert!(cache.contains("a.png"));
    assert!(cache.contains("b.png"));
    assert!(cache.cpu_bytes_used() > 100, "nothing evictable yet");
}

#[test]
fn unused_entries_evict_least_recently_unused_first() {
    let mut cache = cache_with_budgets(250, 1_000_000);
    cache.insert("a.png".to_owned(), 100, 0, None);
    cache.insert("b.png".to_owned(), 100, 0, None);
    cache.texture_became_unused("b.png");
    cache.texture_became_unused("a.png");

    // The insert pushes usage to 300; one eviction rebalances, and it must
    // take b — unused the longest.
    let evicted = cache.insert("c.png".to_owned(), 100, 0, None);
    assert_eq!(evicted, 1, "exactly one eviction balances the budget");
    assert!(!cache.contains("b.png"), "b was unused longest");
    assert!(cache.contains("a.png"));
    assert!(cache.contains("c.png"));
}

#[test]
fn trim_respects_the_gpu_budget_independently() {
    let mut cache = cache_with_budgets(1_000_000, 150);
    cache.insert("a.png".to_owned(), 0, 100, None);
    cache.texture_became_unused("a.png");
    cache.insert("b.png".to_owned(), 0, 100, None);

    assert!(!cache.contains("a.png"), "GPU budget forces eviction");
    assert!(cache.contains("b.png"));
    assert!(cache.gpu_bytes_used() <= 150);
}

#[test]
fn became_used_protects_entry_from_eviction() {
    let mut cache = cache_with_budgets(150, 1_000_000);
    cache.insert("a.png".to_owned(), 100, 0, None);
    cache.texture_became_unused("a.png");
    cache.texture_became_used("a.png");

    cache.insert("b.png".to_owned(), 100, 0, None);
    assert!(
        cache.contains("a.png"),
        "a regained a user and must survive the over-budget trim"
    );
}

// ============================================================================
// Deferred queue
// ============================================================================

#[test]
fn deferred_unused_keys_apply_on_process() {
    let mut cache = cache_with_budgets(150, 1_000_000);
    cache.insert("a.png".to_owned(), 100, 0, None);

    // Worker-thread path: only queues.
    cache.texture_became_unused_deferred("a.png");
    assert_eq!(cache.num_unused(), 0, "deferral must not mutate entries");

    // Render thread drains the queue; the entry becomes evictable.
    cache.process_unused_queue();
    assert_eq!(cache.num_unused(), 1);

    cache.insert("b.png".to_owned(), 100, 0, None);
    assert!(!cache.contains("a.png"));
}

#[test]
fn deferred_keys_for_missing_entries_are_no_ops() {
    // A cancelled async load may report a key that was never inserted.
    let mut cache = cache_with_budgets(100, 100);
    cache.texture_became_unused_deferred("ghost.png");
    cache.process_unused_queue();
    assert!(cache.is_empty());
}
