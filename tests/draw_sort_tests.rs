//! Draw Enumeration, Sort Key and Coalescing Tests
//!
//! Tests for:
//! - prog/cull/buffer/index-type key packing round trips
//! - Radix sort matching a comparison sort, stably
//! - Alpha keys sorting back-to-front
//! - The program-built bit gating batch emission
//! - Draw-list coalescing: shared state collapses into one run, and the
//!   state-change statistics count exactly the real switches
//! - Instanced draws owning one indirection row per instance
//! - Zero-batch meshes contributing no draws
//! - Program registry dense indexing and depth-key normalisation

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use vista::renderer::admission::{build_batch_records, rebuild_object_depth_draw_batches};
use vista::renderer::draw::{
    BatchDrawInfo, BatchFilter, BatchSource, CullTest, EnumerationExtras, FaceCull, FrameStats,
    build_draw_list, enumerate_batches, pack_alpha_sort_key, pack_prog_vao_key,
    prog_vao_key_buffer, prog_vao_key_cull, prog_vao_key_index_type, prog_vao_key_program,
    radix_sort_batches,
};
use vista::renderer::draw::DrawList;
use vista::renderer::programs::{
    BuildState, ProgramCache, ProgramFlags, ProgramKey, ProgramName,
};
use vista::resources::material::{Material, ResolvedPrograms};
use vista::resources::mesh::{Batch, Dequantise, IndexType, MeshDesc, MeshFlags, MeshHandle, MeshStore, VertexSpec};
use vista::scene::bounds::Aabb;
use vista::scene::object::{Object, ObjectKey};

// ============================================================================
// Helpers
// ============================================================================

fn make_mesh(store: &mut MeshStore, num_batches: u32) -> MeshHandle {
    let batches = (0..num_batches)
        .map(|i| Batch {
            prim_start_offset_b: i * 300,
            num_indices: 150,
            material_slot: 0,
        })
        .collect();
    let handle = store
        .insert(MeshDesc {
            vert_data: vec![0u8; 1200],
            index_data: vec![0u8; (300 * num_batches.max(1)) as usize],
            index_type: IndexType::U16,
            vertex_spec: VertexSpec::default(),
            batches,
            aabb_os: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
            flags: MeshFlags::empty(),
            dequantise: Dequantise::default(),
            animation_data: None,
        })
        .expect("mesh is valid");
    // Tests have no GPU; mark the upload finished so batches are drawable.
    let mesh = store.get_mut(handle).unwrap();
    mesh.upload = vista::resources::mesh::MeshUploadProgress::complete(
        mesh.vert_data.len() as u64,
        mesh.index_data.len() as u64,
    );
    handle
}

struct TestWorld {
    programs: ProgramCache,
    meshes: MeshStore,
    objects: SlotMap<ObjectKey, Object>,
    keys: Vec<ObjectKey>,
}

fn make_world(num_objects: usize, num_batches: u32) -> TestWorld {
    let mut programs = ProgramCache::new();
    let (prog, _) = programs
        .registry
        .intern(ProgramKey::new(ProgramName::Phong, ProgramFlags::empty()));
    let (depth_prog, _) = programs
        .registry
        .intern(ProgramKey::new(ProgramName::Depth, ProgramFlags::empty()));
    programs.registry.mark_built(prog);
    programs.registry.mark_built(depth_prog);

    let mut meshes = MeshStore::new();
    let mesh = make_mesh(&mut meshes, num_batches);

    let mut objects: SlotMap<ObjectKey, Object> = SlotMap::with_key();
    let mut keys = Vec::new();
    for i in 0..num_objects {
        let mut material = Material::default();
        material.material_index = Some(i as u32);
        material.resolved = Some(ResolvedPrograms {
            program: prog,
            depth_program: depth_prog,
        });
        let mut ob = Object::new(
            mesh,
            vec![material],
            Mat4::from_translation(Vec3::new(i as f32 * 0.1, 0.0, -5.0)),
        );
        ob.per_ob_vert_index = Some(i as u32);
        ob.aabb_os = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let transform = ob.ob_to_world;
        ob.set_transform(transform);
        {
            let mesh_ref = meshes.get(mesh).unwrap();
            rebuild_object_depth_draw_batches(&mut ob, mesh_ref, &programs);
            build_batch_records(&mut ob, mesh_ref, &programs);
        }
        keys.push(objects.insert(ob));
    }
    TestWorld {
        programs,
        meshes,
        objects,
        keys,
    }
}

// ============================================================================
// Key packing
// ============================================================================

#[test]
fn prog_vao_key_round_trips() {
    let key = pack_prog_vao_key(1234, FaceCull::Front, 0xBEEF, IndexType::U32);
    assert_eq!(prog_vao_key_program(key), 1234);
    assert_eq!(prog_vao_key_cull(key), FaceCull::Front);
    assert_eq!(prog_vao_key_buffer(key), 0xBEEF);
    assert_eq!(prog_vao_key_index_type(key), IndexType::U32);
}

#[test]
fn program_dominates_sort_order() {
    // Program index sits in the most significant bits, so a lower program
    // always sorts before a higher one regardless of the other fields.
    let low_prog = pack_prog_vao_key(1, FaceCull::None, 0xFFFF, IndexType::U32);
    let high_prog = pack_prog_vao_key(2, FaceCull::Back, 0, IndexType::U16);
    assert!(low_prog < high_prog);
}

#[test]
fn alpha_keys_sort_back_to_front() {
    let near = pack_alpha_sort_key(1.0, 0);
    let mid = pack_alpha_sort_key(50.0, 0);
    let far = pack_alpha_sort_key(900.0, 0);
    assert!(far < mid && mid < near, "greater distance must sort first");
}

#[test]
fn face_cull_flip_swaps_front_and_back() {
    assert_eq!(FaceCull::Back.flipped(), FaceCull::Front);
    assert_eq!(FaceCull::Front.flipped(), FaceCull::Back);
    assert_eq!(FaceCull::None.flipped(), FaceCull::None);
}

// ============================================================================
// Radix sort
// ============================================================================

#[test]
fn radix_sort_matches_comparison_sort() {
    let mut items: Vec<BatchDrawInfo> = Vec::new();
    let dummy_key = {
        let mut m: SlotMap<ObjectKey, ()> = SlotMap::with_key();
        m.insert(())
    };
    // Pseudo-random keys from a small LCG.
    let mut seed: u32 = 0x1234_5678;
    for i in 0..500 {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        items.push(BatchDrawInfo {
            prog_vao_key: seed,
            object: dummy_key,
            batch_i: i,
        });
    }

    let mut expected: Vec<u32> = items.iter().map(|b| b.prog_vao_key).collect();
    expected.sort_unstable();

    let mut scratch = Vec::new();
    radix_sort_batches(&mut items, &mut scratch);
    let got: Vec<u32> = items.iter().map(|b| b.prog_vao_key).collect();
    assert_eq!(got, expected);
}

#[test]
fn radix_sort_is_stable() {
    let dummy_key = {
        let mut m: SlotMap<ObjectKey, ()> = SlotMap::with_key();
        m.insert(())
    };
    let mut items = vec![
        BatchDrawInfo { prog_vao_key: 7, object: dummy_key, batch_i: 0 },
        BatchDrawInfo { prog_vao_key: 3, object: dummy_key, batch_i: 1 },
        BatchDrawInfo { prog_vao_key: 7, object: dummy_key, batch_i: 2 },
        BatchDrawInfo { prog_vao_key: 3, object: dummy_key, batch_i: 3 },
    ];
    let mut scratch = Vec::new();
    radix_sort_batches(&mut items, &mut scratch);

    let order: Vec<(u32, u32)> = items.iter().map(|b| (b.prog_vao_key, b.batch_i)).collect();
    assert_eq!(order, vec![(3, 1), (3, 3), (7, 0), (7, 2)]);
}

// ============================================================================
// Enumeration and coalescing
// ============================================================================

fn enumerate_world(world: &TestWorld, frustum_cull: bool) -> (Vec<BatchDrawInfo>, FrameStats) {
    let mut stats = FrameStats::default();
    let mut out = Vec::new();
    let cam = {
        let mut cam = vista::scene::camera::Camera::new(true);
        cam.set_transform(Mat4::IDENTITY);
        cam
    };
    let frustum = *cam.frustum();
    enumerate_batches(
        &world.objects,
        world.keys.iter(),
        &world.meshes,
        if frustum_cull {
            CullTest::Frustum(&frustum)
        } else {
            CullTest::None
        },
        BatchSource::Normal,
        &BatchFilter::opaque(),
        &EnumerationExtras::default(),
        &mut out,
        &mut stats,
    );
    (out, stats)
}

#[test]
fn hundred_objects_one_program_one_mesh_coalesce_to_one_run() {
    let world = make_world(100, 1);
    let (mut batches, mut stats) = enumerate_world(&world, true);
    assert_eq!(batches.len(), 100, "all objects are in front of the camera");

    let mut scratch = Vec::new();
    radix_sort_batches(&mut batches, &mut scratch);

    let mut list = DrawList::new();
    build_draw_list(
        &batches,
        BatchSource::Normal,
        &world.objects,
        0,
        &mut list,
        &mut stats,
    );

    assert_eq!(list.runs.len(), 1, "shared state must coalesce to one run");
    assert_eq!(list.commands.len(), 100, "one draw command per batch");
    assert_eq!(stats.num_prog_changes, 1);
    assert_eq!(stats.num_vao_binds, 1);
    assert_eq!(stats.num_draw_commands, 100);

    // Indirection rows line up with commands via base_instance, and
    // first_index is an index count, not a byte offset.
    for (i, cmd) in list.commands.iter().enumerate() {
        assert_eq!(cmd.base_instance, i as u32);
        assert_eq!(cmd.count, 150);
        assert_eq!(cmd.first_index, 0);
    }
    assert_eq!(list.indices_rows.len(), 100);
}

#[test]
fn draw_command_count_equals_visible_built_batches() {
    // Place half the objects far outside the frustum; the command count must
    // equal exactly the culled-in, built-program batches.
    let mut world = make_world(10, 1);
    for (i, key) in world.keys.iter().enumerate() {
        if i % 2 == 1 {
            let ob = world.objects.get_mut(*key).unwrap();
            ob.set_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 10_000.0)));
        }
    }
    let (mut batches, mut stats) = enumerate_world(&world, true);
    assert_eq!(batches.len(), 5);

    let mut scratch = Vec::new();
    radix_sort_batches(&mut batches, &mut scratch);
    let mut list = DrawList::new();
    build_draw_list(
        &batches,
        BatchSource::Normal,
        &world.objects,
        0,
        &mut list,
        &mut stats,
    );
    assert_eq!(list.commands.len(), 5);
    assert_eq!(stats.num_objects_culled, 5);
}

#[test]
fn building_programs_are_not_drawn() {
    let mut world = make_world(4, 1);

    // Re-resolve half the objects to a program that never finished.
    let (building, _) = world.programs.registry.intern(ProgramKey::new(
        ProgramName::Phong,
        ProgramFlags::SKINNING,
    ));
    assert_eq!(world.programs.registry.state(building), BuildState::Building);

    for (i, key) in world.keys.iter().enumerate() {
        if i < 2 {
            let ob = world.objects.get_mut(*key).unwrap();
            for m in &mut ob.materials {
                m.resolved = Some(ResolvedPrograms {
                    program: building,
                    depth_program: building,
                });
            }
            let mesh = world.meshes.get(ob.mesh).unwrap();
            build_batch_records(ob, mesh, &world.programs);
        }
    }

    let (batches, _) = enumerate_world(&world, false);
    assert_eq!(
        batches.len(),
        2,
        "only batches whose program-built bit is set may be emitted"
    );
}

#[test]
fn instanced_draw_owns_one_indirection_row_per_instance() {
    // One object with 3 instances: a single draw command whose
    // instance_count is 3, backed by 3 consecutive indirection rows that
    // walk the object's instance-transform block.
    let mut world = make_world(2, 1);
    let instanced_key = world.keys[0];
    {
        let ob = world.objects.get_mut(instanced_key).unwrap();
        ob.set_instance_matrices(vec![
            Mat4::IDENTITY,
            Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0)),
        ]);
        ob.instance_transforms_base_index = Some(16);
        assert!(ob.is_instanced());
    }

    let (mut batches, mut stats) = enumerate_world(&world, false);
    assert_eq!(batches.len(), 2);
    let mut scratch = Vec::new();
    radix_sort_batches(&mut batches, &mut scratch);

    let mut list = DrawList::new();
    build_draw_list(
        &batches,
        BatchSource::Normal,
        &world.objects,
        0,
        &mut list,
        &mut stats,
    );

    // 2 commands (one per batch), 3 + 1 indirection rows.
    assert_eq!(list.commands.len(), 2);
    assert_eq!(list.indices_rows.len(), 4);

    let instanced_cmd = list
        .commands
        .iter()
        .find(|c| c.instance_count == 3)
        .expect("the instanced object's command");
    let base = instanced_cmd.base_instance as usize;
    for i in 0..3 {
        let row = &list.indices_rows[base + i];
        assert_eq!(
            row.instance_transform_index,
            16 + i as u32,
            "row {i} must walk the instance block"
        );
    }
    // Both rows of an instanced draw share the object indices.
    assert_eq!(
        list.indices_rows[base].per_ob_index,
        list.indices_rows[base + 2].per_ob_index
    );

    // The non-instanced command keeps a single row addressed by its base.
    let plain_cmd = list
        .commands
        .iter()
        .find(|c| c.instance_count == 1)
        .expect("the plain object's command");
    assert_eq!(
        list.indices_rows[plain_cmd.base_instance as usize].instance_transform_index,
        0
    );
}

#[test]
fn instance_matrices_api_sets_count() {
    let world = make_world(1, 1);
    let mut ob = Object::new(
        world.objects[world.keys[0]].mesh,
        vec![Material::default()],
        Mat4::IDENTITY,
    );
    assert!(!ob.is_instanced());
    ob.set_instance_matrices(vec![Mat4::IDENTITY; 5]);
    assert_eq!(ob.num_instances, 5);
    assert!(ob.is_instanced());
    ob.set_instance_matrices(Vec::new());
    assert_eq!(ob.num_instances, 0);
    assert!(ob.instance_matrices.is_none());
}

#[test]
fn zero_batch_mesh_contributes_no_draws() {
    let world = make_world(3, 0);
    let (batches, _) = enumerate_world(&world, false);
    assert!(batches.is_empty());
    // Depth-draw batches are empty too.
    for key in &world.keys {
        assert!(world.objects[*key].depth_draw_batches.is_empty());
    }
}

#[test]
fn recomputing_draw_records_is_deterministic() {
    let mut world = make_world(1, 3);
    let key = world.keys[0];
    let first = world.objects[key].batch_records.clone();
    {
        let ob = world.objects.get_mut(key).unwrap();
        let mesh = world.meshes.get(ob.mesh).unwrap();
        build_batch_records(ob, mesh, &world.programs);
    }
    assert_eq!(world.objects[key].batch_records, first);
}

#[test]
fn depth_batches_coalesce_contiguous_ranges() {
    // Three contiguous batches with one material and no alpha test must
    // merge into a single depth-draw batch.
    let world = make_world(1, 3);
    let ob = &world.objects[world.keys[0]];
    assert_eq!(ob.batch_records.len(), 3);
    assert_eq!(
        ob.depth_draw_batches.len(),
        1,
        "contiguous same-state batches merge for the depth passes"
    );
    assert_eq!(ob.depth_draw_batches[0].num_indices, 450);
}

// ============================================================================
// Program registry
// ============================================================================

#[test]
fn program_indices_are_dense_and_stable() {
    let mut programs = ProgramCache::new();
    let (a, created_a) = programs
        .registry
        .intern(ProgramKey::new(ProgramName::Phong, ProgramFlags::empty()));
    let (b, created_b) = programs
        .registry
        .intern(ProgramKey::new(ProgramName::Water, ProgramFlags::empty()));
    let (a2, created_a2) = programs
        .registry
        .intern(ProgramKey::new(ProgramName::Phong, ProgramFlags::empty()));

    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(a2, a);
    assert!(created_a && created_b && !created_a2);
}

#[test]
fn depth_key_normalisation_strips_irrelevant_bits() {
    let key = ProgramKey::new(
        ProgramName::Phong,
        ProgramFlags::LIGHTMAPPING
            | ProgramFlags::VERT_COLOURS
            | ProgramFlags::SKINNING
            | ProgramFlags::ALPHA_TEST,
    );
    let depth = key.normalised_for_depth();
    assert_eq!(depth.name, ProgramName::Depth);
    assert!(depth.flags.contains(ProgramFlags::SKINNING));
    assert!(depth.flags.contains(ProgramFlags::ALPHA_TEST));
    assert!(!depth.flags.contains(ProgramFlags::LIGHTMAPPING));
    assert!(!depth.flags.contains(ProgramFlags::VERT_COLOURS));

    // Two materials differing only in depth-irrelevant bits share one
    // depth program key.
    let other = ProgramKey::new(
        ProgramName::Phong,
        ProgramFlags::SKINNING | ProgramFlags::ALPHA_TEST,
    );
    assert_eq!(other.normalised_for_depth(), depth);
}
