//! Object admission, removal, and denormalised draw-record maintenance.
//!
//! Admission runs the full pipeline: validate, assign GPU slots, resolve
//! shader programs, compute the world AABB, assign lights, upload the
//! per-object row, coalesce depth-draw batches and build the per-batch draw
//! records. Removal reverses every step, returning all slots to their free
//! sets. Any later change to a transform, material flag or texture re-runs
//! the derived steps through [`Renderer::rebuild_denormalised_draw_data`].

use glam::{Vec3, Vec4};

use crate::errors::{Result, VistaError};
use crate::renderer::Renderer;
use crate::renderer::buffers::{LightData, MaterialData, PerObjectVertData};
use crate::renderer::draw::{
    BATCH_FLAG_ALPHA_BLEND, BATCH_FLAG_DECAL, BATCH_FLAG_TRANSPARENT, BATCH_FLAG_WATER,
    BatchRecord, FaceCull, batch_program_index, pack_program_index_and_flags,
};
use crate::renderer::programs::{ProgramCache, ProgramFlags, ProgramIndex, ProgramKey, ProgramName};
use crate::resources::material::{Material, MaterialFlags};
use crate::resources::mesh::{Mesh, MeshFlags};
use crate::scene::Scene;
use crate::scene::light::{Light, LightKey};
use crate::scene::object::{Object, ObjectKey};

// ============================================================================
// Program resolution
// ============================================================================

/// The program-cache key for one material on one mesh.
#[must_use]
pub fn program_key_for_material(
    material: &Material,
    mesh_flags: MeshFlags,
    instanced: bool,
    oit_enabled: bool,
) -> ProgramKey {
    let mf = material.flags;
    let name = if mf.contains(MaterialFlags::WATER) {
        ProgramName::Water
    } else if mf.contains(MaterialFlags::TRANSPARENT) {
        if oit_enabled {
            ProgramName::Transparent
        } else {
            ProgramName::Phong
        }
    } else if mf.contains(MaterialFlags::PARTICIPATING_MEDIA) {
        ProgramName::ParticipatingMedia
    } else if mf.contains(MaterialFlags::IMPOSTER) {
        ProgramName::Imposter
    } else {
        ProgramName::Phong
    };

    let mut flags = ProgramFlags::empty();
    if mf.contains(MaterialFlags::ALPHA_TEST) {
        flags |= ProgramFlags::ALPHA_TEST;
    }
    if mesh_flags.contains(MeshFlags::HAS_VERT_COLOURS) {
        flags |= ProgramFlags::VERT_COLOURS;
    }
    if mesh_flags.contains(MeshFlags::USES_SKINNING) {
        flags |= ProgramFlags::SKINNING;
    }
    if mesh_flags.contains(MeshFlags::HAS_VERT_TANGENTS) {
        flags |= ProgramFlags::VERT_TANGENTS;
    }
    if mesh_flags.contains(MeshFlags::POSITION_W_IS_OCT16_NORMAL) {
        flags |= ProgramFlags::POSITION_W_IS_OCT16_NORMAL;
    }
    if instanced {
        flags |= ProgramFlags::INSTANCE_MATRICES;
    }
    if material.lightmap_tex.is_some() {
        flags |= ProgramFlags::LIGHTMAPPING;
    }
    if mf.contains(MaterialFlags::USE_WIND_VERT_SHADER) {
        flags |= ProgramFlags::USE_WIND_VERT_SHADER;
    }
    if mf.contains(MaterialFlags::FANCY_DOUBLE_SIDED) {
        flags |= ProgramFlags::FANCY_DOUBLE_SIDED;
    }
    if mf.contains(MaterialFlags::MATERIALISE_EFFECT) {
        flags |= ProgramFlags::MATERIALISE_EFFECT;
    }
    if mf.contains(MaterialFlags::TERRAIN) {
        flags |= ProgramFlags::TERRAIN;
    }
    if mf.contains(MaterialFlags::DECAL) {
        flags |= ProgramFlags::DECAL;
    }
    if mf.contains(MaterialFlags::PARTICIPATING_MEDIA) {
        flags |= ProgramFlags::PARTICIPATING_MEDIA;
    }
    if mf.contains(MaterialFlags::SDF_TEXT) {
        flags |= ProgramFlags::SDF_TEXT;
    }
    if mf.contains(MaterialFlags::IMPOSTER) {
        flags |= ProgramFlags::IMPOSTER;
    }
    if mf.contains(MaterialFlags::IMPOSTERABLE) {
        flags |= ProgramFlags::IMPOSTERABLE;
    }

    ProgramKey::new(name, flags)
}

/// Resolves (and if necessary starts building) the colour and depth-draw
/// programs for a material, storing them on the material.
pub fn assign_shader_prog_to_material(
    programs: &mut ProgramCache,
    device: &wgpu::Device,
    material: &mut Material,
    mesh_flags: MeshFlags,
    instanced: bool,
    oit_enabled: bool,
) {
    let key = program_key_for_material(material, mesh_flags, instanced, oit_enabled);
    let program = programs.get_program(device, key);
    let depth_program = programs.get_depth_draw_program(device, key);
    material.resolved = Some(crate::resources::material::ResolvedPrograms {
        program,
        depth_program,
    });
}

// ============================================================================
// GPU rows
// ============================================================================

/// Builds the material-table row for a material.
#[must_use]
pub fn material_row(material: &Material) -> MaterialData {
    let m = material.tex_matrix;
    MaterialData {
        diffuse_colour: material.albedo_rgba,
        emission_colour: Vec4::new(
            material.emission_scale,
            material.emission_scale,
            material.emission_scale,
            1.0,
        ),
        texture_upper_left_matrix_col0: glam::Vec2::new(m.x_axis.x, m.x_axis.y),
        texture_upper_left_matrix_col1: glam::Vec2::new(m.y_axis.x, m.y_axis.y),
        texture_matrix_translation: glam::Vec2::new(m.z_axis.x, m.z_axis.y),
        flags: material.packed_uniform_flags(),
        roughness: material.roughness,
        fresnel_scale: material.fresnel_scale,
        metallic_frac: material.metallic,
        begin_fade_out_distance: f32::MAX,
        end_fade_out_distance: f32::MAX,
        materialise_lower_z: material.materialise_lower_z,
        materialise_upper_z: material.materialise_upper_z,
        materialise_start_time: material.materialise_start_time,
        dopacity: material.albedo_rgba.w,
    }
}

/// Builds the per-object table row.
#[must_use]
pub fn per_object_row(ob: &Object, dequant_scale: Vec3, dequant_trans: Vec3) -> PerObjectVertData {
    let mut light_indices = [glam::IVec4::splat(-1); 2];
    for (i, &li) in ob.light_indices.iter().enumerate() {
        light_indices[i / 4][i % 4] = li;
    }
    PerObjectVertData {
        model_matrix: ob.ob_to_world,
        normal_matrix: ob.normal_matrix,
        light_indices,
        depth_draw_depth_bias: ob.depth_draw_depth_bias,
        model_matrix_upper_left_det: ob.det_sign,
        uv0_scale: ob.uv0_scale,
        uv1_scale: ob.uv1_scale,
        dequantise_scale: dequant_scale.extend(1.0),
        dequantise_translation: dequant_trans.extend(0.0),
    }
}

/// Builds the light-table row.
#[must_use]
pub fn light_row(light: &Light) -> LightData {
    LightData {
        pos: light.pos.extend(1.0),
        dir: light.dir.extend(0.0),
        light_colour: light.colour.extend(1.0),
        light_type: 1,
        cone_cos_angle_start: light.cone_cos_angle,
        cone_cos_angle_end: (light.cone_cos_angle - 0.1).max(0.0),
        padding_l0: 0.0,
    }
}

/// Object-space bounding box: the mesh box, or for instanced objects the
/// union of the box under every instance transform.
#[must_use]
pub fn instanced_aabb_os(mesh: &Mesh, ob: &Object) -> crate::scene::Aabb {
    match &ob.instance_matrices {
        Some(matrices) if !matrices.is_empty() => {
            let mut union = crate::scene::Aabb::EMPTY;
            for m in matrices {
                union = union.union(&mesh.aabb_os.transformed(m));
            }
            union
        }
        _ => mesh.aabb_os,
    }
}

// ============================================================================
// Denormalised draw records
// ============================================================================

fn behaviour_bits(flags: MaterialFlags) -> u32 {
    let mut bits = 0;
    if flags.contains(MaterialFlags::TRANSPARENT) {
        bits |= BATCH_FLAG_TRANSPARENT;
    }
    if flags.contains(MaterialFlags::WATER) {
        bits |= BATCH_FLAG_WATER;
    }
    if flags.contains(MaterialFlags::DECAL) {
        bits |= BATCH_FLAG_DECAL;
    }
    if flags.intersects(MaterialFlags::ALPHA_BLEND | MaterialFlags::PARTICIPATING_MEDIA) {
        bits |= BATCH_FLAG_ALPHA_BLEND;
    }
    bits
}

fn face_cull_for(material: &Material, det_sign: f32) -> FaceCull {
    let cull = if material.is_double_sided() {
        FaceCull::None
    } else {
        FaceCull::Back
    };
    if det_sign < 0.0 { cull.flipped() } else { cull }
}

/// Rebuilds `ob.batch_records` from the mesh batches and resolved material
/// programs. The program-built bit is folded in here, which is the only
/// place it is written.
pub fn build_batch_records(ob: &mut Object, mesh: &Mesh, programs: &ProgramCache) {
    ob.mesh_buffer_key = mesh.buffer_key;
    ob.batch_records.clear();
    ob.batch_records.reserve(mesh.batches.len());
    for batch in &mesh.batches {
        let material = &ob.materials[batch.material_slot as usize];
        let Some(resolved) = material.resolved else {
            continue;
        };
        let effective = programs.effective_program(resolved.program);
        ob.batch_records.push(BatchRecord {
            program_index_and_flags: pack_program_index_and_flags(
                effective,
                face_cull_for(material, ob.det_sign),
                behaviour_bits(material.flags),
                programs.effective_is_built(resolved.program),
            ),
            material_index: material.material_index.unwrap_or(0),
            prim_start_offset_b: batch.prim_start_offset_b,
            num_indices: batch.num_indices,
        });
    }
}

/// Rebuilds the coalesced depth-draw batches: adjacent mesh batches are
/// merged when they share a depth program and face culling, their index
/// ranges are contiguous, and neither needs alpha testing. This is what
/// keeps the shadow passes at a fraction of the colour pass's draw count.
pub fn rebuild_object_depth_draw_batches(ob: &mut Object, mesh: &Mesh, programs: &ProgramCache) {
    ob.depth_draw_batches.clear();

    for batch in &mesh.batches {
        let material = &ob.materials[batch.material_slot as usize];
        if !material.casts_shadows() {
            continue;
        }
        let Some(resolved) = material.resolved else {
            continue;
        };
        let effective = programs.effective_program(resolved.depth_program);
        let alpha_test = material.flags.contains(MaterialFlags::ALPHA_TEST);
        let cull = face_cull_for(material, ob.det_sign);
        let record = BatchRecord {
            program_index_and_flags: pack_program_index_and_flags(
                effective,
                cull,
                0,
                programs.effective_is_built(resolved.depth_program),
            ),
            material_index: material.material_index.unwrap_or(0),
            prim_start_offset_b: batch.prim_start_offset_b,
            num_indices: batch.num_indices,
        };

        if let Some(last) = ob.depth_draw_batches.last_mut() {
            let contiguous = last.prim_start_offset_b
                + last.num_indices * mesh.index_type.size_b()
                == record.prim_start_offset_b;
            let same_state =
                last.program_index_and_flags == record.program_index_and_flags;
            if contiguous && same_state && !alpha_test {
                last.num_indices += record.num_indices;
                continue;
            }
        }
        ob.depth_draw_batches.push(record);
    }
}

// ============================================================================
// Renderer admission API
// ============================================================================

impl Renderer {
    /// Admits an object into `scene`, assigning its GPU slots and building
    /// its draw records. Nothing is partially admitted: validation happens
    /// before any slot is allocated.
    pub fn add_object(&mut self, scene: &mut Scene, mut ob: Object) -> Result<ObjectKey> {
        let oit_enabled = self.settings.oit_enabled;
        let Some(state) = self.state.as_mut() else {
            return Err(VistaError::FatalConfig(
                "renderer not initialised".to_owned(),
            ));
        };

        // 1. Validate material slots against the mesh batches.
        let mesh = self
            .meshes
            .get(ob.mesh)
            .ok_or_else(|| VistaError::InvalidObject("mesh handle is stale".to_owned()))?;
        let referenced = mesh.num_materials_referenced();
        if (ob.materials.len() as u32) < referenced {
            return Err(VistaError::InvalidObject(format!(
                "mesh references {referenced} material slots, object supplies {}",
                ob.materials.len()
            )));
        }
        let num_instance_matrices =
            ob.instance_matrices.as_ref().map_or(0, |m| m.len() as u32);
        if num_instance_matrices != ob.num_instances {
            return Err(VistaError::InvalidObject(format!(
                "num_instances is {} but {num_instance_matrices} instance matrices supplied",
                ob.num_instances
            )));
        }

        // 2. Per-object slot.
        ob.per_ob_vert_index = Some(state.frame_data.per_object.allocate());

        // 3. Material rows.
        for material in &mut ob.materials {
            let index = state.frame_data.materials.allocate();
            material.material_index = Some(index);
            state.frame_data.materials.update(index, material_row(material));
        }

        // 4. Joint block for skinned objects.
        if mesh.flags.contains(MeshFlags::USES_SKINNING)
            && let Some(anim_data) = &mesh.animation_data
        {
            let num_joints = anim_data.rig.num_joints() as u32;
            if num_joints > 0 {
                ob.joint_matrices_base_index =
                    Some(state.frame_data.joints.allocate_block(num_joints));
                ob.joint_count = num_joints;
                if ob.anim.is_none() {
                    ob.anim = Some(Box::default());
                }
            }
        }

        // Instance-transform block for instanced objects.
        if let Some(matrices) = &ob.instance_matrices {
            let base = state
                .frame_data
                .instance_transforms
                .allocate_block(matrices.len() as u32);
            state.frame_data.instance_transforms.update_block(base, matrices);
            ob.instance_transforms_base_index = Some(base);
        }

        // 5. Resolve programs per material slot.
        let mesh_flags = mesh.flags;
        let instanced = ob.num_instances > 0;
        for material in &mut ob.materials {
            assign_shader_prog_to_material(
                &mut state.programs,
                &state.device,
                material,
                mesh_flags,
                instanced,
                oit_enabled,
            );
        }

        // 6. World AABB from the mesh's object-space box; instanced objects
        //    cover the union of their instance boxes.
        ob.aabb_os = instanced_aabb_os(mesh, &ob);
        let transform = ob.ob_to_world;
        ob.set_transform(transform);

        // 7. Light assignment from the grid.
        ob.light_indices = scene.lights.assign_light_indices(&ob.aabb_ws);

        // 8. Per-object row upload.
        let dequant = mesh.dequantise;
        state.frame_data.per_object.update(
            ob.per_ob_vert_index.unwrap_or(0),
            per_object_row(&ob, dequant.scale, dequant.translation),
        );

        // 9-10. Depth-draw coalescing and batch records.
        rebuild_object_depth_draw_batches(&mut ob, mesh, &state.programs);
        build_batch_records(&mut ob, mesh, &state.programs);

        ob.random_num = self.rand_pool.next_value();

        let key = scene.objects.insert(ob);
        scene.insert_into_sets(key);
        Ok(key)
    }

    /// Removes an object, returning every GPU slot it owned to the free
    /// sets. The exact inverse of [`add_object`](Self::add_object).
    pub fn remove_object(&mut self, scene: &mut Scene, key: ObjectKey) -> Option<Object> {
        scene.remove_from_sets(key);
        let ob = scene.objects.remove(key)?;
        if let Some(state) = self.state.as_mut() {
            if let Some(index) = ob.per_ob_vert_index {
                state.frame_data.per_object.free(index);
            }
            for material in &ob.materials {
                if let Some(index) = material.material_index {
                    state.frame_data.materials.free(index);
                }
            }
            if let Some(base) = ob.joint_matrices_base_index {
                state.frame_data.joints.free_block(base);
            }
            if let Some(base) = ob.instance_transforms_base_index {
                state.frame_data.instance_transforms.free_block(base);
            }
        }
        Some(ob)
    }

    /// Re-runs the derived admission steps (world AABB, light assignment,
    /// per-object upload, depth batches, draw records) after a transform or
    /// material change.
    pub fn rebuild_denormalised_draw_data(&mut self, scene: &mut Scene, key: ObjectKey) {
        let oit_enabled = self.settings.oit_enabled;
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let Some(ob) = scene.objects.get_mut(key) else {
            return;
        };
        let Some(mesh) = self.meshes.get(ob.mesh) else {
            return;
        };

        ob.aabb_os = instanced_aabb_os(mesh, ob);
        let transform = ob.ob_to_world;
        ob.set_transform(transform);
        ob.light_indices = scene.lights.assign_light_indices(&ob.aabb_ws);

        // Instance-block bookkeeping follows the current matrices: allocate
        // on first use, reallocate when the count changes, re-upload in
        // place otherwise, and release when instancing is cleared.
        match (&ob.instance_matrices, ob.instance_transforms_base_index) {
            (Some(matrices), Some(base)) => {
                let table = &mut state.frame_data.instance_transforms;
                if table.allocator.block_size(base) == Some(matrices.len() as u32) {
                    table.update_block(base, matrices);
                } else {
                    table.free_block(base);
                    let new_base = table.allocate_block(matrices.len() as u32);
                    table.update_block(new_base, matrices);
                    ob.instance_transforms_base_index = Some(new_base);
                }
            }
            (Some(matrices), None) => {
                let table = &mut state.frame_data.instance_transforms;
                let base = table.allocate_block(matrices.len() as u32);
                table.update_block(base, matrices);
                ob.instance_transforms_base_index = Some(base);
            }
            (None, Some(base)) => {
                state.frame_data.instance_transforms.free_block(base);
                ob.instance_transforms_base_index = None;
            }
            (None, None) => {}
        }

        let mesh_flags = mesh.flags;
        let instanced = ob.num_instances > 0;
        for material in &mut ob.materials {
            assign_shader_prog_to_material(
                &mut state.programs,
                &state.device,
                material,
                mesh_flags,
                instanced,
                oit_enabled,
            );
            if let Some(index) = material.material_index {
                state.frame_data.materials.update(index, material_row(material));
            }
        }

        if let Some(index) = ob.per_ob_vert_index {
            state.frame_data.per_object.update(
                index,
                per_object_row(ob, mesh.dequantise.scale, mesh.dequantise.translation),
            );
        }

        rebuild_object_depth_draw_batches(ob, mesh, &state.programs);
        build_batch_records(ob, mesh, &state.programs);
    }

    /// Updates an object's world transform and everything derived from it.
    pub fn set_object_transform(
        &mut self,
        scene: &mut Scene,
        key: ObjectKey,
        ob_to_world: glam::Mat4,
    ) {
        if let Some(ob) = scene.objects.get_mut(key) {
            ob.ob_to_world = ob_to_world;
        }
        self.rebuild_denormalised_draw_data(scene, key);
    }

    // ------------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------------

    /// Inserts a light: assigns its light-table row, indexes it in the
    /// grid, and refreshes the light lists of every object its volume
    /// touches.
    pub fn add_light(&mut self, scene: &mut Scene, mut light: Light) -> Option<LightKey> {
        let state = self.state.as_mut()?;
        let row = state.frame_data.lights.allocate();
        light.buffer_index = row as i32;
        state.frame_data.lights.update(row, light_row(&light));
        let aabb = light.volume_aabb();
        let key = scene.lights.insert(light);
        self.refresh_light_assignments(scene, &aabb);
        Some(key)
    }

    /// Removes a light, freeing its row and refreshing affected objects.
    pub fn remove_light(&mut self, scene: &mut Scene, key: LightKey) {
        let Some(aabb) = scene.lights.light_aabb(key) else {
            return;
        };
        if let Some(light) = scene.lights.remove(key)
            && light.buffer_index >= 0
            && let Some(state) = self.state.as_mut()
        {
            state.frame_data.lights.free(light.buffer_index as u32);
        }
        self.refresh_light_assignments(scene, &aabb);
    }

    /// Moves or reshapes a light.
    pub fn update_light(&mut self, scene: &mut Scene, key: LightKey, mut light: Light) {
        let Some(old) = scene.lights.get(key) else {
            return;
        };
        light.buffer_index = old.buffer_index;
        let old_aabb = scene.lights.light_aabb(key).unwrap_or(light.volume_aabb());
        if light.buffer_index >= 0
            && let Some(state) = self.state.as_mut()
        {
            state
                .frame_data
                .lights
                .update(light.buffer_index as u32, light_row(&light));
        }
        let new_aabb = light.volume_aabb();
        scene.lights.update(key, light);
        let union = old_aabb.union(&new_aabb);
        self.refresh_light_assignments(scene, &union);
    }

    /// Re-runs light assignment for every object whose AABB intersects
    /// `aabb` and uploads their refreshed rows.
    fn refresh_light_assignments(&mut self, scene: &mut Scene, aabb: &crate::scene::Aabb) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        for (_, ob) in scene.objects.iter_mut() {
            if !ob.aabb_ws.intersects(aabb) {
                continue;
            }
            ob.light_indices = scene.lights.assign_light_indices(&ob.aabb_ws);
            if let (Some(index), Some(mesh)) = (ob.per_ob_vert_index, self.meshes.get(ob.mesh)) {
                state.frame_data.per_object.update(
                    index,
                    per_object_row(ob, mesh.dequantise.scale, mesh.dequantise.translation),
                );
            }
        }
    }

    /// Rebuilds draw records for every object referencing one of
    /// `completed` programs; called when asynchronous builds finish so the
    /// program-built bit becomes visible.
    pub fn rebuild_records_for_programs(
        &mut self,
        scene: &mut Scene,
        completed: &[ProgramIndex],
    ) {
        if completed.is_empty() {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };
        for (_, ob) in scene.objects.iter_mut() {
            let affected = ob
                .materials
                .iter()
                .filter_map(|m| m.resolved)
                .any(|r| {
                    completed.contains(&r.program) || completed.contains(&r.depth_program)
                })
                || ob
                    .batch_records
                    .iter()
                    .chain(ob.depth_draw_batches.iter())
                    .any(|rec| {
                        completed.contains(&batch_program_index(rec.program_index_and_flags))
                    });
            if !affected {
                continue;
            }
            let Some(mesh) = self.meshes.get(ob.mesh) else {
                continue;
            };
            rebuild_object_depth_draw_batches(ob, mesh, &state.programs);
            build_batch_records(ob, mesh, &state.programs);
        }
    }
}
