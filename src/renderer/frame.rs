//! The per-frame orchestrator.
//!
//! `Renderer::draw` runs the fixed pass sequence over a frozen scene:
//!
//! 1. drain the deferred unused-texture queue and trim the cache
//! 2. poll asynchronous program builds and rebuild affected draw records
//! 3. (scatter-path table writes flush with the frame data sync)
//! 4. tick materialise effects, retiring them after one second
//! 5. evaluate skeletal animation on the worker pool and upload joints
//! 6. write `SharedVertUniforms` and `MaterialCommonUniforms` once
//! 7. shadow maps (dynamic cascades + the staggered static cascade)
//! 8. background clear / env
//! 9. optional SSAO prepass
//! 10. opaque pass (colour + normal)
//! 11. water pass (copy-blit, then draw)
//! 12. decal pass (depth/normal blit, colour-only draw)
//! 13. alpha-blended pass, back-to-front
//! 14. transparency (OIT dual-target, or sorted alpha fallback)
//! 15. always-visible pass (ghost then solid)
//! 16. selection outline
//! 17. post-process chain into the final target
//! 18. 2D overlays
//! 19. statistics
//!
//! The surface texture is acquired as late as possible and presented right
//! after submission. The frame loop never blocks on the driver.

use parking_lot::Mutex;

use crate::animation::evaluator::{AnimationWorkItem, evaluate_parallel};
use crate::renderer::buffers::{MaterialCommonUniforms, SharedVertUniforms};
use crate::renderer::passes::outline::OutlinePass;
use crate::renderer::{Renderer, RendererState};
use crate::resources::material::MaterialFlags;
use crate::scene::Scene;
use crate::scene::object::ObjectKey;

/// Animated objects whose projected length is below this fraction of the
/// viewport are skipped (unless they have never been evaluated).
const MIN_ANIM_PROJECTED_FRAC: f32 = 0.01;

/// Materialise effects retire this long after they start.
const MATERIALISE_DURATION_S: f32 = 1.0;

impl Renderer {
    /// Renders `scene` to the window surface.
    pub fn draw(&mut self, scene: &mut Scene, current_time: f32) {
        self.draw_internal(scene, current_time, None);
    }

    /// Renders `scene` into a caller-supplied target instead of the
    /// surface.
    pub fn draw_to_target(
        &mut self,
        scene: &mut Scene,
        current_time: f32,
        target: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
    ) {
        self.draw_internal(scene, current_time, Some((target, target_format)));
    }

    #[allow(clippy::too_many_lines)]
    fn draw_internal(
        &mut self,
        scene: &mut Scene,
        current_time: f32,
        external_target: Option<(&wgpu::TextureView, wgpu::TextureFormat)>,
    ) {
        if self.state.is_none() {
            return;
        }

        // ---- 1. Deferred texture bookkeeping ----
        self.textures.process_unused_queue();
        let evicted = self.textures.trim_texture_usage();

        // ---- 2. Async program completion (and the hot-reload hook) ----
        let completed = self
            .state
            .as_mut()
            .map(|s| {
                if s.programs.programs_changed {
                    s.programs.rebuild_all(&s.device);
                    // Everything transitioned to Building; refresh all
                    // records so their built bits clear until re-link.
                    let all: Vec<_> = (0..s.programs.registry.len() as u32).collect();
                    return all.into_iter().collect();
                }
                s.programs.poll_builds()
            })
            .unwrap_or_default();
        self.rebuild_records_for_programs(scene, &completed);

        // Progressive mesh uploads within this frame's budget.
        self.upload_some_mesh_data();

        // ---- 4. Materialise effect tick ----
        self.tick_materialise_effects(scene, current_time);

        // ---- 5. Animation evaluation ----
        let num_animated = self.evaluate_animations(scene, current_time);

        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.stats.reset();
        state.stats.num_textures_evicted = evicted;
        state.stats.num_animated_obs_processed = num_animated;

        // Acquire the surface before encoding; present after submit.
        let surface_frame = if external_target.is_none() {
            match (&state.surface, &state.surface_config) {
                (Some(surface), Some(_)) => match surface.get_current_texture() {
                    wgpu::CurrentSurfaceTexture::Success(frame)
                    | wgpu::CurrentSurfaceTexture::Suboptimal(frame) => Some(frame),
                    wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                        return;
                    }
                    other => {
                        log::error!("Surface acquire failed: {other:?}");
                        return;
                    }
                },
                _ => return,
            }
        } else {
            None
        };
        let surface_view = surface_frame.as_ref().map(|frame| {
            frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        let (final_view, final_format) = match (&external_target, &surface_view) {
            (Some((view, format)), _) => (*view, *format),
            (None, Some(view)) => (
                view as &wgpu::TextureView,
                state
                    .surface_config
                    .as_ref()
                    .map_or(wgpu::TextureFormat::Bgra8Unorm, |c| c.format),
            ),
            (None, None) => return,
        };

        let RendererState {
            device,
            queue,
            features,
            programs,
            frame_data,
            targets,
            material_textures,
            shadow,
            water_resources,
            scene_passes,
            ssao,
            post,
            overlay,
            fullscreen,
            scatter,
            outline_program,
            frame_counter,
            stats,
            ..
        } = state;

        let use_mdi = features.multi_draw_indirect;
        let viewport = (targets.width, targets.height);

        // ---- 6. Once-per-frame uniform blocks ----
        let cam = &scene.camera;
        let shared = SharedVertUniforms {
            proj_matrix: cam.projection_matrix(),
            view_matrix: cam.world_to_camera(),
            vert_sun_dir: scene.params.sun_dir.extend(0.0),
            grass_pusher_sphere_pos: cam.position().extend(1.0),
            campos_ws: cam.position().extend(1.0),
            vert_uniforms_time: current_time,
            wind_strength: scene.params.wind_strength,
            padding_a0: 0.0,
            padding_a1: 0.0,
        };
        frame_data.write_shared_vert(queue, &shared);
        frame_data.write_material_common(
            queue,
            &MaterialCommonUniforms {
                frag_sun_dir: scene.params.sun_dir.extend(0.0),
                sun_spec_rad_times_solid_angle: glam::Vec4::splat(1.0),
                sun_and_sky_av_spec_rad: glam::Vec4::splat(0.25),
                air_scattering_coeffs: glam::Vec4::new(5.8e-6, 1.35e-5, 3.31e-5, 0.0),
                mat_common_campos_ws: cam.position().extend(1.0),
                near_clip_dist: cam.near,
                far_clip_dist: cam.max_draw_dist,
                mat_common_time: current_time,
                // Reciprocal viewport dimensions: framebuffer position →
                // screen UV in the shaders.
                l_over_w: 1.0 / viewport.0 as f32,
                l_over_h: 1.0 / viewport.1 as f32,
                env_phi: 0.0,
                water_level_z: scene.params.water_level_z,
                mat_common_flags: 0,
                shadow_map_samples_xy_scale: 1.0,
                padding_b0: 0.0,
                padding_b1: 0.0,
                padding_b2: 0.0,
            },
        );

        // ---- Prepare phase: draw lists, pipelines, pass uniforms ----
        frame_data.draw_commands.clear();
        frame_data.indices_rows.clear();

        shadow.prepare(
            device,
            queue,
            *frame_counter,
            scene,
            &self.meshes,
            programs,
            frame_data,
            material_textures,
            &shared,
            stats,
        );
        scene_passes.prepare(
            device,
            programs,
            &self.meshes,
            frame_data,
            material_textures,
            &shadow.lit_layout,
            &water_resources.layout,
            scene,
            self.settings.ssao_enabled,
            self.settings.oit_enabled,
            *outline_program,
            stats,
        );
        ssao.prepare(queue, cam.projection_matrix(), targets);
        post.prepare(
            queue,
            scene.params.dof_focus_distance,
            scene.params.dof_blur_strength,
            cam.near,
            scene.params.bloom_strength,
            scene.params.exposure,
            scene.params.saturation,
        );
        overlay.prepare(device, queue, scene.overlay_objects.values(), viewport);

        shadow.rebuild_lit_bind_group(device, targets);
        water_resources.rebuild(device, targets);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vista_frame"),
        });

        // ---- 3. Table sync: growth copies, scatter dispatches, rebinds ----
        frame_data.sync_and_rebind(device, queue, &mut encoder, scatter.as_mut());

        let Some(frame_bind_group) = frame_data.bind_group().cloned() else {
            return;
        };
        let indirect = frame_data.draw_commands.buffer().cloned();
        let lit_bind_group = shadow.lit_bind_group().cloned();

        // ---- 7. Shadow maps ----
        shadow.encode(
            &mut encoder,
            frame_data,
            &self.meshes,
            material_textures,
            use_mdi,
            stats,
        );

        let bg = scene.params.background_colour;
        let clear_colour = wgpu::Color {
            r: f64::from(bg.x),
            g: f64::from(bg.y),
            b: f64::from(bg.z),
            a: 1.0,
        };
        let depth_clear = if cam.reverse_z() { 0.0 } else { 1.0 };

        // ---- 8. Background / env: clear the main attachments to the
        //         scene background (the env draw slots in here when a sky
        //         is present; depth writes stay off either way) ----
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Env Background Pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &targets.main_colour.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &targets.main_normal.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.main_depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth_clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        // ---- 9. SSAO prepass (half-res geometry + compute + blurs) ----
        if self.settings.ssao_enabled {
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("SSAO Geometry Prepass"),
                    color_attachments: &[
                        Some(wgpu::RenderPassColorAttachment {
                            view: &targets.prepass_colour.view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(clear_colour),
                                store: wgpu::StoreOp::Store,
                            },
                        }),
                        Some(wgpu::RenderPassColorAttachment {
                            view: &targets.prepass_normal.view,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        }),
                    ],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &targets.prepass_depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(depth_clear),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
                if let Some(lit) = &lit_bind_group {
                    scene_passes.prepass.encode(
                        &mut pass,
                        &self.meshes,
                        &frame_bind_group,
                        &material_textures.bind_group,
                        Some(lit),
                        indirect.as_ref(),
                        use_mdi,
                        stats,
                    );
                }
            }
            targets.blit_prepass_to_copies(&mut encoder);
            ssao.encode(device, &mut encoder, fullscreen, targets);
        }

        // ---- 10. Opaque pass (colour + normal) ----
        {
            let mut pass = main_targets_pass(&mut encoder, targets, "Opaque Pass");
            if let Some(lit) = &lit_bind_group {
                scene_passes.opaque.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        }

        // ---- 11. Water: blit colour+depth+normal, then draw ----
        if !scene_passes.water.list.is_empty() {
            targets.blit_main_to_copies(&mut encoder);
            let mut pass = main_targets_pass(&mut encoder, targets, "Water Pass");
            if let Some(water_bg) = water_resources.bind_group() {
                scene_passes.water.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(water_bg),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        }

        // ---- 12. Decals: blit depth+normal, colour-only draw ----
        if !scene_passes.decal.list.is_empty() {
            targets.blit_depth_and_normal_to_copies(&mut encoder);
            let mut pass = main_targets_pass(&mut encoder, targets, "Decal Pass");
            if let Some(lit) = &lit_bind_group {
                scene_passes.decal.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        }

        // ---- 13. Alpha-blended, back-to-front ----
        if !scene_passes.alpha.list.is_empty() {
            let mut pass = main_targets_pass(&mut encoder, targets, "Alpha Blend Pass");
            if let Some(lit) = &lit_bind_group {
                scene_passes.alpha.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        }

        // ---- 14. Transparency ----
        let oit_ran = self.settings.oit_enabled && !scene_passes.transparency.list.is_empty();
        if oit_ran {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("OIT Transparency Pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &targets.oit_accum.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &targets.oit_transmittance.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.main_depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if let Some(lit) = &lit_bind_group {
                scene_passes.transparency.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        } else if !scene_passes.transparency.list.is_empty() {
            let mut pass = main_targets_pass(&mut encoder, targets, "Transparency Pass");
            if let Some(lit) = &lit_bind_group {
                scene_passes.transparency.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        }

        // ---- 15. Always-visible: ghost then depth-tested solid ----
        if !scene_passes.always_visible_ghost.list.is_empty()
            || !scene_passes.always_visible_solid.list.is_empty()
        {
            let mut pass = main_targets_pass(&mut encoder, targets, "Always Visible Pass");
            pass.set_blend_constant(wgpu::Color {
                r: 0.5,
                g: 0.5,
                b: 0.5,
                a: 0.5,
            });
            if let Some(lit) = &lit_bind_group {
                scene_passes.always_visible_ghost.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
                scene_passes.always_visible_solid.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    Some(lit),
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
        }

        // ---- 16. Selection outline ----
        if !scene_passes.outline_objects.list.is_empty() {
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Outline Object Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &targets.outline_colour.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &targets.outline_depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
                scene_passes.outline_objects.encode(
                    &mut pass,
                    &self.meshes,
                    &frame_bind_group,
                    &material_textures.bind_group,
                    None,
                    indirect.as_ref(),
                    use_mdi,
                    stats,
                );
            }
            OutlinePass::encode(device, &mut encoder, fullscreen, targets);
        }

        // ---- 17. Post-process chain into the final target ----
        post.encode(
            device,
            &mut encoder,
            fullscreen,
            targets,
            oit_ran,
            scene.params.dof_blur_strength > 0.0,
            final_view,
            final_format,
        );

        // ---- 18. Overlays ----
        overlay.encode(device, &mut encoder, final_view, final_format, viewport);

        // ---- Submit, present, statistics ----
        queue.submit(Some(encoder.finish()));
        if let Some(frame) = surface_frame {
            frame.present();
        }

        shadow.end_frame(*frame_counter);
        *frame_counter += 1;
    }

    // ------------------------------------------------------------------------
    // Step 4: materialise effects
    // ------------------------------------------------------------------------

    fn tick_materialise_effects(&mut self, scene: &mut Scene, current_time: f32) {
        if scene.materialise_objects.is_empty() {
            return;
        }
        let keys: Vec<ObjectKey> = scene.materialise_objects.iter().copied().collect();
        for key in keys {
            let mut retire = false;
            {
                let Some(state) = self.state.as_mut() else {
                    return;
                };
                let Some(ob) = scene.objects.get_mut(key) else {
                    continue;
                };
                let (lower_z, upper_z) = (ob.aabb_ws.min.z, ob.aabb_ws.max.z);
                for material in &mut ob.materials {
                    if !material.flags.contains(MaterialFlags::MATERIALISE_EFFECT) {
                        continue;
                    }
                    if material.materialise_start_time < 0.0 {
                        material.materialise_start_time = current_time;
                    }
                    material.materialise_lower_z = lower_z;
                    material.materialise_upper_z = upper_z;
                    if current_time - material.materialise_start_time > MATERIALISE_DURATION_S {
                        material.flags.remove(MaterialFlags::MATERIALISE_EFFECT);
                        material.materialise_start_time = -1.0;
                        retire = true;
                    }
                    if let Some(index) = material.material_index {
                        state
                            .frame_data
                            .materials
                            .update(index, super::admission::material_row(material));
                    }
                }
            }
            if retire {
                // The behaviour flag changed: programs and records refresh.
                self.rebuild_denormalised_draw_data(scene, key);
                scene.materialise_objects.remove(&key);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Step 5: animation
    // ------------------------------------------------------------------------

    fn evaluate_animations(&mut self, scene: &mut Scene, current_time: f32) -> u32 {
        if scene.animated_objects.is_empty() {
            return 0;
        }

        let sun_dir = scene.params.sun_dir;
        let volume = scene.camera.shadow_volume(
            sun_dir,
            scene.params.max_shadowing_dist,
            scene.camera.max_draw_dist,
        );
        let cam_pos = scene.camera.position();
        let sensor_ratio =
            scene.camera.sensor.use_sensor_width / scene.camera.sensor.lens_sensor_dist;

        // Move each eligible object's state out for the parallel section.
        let mut keys: Vec<ObjectKey> = Vec::new();
        let mut items: Vec<Mutex<AnimationWorkItem>> = Vec::new();
        for &key in &scene.animated_objects {
            let Some(ob) = scene.objects.get_mut(key) else {
                continue;
            };
            let Some(anim_data) = self
                .meshes
                .get(ob.mesh)
                .and_then(|m| m.animation_data.clone())
            else {
                continue;
            };
            let never_evaluated = ob
                .anim
                .as_ref()
                .is_some_and(|a| a.joint_matrices.is_empty());
            if !never_evaluated {
                if !volume.intersects_aabb(&ob.aabb_ws) {
                    continue;
                }
                if ob.projected_frac(cam_pos, sensor_ratio) < MIN_ANIM_PROJECTED_FRAC {
                    continue;
                }
            }
            let Some(anim_state) = ob.anim.take() else {
                continue;
            };
            keys.push(key);
            items.push(Mutex::new(AnimationWorkItem {
                data: anim_data,
                state: anim_state,
            }));
        }

        // Distribute across the pool through one atomic counter; joined
        // before any upload below.
        evaluate_parallel(&self.task_pool, &mut items, current_time);

        // Workers are joined; move the states back and upload joint blocks.
        let num_processed = items.len() as u32;
        for (key, item) in keys.into_iter().zip(items) {
            let work = item.into_inner();
            if let Some(ob) = scene.objects.get_mut(key) {
                if let Some(base) = ob.joint_matrices_base_index
                    && let Some(renderer_state) = self.state.as_mut()
                    && !work.state.joint_matrices.is_empty()
                {
                    renderer_state
                        .frame_data
                        .joints
                        .update_block(base, &work.state.joint_matrices);
                }
                ob.anim = Some(work.state);
            }
        }
        num_processed
    }
}

/// A render pass over the main colour + normal + depth attachments with
/// everything loaded (the mid-frame passes).
fn main_targets_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    targets: &'a crate::renderer::targets::RenderTargets,
    label: &'static str,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[
            Some(wgpu::RenderPassColorAttachment {
                view: &targets.main_colour.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            }),
            Some(wgpu::RenderPassColorAttachment {
                view: &targets.main_normal.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            }),
        ],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &targets.main_depth.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}
