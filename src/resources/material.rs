//! Material descriptions.
//!
//! A material is the appearance of one mesh batch: colour and texture inputs,
//! the packed per-fragment `uniform_flags` word the shaders branch on, and
//! behaviour flags that route batches into the right passes (water, decal,
//! alpha-blend, ...). The resolved shader program and depth-draw program are
//! attached when the material's object is admitted, and re-resolved whenever
//! a behaviour flag changes.

use bitflags::bitflags;
use glam::{Mat3, Vec4};

use crate::renderer::programs::ProgramIndex;

bitflags! {
    /// Behavioural material flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialFlags: u32 {
        const TRANSPARENT         = 1 << 0;
        const ALPHA_BLEND         = 1 << 1;
        const DECAL               = 1 << 2;
        const WATER               = 1 << 3;
        const PARTICIPATING_MEDIA = 1 << 4;
        const SIMPLE_DOUBLE_SIDED = 1 << 5;
        const FANCY_DOUBLE_SIDED  = 1 << 6;
        const USE_WIND_VERT_SHADER = 1 << 7;
        const IMPOSTER            = 1 << 8;
        const IMPOSTERABLE        = 1 << 9;
        const MATERIALISE_EFFECT  = 1 << 10;
        const TERRAIN             = 1 << 11;
        const SDF_TEXT            = 1 << 12;
        /// Albedo texture has meaningful alpha; enables alpha testing.
        const ALPHA_TEST          = 1 << 13;
    }
}

// Bits of the packed `uniform_flags` word read by the fragment shaders.
pub const UNIFORM_HAVE_ALBEDO_TEX: u32 = 1;
pub const UNIFORM_HAVE_METALLIC_ROUGHNESS_TEX: u32 = 2;
pub const UNIFORM_HAVE_EMISSION_TEX: u32 = 4;
pub const UNIFORM_HAVE_NORMAL_MAP: u32 = 8;
pub const UNIFORM_HAVE_TRANSMISSION_TEX: u32 = 16;
pub const UNIFORM_HAVE_LIGHTMAP: u32 = 32;
pub const UNIFORM_IMPOSTER_TEX_HAS_MULTIPLE_ANGLES: u32 = 64;

/// Reference to a texture in the residency cache, by its opaque path key.
pub type TextureRef = Option<String>;

/// Shader programs resolved for a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrograms {
    pub program: ProgramIndex,
    pub depth_program: ProgramIndex,
}

#[derive(Debug, Clone)]
pub struct Material {
    /// Linear-space albedo colour; `w` is alpha.
    pub albedo_rgba: Vec4,
    pub albedo_tex: TextureRef,
    /// 2D texture-coordinate transform applied to the albedo UVs.
    pub tex_matrix: Mat3,
    pub metallic_roughness_tex: TextureRef,
    pub emission_tex: TextureRef,
    pub emission_scale: f32,
    pub normal_map: TextureRef,
    pub transmission_tex: TextureRef,
    pub lightmap_tex: TextureRef,

    pub roughness: f32,
    pub metallic: f32,
    pub fresnel_scale: f32,

    pub flags: MaterialFlags,
    /// The imposter texture stores several view angles side by side; the
    /// imposter shader picks the slice matching the view direction.
    pub imposter_tex_has_multiple_angles: bool,

    /// Materialise-effect state; Z bounds come from the owning object's AABB
    /// and `start_time` drives the 1-second retire.
    pub materialise_lower_z: f32,
    pub materialise_upper_z: f32,
    pub materialise_start_time: f32,

    /// Row in the GPU material table, assigned at admission.
    pub material_index: Option<u32>,
    /// Programs resolved at admission or on behaviour-flag change.
    pub resolved: Option<ResolvedPrograms>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo_rgba: Vec4::new(0.85, 0.85, 0.85, 1.0),
            albedo_tex: None,
            tex_matrix: Mat3::IDENTITY,
            metallic_roughness_tex: None,
            emission_tex: None,
            emission_scale: 0.0,
            normal_map: None,
            transmission_tex: None,
            lightmap_tex: None,
            roughness: 0.5,
            metallic: 0.0,
            fresnel_scale: 1.0,
            flags: MaterialFlags::empty(),
            imposter_tex_has_multiple_angles: false,
            materialise_lower_z: 0.0,
            materialise_upper_z: 0.0,
            materialise_start_time: -1.0,
            material_index: None,
            resolved: None,
        }
    }
}

impl Material {
    /// The packed word the fragment shader reads from the material table.
    #[must_use]
    pub fn packed_uniform_flags(&self) -> u32 {
        let mut f = 0;
        if self.albedo_tex.is_some() {
            f |= UNIFORM_HAVE_ALBEDO_TEX;
        }
        if self.metallic_roughness_tex.is_some() {
            f |= UNIFORM_HAVE_METALLIC_ROUGHNESS_TEX;
        }
        if self.emission_tex.is_some() {
            f |= UNIFORM_HAVE_EMISSION_TEX;
        }
        if self.normal_map.is_some() {
            f |= UNIFORM_HAVE_NORMAL_MAP;
        }
        if self.transmission_tex.is_some() {
            f |= UNIFORM_HAVE_TRANSMISSION_TEX;
        }
        if self.lightmap_tex.is_some() {
            f |= UNIFORM_HAVE_LIGHTMAP;
        }
        if self.imposter_tex_has_multiple_angles {
            f |= UNIFORM_IMPOSTER_TEX_HAS_MULTIPLE_ANGLES;
        }
        f
    }

    #[inline]
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.flags.contains(MaterialFlags::TRANSPARENT)
    }

    #[inline]
    #[must_use]
    pub fn is_alpha_blended(&self) -> bool {
        self.flags.contains(MaterialFlags::ALPHA_BLEND)
    }

    #[inline]
    #[must_use]
    pub fn is_decal(&self) -> bool {
        self.flags.contains(MaterialFlags::DECAL)
    }

    #[inline]
    #[must_use]
    pub fn is_water(&self) -> bool {
        self.flags.contains(MaterialFlags::WATER)
    }

    #[inline]
    #[must_use]
    pub fn is_double_sided(&self) -> bool {
        self.flags
            .intersects(MaterialFlags::SIMPLE_DOUBLE_SIDED | MaterialFlags::FANCY_DOUBLE_SIDED)
    }

    #[inline]
    #[must_use]
    pub fn materialise_active(&self) -> bool {
        self.materialise_start_time >= 0.0
    }

    /// True when this material draws into the depth/shadow passes.
    #[must_use]
    pub fn casts_shadows(&self) -> bool {
        !self.flags.intersects(
            MaterialFlags::TRANSPARENT
                | MaterialFlags::WATER
                | MaterialFlags::DECAL
                | MaterialFlags::PARTICIPATING_MEDIA,
        )
    }
}
