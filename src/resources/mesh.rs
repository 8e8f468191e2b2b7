//! Meshes: geometry data, batches and incremental upload.
//!
//! A mesh is immutable once its upload completes. It owns vertex and index
//! buffer allocations, a vertex attribute specification, a list of batches
//! (primitive range + material slot), a local-space bounding box, optional
//! animation data, and feature flags that participate in shader variant
//! selection.
//!
//! Uploads may be split over several frames through [`MeshUploadProgress`];
//! until the index data has finished uploading, no batch referencing the
//! mesh is submitted for drawing.

use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec3;
use slotmap::{SlotMap, new_key_type};

use crate::animation::AnimationData;
use crate::errors::{Result, VistaError};
use crate::scene::bounds::Aabb;

new_key_type! {
    /// Handle to a mesh in the [`MeshStore`].
    pub struct MeshHandle;
}

bitflags! {
    /// Mesh feature flags feeding shader variant selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MeshFlags: u32 {
        const HAS_SHADING_NORMALS       = 1 << 0;
        const HAS_VERT_COLOURS          = 1 << 1;
        const HAS_UVS                   = 1 << 2;
        const HAS_VERT_TANGENTS         = 1 << 3;
        const USES_SKINNING             = 1 << 4;
        /// Position W holds an oct16-encoded normal.
        const POSITION_W_IS_OCT16_NORMAL = 1 << 5;
    }
}

/// One vertex attribute within the interleaved vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub shader_location: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u32,
}

/// Interleaved vertex layout description.
#[derive(Debug, Clone, Default)]
pub struct VertexSpec {
    pub attributes: Vec<VertexAttribute>,
    pub stride: u32,
}

/// A contiguous index range drawing with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Byte offset of the first index in the index buffer.
    pub prim_start_offset_b: u32,
    pub num_indices: u32,
    pub material_slot: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    #[inline]
    #[must_use]
    pub fn size_b(self) -> u32 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_wgpu(self) -> wgpu::IndexFormat {
        match self {
            Self::U16 => wgpu::IndexFormat::Uint16,
            Self::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// Dequantisation transform for quantised vertex positions.
///
/// Meshes without quantised positions use the identity (`scale = 1`,
/// `translation = 0`). A zero scale is rejected at registration.
#[derive(Debug, Clone, Copy)]
pub struct Dequantise {
    pub scale: Vec3,
    pub translation: Vec3,
}

impl Default for Dequantise {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            translation: Vec3::ZERO,
        }
    }
}

// ============================================================================
// Upload progress
// ============================================================================

/// Cursor tracking an incremental mesh upload.
///
/// Vertex data uploads first, then index data; `indices_done` gates batch
/// submission for the mesh.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshUploadProgress {
    pub vert_bytes_uploaded: u64,
    pub index_bytes_uploaded: u64,
    pub verts_done: bool,
    pub indices_done: bool,
}

impl MeshUploadProgress {
    /// A cursor describing an already-complete (synchronous) upload.
    #[must_use]
    pub fn complete(vert_bytes: u64, index_bytes: u64) -> Self {
        Self {
            vert_bytes_uploaded: vert_bytes,
            index_bytes_uploaded: index_bytes,
            verts_done: true,
            indices_done: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn done(&self) -> bool {
        self.verts_done && self.indices_done
    }
}

// ============================================================================
// Mesh
// ============================================================================

/// GPU side of a mesh: the buffers batches draw from.
pub struct MeshGpu {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
}

/// Immutable mesh data.
pub struct Mesh {
    pub vert_data: Vec<u8>,
    pub index_data: Vec<u8>,
    pub index_type: IndexType,
    pub vertex_spec: VertexSpec,
    pub batches: Vec<Batch>,
    pub aabb_os: Aabb,
    pub flags: MeshFlags,
    pub dequantise: Dequantise,
    pub animation_data: Option<Arc<AnimationData>>,

    /// Identifies this mesh's buffer bindings in draw sort keys.
    pub buffer_key: u16,

    pub gpu: Option<MeshGpu>,
    pub upload: MeshUploadProgress,
}

impl Mesh {
    #[inline]
    #[must_use]
    pub fn num_materials_referenced(&self) -> u32 {
        self.batches
            .iter()
            .map(|b| b.material_slot + 1)
            .max()
            .unwrap_or(0)
    }

    /// True once index data is resident and the mesh may be drawn.
    #[inline]
    #[must_use]
    pub fn ready_to_draw(&self) -> bool {
        self.upload.indices_done
    }
}

/// Parameters for registering a mesh with the store.
pub struct MeshDesc {
    pub vert_data: Vec<u8>,
    pub index_data: Vec<u8>,
    pub index_type: IndexType,
    pub vertex_spec: VertexSpec,
    pub batches: Vec<Batch>,
    pub aabb_os: Aabb,
    pub flags: MeshFlags,
    pub dequantise: Dequantise,
    pub animation_data: Option<Arc<AnimationData>>,
}

// ============================================================================
// MeshStore
// ============================================================================

/// Owner of all registered meshes.
pub struct MeshStore {
    meshes: SlotMap<MeshHandle, Mesh>,
    next_buffer_key: u16,
}

impl Default for MeshStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            meshes: SlotMap::with_key(),
            next_buffer_key: 1,
        }
    }

    /// Registers mesh data, validating the batch list and dequantisation
    /// transform. Zero-batch meshes are legal (they draw nothing).
    pub fn insert(&mut self, desc: MeshDesc) -> Result<MeshHandle> {
        if desc.dequantise.scale.cmpeq(Vec3::ZERO).any() {
            return Err(VistaError::InvalidMesh(
                "quantisation scale component is zero".to_owned(),
            ));
        }
        let index_size = u64::from(desc.index_type.size_b());
        for (i, batch) in desc.batches.iter().enumerate() {
            let end = u64::from(batch.prim_start_offset_b)
                + u64::from(batch.num_indices) * index_size;
            if end > desc.index_data.len() as u64 {
                return Err(VistaError::InvalidMesh(format!(
                    "batch {i} index range exceeds index data ({end} > {})",
                    desc.index_data.len()
                )));
            }
        }

        let buffer_key = self.next_buffer_key;
        self.next_buffer_key = self.next_buffer_key.wrapping_add(1).max(1);

        // Pad to 4-byte multiples so incremental uploads always write
        // aligned chunks. Validation above ran against the real lengths.
        let mut vert_data = desc.vert_data;
        let mut index_data = desc.index_data;
        vert_data.resize(vert_data.len().next_multiple_of(4), 0);
        index_data.resize(index_data.len().next_multiple_of(4), 0);

        Ok(self.meshes.insert(Mesh {
            vert_data,
            index_data,
            index_type: desc.index_type,
            vertex_spec: desc.vertex_spec,
            batches: desc.batches,
            aabb_os: desc.aabb_os,
            flags: desc.flags,
            dequantise: desc.dequantise,
            animation_data: desc.animation_data,
            buffer_key,
            gpu: None,
            upload: MeshUploadProgress::default(),
        }))
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(handle)
    }

    #[must_use]
    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MeshHandle, &mut Mesh)> {
        self.meshes.iter_mut()
    }
}
