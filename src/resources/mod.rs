//! CPU-side resource definitions: meshes, materials and the texture
//! residency cache.

pub mod material;
pub mod mesh;
pub mod texture;

pub use material::{Material, MaterialFlags, ResolvedPrograms};
pub use mesh::{
    Batch, Dequantise, IndexType, Mesh, MeshDesc, MeshFlags, MeshHandle, MeshStore,
    MeshUploadProgress, VertexAttribute, VertexSpec,
};
pub use texture::{TextureBudgets, TextureCache, TextureEntry};
