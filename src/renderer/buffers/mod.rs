//! Resident GPU buffer management: slot allocators, the six engine tables,
//! and the scatter-compute update path.

pub mod allocator;
pub mod tables;

pub use allocator::{BestFitAllocator, FreeIndexAllocator};
pub use tables::{
    DrawCommand, GrowBuffer, LightData, MaterialCommonUniforms, MaterialData, MatrixBlockTable,
    ObJointAndMatIndices, PerObjectVertData, ResidentTable, ScatterUploader, SharedVertUniforms,
    validate_block_sizes,
};
