#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod engine;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use animation::{AnimationClip, AnimationData, AnimationRig, AnimationState, TimeAccessor};
pub use engine::Engine;
pub use errors::VistaError;
pub use renderer::Renderer;
pub use renderer::draw::FrameStats;
pub use renderer::programs::{ProgramFlags, ProgramKey, ProgramName};
pub use renderer::settings::{RendererSettings, RuntimeFeatures};
pub use resources::{
    Batch, Dequantise, IndexType, Material, MaterialFlags, MeshDesc, MeshFlags, MeshHandle,
    TextureCache, VertexSpec,
};
pub use scene::{
    Aabb, Camera, Frustum, Light, LightGrid, Object, ObjectFlags, ObjectKey, ProjectionMode,
    Scene, SensorParams,
};
pub use utils::task_pool::TaskPool;
