//! Scene model: objects, lights, cameras and culling volumes.

pub mod bounds;
pub mod camera;
pub mod light;
pub mod object;
pub mod overlay;
#[allow(clippy::module_inception)]
pub mod scene;

pub use bounds::Aabb;
pub use camera::{Camera, CullVolume, Frustum, ProjectionMode, SensorParams};
pub use light::{Light, LightGrid, LightKey, MAX_NUM_LIGHT_INDICES};
pub use object::{Object, ObjectFlags, ObjectKey};
pub use overlay::{OverlayKey, OverlayObject};
pub use scene::{Scene, SceneParams};
