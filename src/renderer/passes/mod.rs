//! Render pass subroutines.
//!
//! The frame orchestrator ([`crate::renderer::frame`]) sequences these;
//! each pass prepares its GPU work during the frame's prepare phase and
//! encodes during the execute phase.

pub mod common;
pub mod fullscreen;
pub mod outline;
pub mod overlay;
pub mod post;
pub mod prepass;
pub mod scene_passes;
pub mod shadow;

pub use common::{BlendKind, MaterialTextures, PreparedSceneDraw, ScenePipeState};
pub use fullscreen::{FullscreenDraw, FullscreenHelper, FullscreenInput, InputKind};
pub use outline::OutlinePass;
pub use overlay::OverlayPass;
pub use post::PostChain;
pub use prepass::SsaoPass;
pub use scene_passes::{ScenePasses, WaterPassResources};
pub use shadow::{
    NUM_STATIC_CASCADES, STATIC_UPDATE_PERIOD, ShadowRenderer, build_sun_ortho,
    cascade_bias_matrix, dynamic_cascade_slice, quantise_centre, static_update_phase,
};
