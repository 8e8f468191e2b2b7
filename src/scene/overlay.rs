//! 2D overlay objects.
//!
//! Overlays are screen-space quads with a 2D transform, an optional clip
//! rectangle, and a Z used only for painter's-algorithm ordering. They are
//! drawn after the post-process chain with a split RGB/alpha blend so the
//! destination alpha saturates toward 1 (the final framebuffer may be
//! composited over an external surface).

use glam::{Mat3, Vec2, Vec4};
use slotmap::new_key_type;

new_key_type! {
    pub struct OverlayKey;
}

#[derive(Debug, Clone)]
pub struct OverlayObject {
    /// 2D object-to-clip transform (columns: x axis, y axis, translation).
    pub transform: Mat3,
    /// Painter's-algorithm depth; larger draws first.
    pub z: f32,
    /// Scissor rectangle in clip space, `(min, max)`; `None` disables
    /// clipping.
    pub clip_rect: Option<(Vec2, Vec2)>,
    pub colour: Vec4,
    /// Texture cache key for the overlay image, if any.
    pub texture: Option<String>,
    /// SDF text rendering (uses the SDF distance ramp in the shader).
    pub is_sdf_text: bool,
}

impl Default for OverlayObject {
    fn default() -> Self {
        Self {
            transform: Mat3::IDENTITY,
            z: 0.0,
            clip_rect: None,
            colour: Vec4::ONE,
            texture: None,
            is_sdf_text: false,
        }
    }
}
