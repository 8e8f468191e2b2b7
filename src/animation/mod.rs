//! Skeletal animation.
//!
//! - [`rig`]: joint trees in topological order plus skinning data
//! - [`clip`]: keyframe clips with shared time accessors
//! - [`evaluator`]: the per-frame joint-matrix evaluator and its parallel
//!   driver
//!
//! The renderer gates evaluation per frame: only animated objects inside the
//! shadow/animation culling volume and above a projected-size threshold are
//! evaluated, except that an object whose joint matrices have never been
//! computed is always processed once.

pub mod clip;
pub mod evaluator;
pub mod rig;

pub use clip::{AnimationClip, Channel, ChannelData, ChannelTarget, KeyFrameLoc, TimeAccessor};
pub use evaluator::{AnimationState, EvalScratch, NodeProcedural, evaluate_object, smoothstep};
pub use rig::{AnimationData, AnimationRig, RigNode};
