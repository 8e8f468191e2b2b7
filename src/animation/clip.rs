//! Animation clips and keyframe lookup.
//!
//! A clip stores its channel values against shared *time accessors* — one
//! sorted array of sample times may serve many channels. Per frame, each
//! accessor used by an active clip is resolved once to a
//! [`KeyFrameLoc`] `(i0, i1, frac)` triple; channels then sample by index
//! without re-searching.

use glam::{Quat, Vec3};

// ============================================================================
// Time accessors
// ============================================================================

/// Resolved keyframe position: the two sample indices and the interpolation
/// fraction between them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyFrameLoc {
    pub i0: usize,
    pub i1: usize,
    pub frac: f32,
}

/// A sorted array of keyframe times shared by one or more channels.
#[derive(Debug, Clone)]
pub struct TimeAccessor {
    times: Vec<f32>,
    /// Set when the samples are equally spaced and span the full clip
    /// length, enabling the arithmetic fast path.
    equally_spaced: bool,
    spacing: f32,
}

impl TimeAccessor {
    #[must_use]
    pub fn new(times: Vec<f32>, clip_length: f32) -> Self {
        let equally_spaced = Self::detect_equal_spacing(&times, clip_length);
        let spacing = if times.len() > 1 {
            (times[times.len() - 1] - times[0]) / (times.len() - 1) as f32
        } else {
            0.0
        };
        Self {
            times,
            equally_spaced,
            spacing,
        }
    }

    fn detect_equal_spacing(times: &[f32], clip_length: f32) -> bool {
        if times.len() < 2 {
            return false;
        }
        let n = times.len();
        let spacing = (times[n - 1] - times[0]) / (n - 1) as f32;
        if spacing <= 0.0 {
            return false;
        }
        // Must cover the whole clip for the arithmetic index to be valid.
        if times[0].abs() > 1e-4 || (times[n - 1] - clip_length).abs() > 1e-4 {
            return false;
        }
        for (i, &t) in times.iter().enumerate() {
            if (t - spacing * i as f32).abs() > spacing * 1e-3 {
                return false;
            }
        }
        true
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_equally_spaced(&self) -> bool {
        self.equally_spaced
    }

    /// Resolves `time` to a [`KeyFrameLoc`].
    ///
    /// Times below the first sample pin to it with `frac = 0`; times above
    /// the last sample pin to the last.
    #[must_use]
    pub fn locate(&self, time: f32) -> KeyFrameLoc {
        let n = self.times.len();
        if n == 0 {
            return KeyFrameLoc::default();
        }
        if n == 1 || time <= self.times[0] {
            return KeyFrameLoc {
                i0: 0,
                i1: 0,
                frac: 0.0,
            };
        }
        if time >= self.times[n - 1] {
            return KeyFrameLoc {
                i0: n - 1,
                i1: n - 1,
                frac: 0.0,
            };
        }

        let i0 = if self.equally_spaced {
            // Arithmetic index; the bounds checks above keep it in range.
            ((time / self.spacing) as usize).min(n - 2)
        } else {
            // First index with t > time, minus one.
            self.times.partition_point(|&t| t <= time) - 1
        };
        let i1 = i0 + 1;
        let dt = self.times[i1] - self.times[i0];
        let frac = if dt > 1e-8 {
            ((time - self.times[i0]) / dt).clamp(0.0, 1.0)
        } else {
            0.0
        };
        KeyFrameLoc { i0, i1, frac }
    }
}

// ============================================================================
// Channels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTarget {
    Translation,
    Rotation,
    Scale,
}

#[derive(Debug, Clone)]
pub enum ChannelData {
    Vector(Vec<Vec3>),
    Rotation(Vec<Quat>),
}

/// One animated property of one rig node.
#[derive(Debug, Clone)]
pub struct Channel {
    pub node: usize,
    pub target: ChannelTarget,
    /// Index into the clip's accessor list.
    pub accessor: usize,
    pub data: ChannelData,
}

impl Channel {
    #[must_use]
    pub fn sample_vector(&self, loc: KeyFrameLoc) -> Option<Vec3> {
        let ChannelData::Vector(values) = &self.data else {
            return None;
        };
        let v0 = *values.get(loc.i0)?;
        let v1 = *values.get(loc.i1)?;
        Some(v0.lerp(v1, loc.frac))
    }

    /// Normalised linear interpolation between the two rotation keys.
    #[must_use]
    pub fn sample_rotation(&self, loc: KeyFrameLoc) -> Option<Quat> {
        let ChannelData::Rotation(values) = &self.data else {
            return None;
        };
        let q0 = *values.get(loc.i0)?;
        let mut q1 = *values.get(loc.i1)?;
        // Take the short arc.
        if q0.dot(q1) < 0.0 {
            q1 = -q1;
        }
        Some((q0 * (1.0 - loc.frac) + q1 * loc.frac).normalize())
    }
}

/// Per-node channel indices, precomputed so the evaluator's node walk does
/// no searching.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeChannels {
    pub translation: Option<usize>,
    pub rotation: Option<usize>,
    pub scale: Option<usize>,
}

// ============================================================================
// AnimationClip
// ============================================================================

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub length: f32,
    pub accessors: Vec<TimeAccessor>,
    pub channels: Vec<Channel>,
    /// `node_channels[node]` gives the channel indices targeting that node.
    pub node_channels: Vec<NodeChannels>,
}

impl AnimationClip {
    /// Builds a clip and its per-node channel index for a rig with
    /// `num_nodes` nodes.
    #[must_use]
    pub fn new(
        name: String,
        length: f32,
        accessors: Vec<TimeAccessor>,
        channels: Vec<Channel>,
        num_nodes: usize,
    ) -> Self {
        let mut node_channels = vec![NodeChannels::default(); num_nodes];
        for (i, ch) in channels.iter().enumerate() {
            if ch.node >= num_nodes {
                continue;
            }
            let slot = &mut node_channels[ch.node];
            match ch.target {
                ChannelTarget::Translation => slot.translation = Some(i),
                ChannelTarget::Rotation => slot.rotation = Some(i),
                ChannelTarget::Scale => slot.scale = Some(i),
            }
        }
        Self {
            name,
            length,
            accessors,
            channels,
            node_channels,
        }
    }
}
