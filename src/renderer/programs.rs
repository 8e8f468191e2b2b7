//! Shader program variant cache.
//!
//! A *program* is one compiled shader variant, identified by a
//! [`ProgramKey`] — the program family name plus a feature flag mask. Each
//! program is assigned a dense [`ProgramIndex`] in creation order; that index
//! is the most significant field of every draw sort key, so programs created
//! early sort together and bind switches stay rare.
//!
//! # Build states
//!
//! A program is in exactly one of `{Building, Built, Failed}`. Compilation is
//! handed to the driver behind a wgpu validation error scope whose future is
//! *polled* once per frame, never blocked on. While `Building`, the program's
//! built bit is clear and no batch referencing it draws. On `Failed` the
//! program surfaces as the family fallback (basic phong / basic depth); the
//! failure is logged, not raised to the frame loop.
//!
//! # Fixed binding model
//!
//! Shader resources are grouped into three bind groups with fixed slots:
//!
//! | Group | Contents |
//! |---|---|
//! | 0 | `SharedVertUniforms` (b0), `MaterialCommonUniforms` (b1), per-object table (b2), material table (b3), joint matrices (b4), light table (b5), ob-and-mat indices (b6), instance transforms (b7) |
//! | 1 | material textures: diffuse (b0), metallic-roughness (b1), emission (b2), normal map (b3), transmission (b4), lightmap (b5), sampler (b6) |
//! | 2 | pass-owned resources: shadow maps, env maps, SSAO results, main colour/normal/depth copies |
//!
//! Block sizes are validated against the CPU-side structs at init
//! ([`crate::renderer::buffers::validate_block_sizes`]); a mismatch is a
//! fatal configuration error.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::renderer::shaders;

/// Dense program identifier; creation order defines sort order.
pub type ProgramIndex = u32;

// ============================================================================
// Keys
// ============================================================================

/// Program family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramName {
    Phong,
    Transparent,
    Water,
    ParticipatingMedia,
    Imposter,
    Depth,
    Env,
    Overlay,
    Outline,
    Aurora,
    ComputeSsao,
    BlurSsao,
    FinalImaging,
    OitComposite,
    DofBlur,
    Downsize,
    GaussianBlur,
    EdgeExtract,
    Clear,
    DrawAuroraTex,
}

impl ProgramName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phong => "phong",
            Self::Transparent => "transparent",
            Self::Water => "water",
            Self::ParticipatingMedia => "participating_media",
            Self::Imposter => "imposter",
            Self::Depth => "depth",
            Self::Env => "env",
            Self::Overlay => "overlay",
            Self::Outline => "outline",
            Self::Aurora => "aurora",
            Self::ComputeSsao => "compute_ssao",
            Self::BlurSsao => "blur_ssao",
            Self::FinalImaging => "final_imaging",
            Self::OitComposite => "oit_composite",
            Self::DofBlur => "dof_blur",
            Self::Downsize => "downsize",
            Self::GaussianBlur => "gaussian_blur",
            Self::EdgeExtract => "edge_extract",
            Self::Clear => "clear",
            Self::DrawAuroraTex => "draw_aurora_tex",
        }
    }
}

bitflags! {
    /// Feature flags specialising a program variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProgramFlags: u32 {
        const ALPHA_TEST            = 1 << 0;
        const VERT_COLOURS          = 1 << 1;
        const INSTANCE_MATRICES     = 1 << 2;
        const LIGHTMAPPING          = 1 << 3;
        const GEN_PLANAR_UVS        = 1 << 4;
        const PLANAR_UV_GRID        = 1 << 5;
        const SKINNING              = 1 << 6;
        const IMPOSTER              = 1 << 7;
        const IMPOSTERABLE          = 1 << 8;
        const USE_WIND_VERT_SHADER  = 1 << 9;
        const FANCY_DOUBLE_SIDED    = 1 << 10;
        const MATERIALISE_EFFECT    = 1 << 11;
        const TERRAIN               = 1 << 12;
        const DECAL                 = 1 << 13;
        const PARTICIPATING_MEDIA   = 1 << 14;
        const VERT_TANGENTS         = 1 << 15;
        const SDF_TEXT              = 1 << 16;
        const COMBINED              = 1 << 17;
        const POSITION_W_IS_OCT16_NORMAL = 1 << 18;
    }
}

impl ProgramFlags {
    /// Flags that change the output of a depth-only draw. Everything else is
    /// stripped by [`ProgramKey::normalised_for_depth`] to maximise program
    /// reuse across materials.
    #[must_use]
    pub fn depth_relevant() -> Self {
        Self::ALPHA_TEST
            | Self::SKINNING
            | Self::INSTANCE_MATRICES
            | Self::USE_WIND_VERT_SHADER
            | Self::GEN_PLANAR_UVS
            | Self::PLANAR_UV_GRID
            | Self::POSITION_W_IS_OCT16_NORMAL
            | Self::MATERIALISE_EFFECT
    }
}

/// Cache key: family plus feature mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub name: ProgramName,
    pub flags: ProgramFlags,
}

impl ProgramKey {
    #[must_use]
    pub fn new(name: ProgramName, flags: ProgramFlags) -> Self {
        Self { name, flags }
    }

    /// The depth-pass key for a material with this key: the `Depth` family
    /// with depth-irrelevant feature bits cleared (lightmapping, vertex
    /// colours and the like have no effect on a depth-only draw).
    #[must_use]
    pub fn normalised_for_depth(self) -> Self {
        Self {
            name: ProgramName::Depth,
            flags: self.flags & ProgramFlags::depth_relevant(),
        }
    }
}

// ============================================================================
// Registry (pure state machine)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Building,
    Built,
    Failed,
}

/// One program entry.
pub struct Program {
    pub key: ProgramKey,
    pub index: ProgramIndex,
    pub state: BuildState,
    pub module: Option<wgpu::ShaderModule>,
    /// Concrete pipelines specialised by render-state key, created lazily by
    /// the passes.
    pipelines: FxHashMap<u64, wgpu::RenderPipeline>,
}

/// Dense key→index mapping plus build-state bookkeeping, independent of any
/// GPU device so the state transitions stay testable.
#[derive(Default)]
pub struct ProgramRegistry {
    programs: Vec<Program>,
    by_key: FxHashMap<ProgramKey, ProgramIndex>,
}

impl ProgramRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dense index for `key`, creating a `Building` entry if it
    /// is new. The second tuple element is true when the entry was created.
    pub fn intern(&mut self, key: ProgramKey) -> (ProgramIndex, bool) {
        if let Some(&idx) = self.by_key.get(&key) {
            return (idx, false);
        }
        let idx = self.programs.len() as ProgramIndex;
        self.programs.push(Program {
            key,
            index: idx,
            state: BuildState::Building,
            module: None,
            pipelines: FxHashMap::default(),
        });
        self.by_key.insert(key, idx);
        (idx, true)
    }

    #[must_use]
    pub fn lookup(&self, key: ProgramKey) -> Option<ProgramIndex> {
        self.by_key.get(&key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    #[must_use]
    pub fn get(&self, idx: ProgramIndex) -> Option<&Program> {
        self.programs.get(idx as usize)
    }

    pub fn get_mut(&mut self, idx: ProgramIndex) -> Option<&mut Program> {
        self.programs.get_mut(idx as usize)
    }

    #[must_use]
    pub fn state(&self, idx: ProgramIndex) -> BuildState {
        self.programs[idx as usize].state
    }

    #[must_use]
    pub fn is_built(&self, idx: ProgramIndex) -> bool {
        self.programs
            .get(idx as usize)
            .is_some_and(|p| p.state == BuildState::Built)
    }

    pub fn mark_built(&mut self, idx: ProgramIndex) {
        self.programs[idx as usize].state = BuildState::Built;
    }

    pub fn mark_failed(&mut self, idx: ProgramIndex) {
        let p = &mut self.programs[idx as usize];
        p.state = BuildState::Failed;
        p.module = None;
        p.pipelines.clear();
    }
}

// ============================================================================
// ProgramCache
// ============================================================================

struct PendingBuild {
    index: ProgramIndex,
    future: Pin<Box<dyn Future<Output = Option<wgpu::Error>> + Send>>,
}

/// Program cache: registry plus driver-side compilation.
pub struct ProgramCache {
    pub registry: ProgramRegistry,
    pending: Vec<PendingBuild>,
    fallback_phong: Option<ProgramIndex>,
    fallback_depth: Option<ProgramIndex>,
    /// Hot-reload hook: when set by the host, every program is invalidated
    /// and recompiled at the next frame boundary.
    pub programs_changed: bool,
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ProgramRegistry::new(),
            pending: Vec::new(),
            fallback_phong: None,
            fallback_depth: None,
            programs_changed: false,
        }
    }

    /// Creates the two family fallbacks up front so a compile failure always
    /// has somewhere to land.
    pub fn create_fallbacks(&mut self, device: &wgpu::Device) {
        let phong = self.get_program(device, ProgramKey::new(ProgramName::Phong, ProgramFlags::empty()));
        let depth = self.get_program(device, ProgramKey::new(ProgramName::Depth, ProgramFlags::empty()));
        self.fallback_phong = Some(phong);
        self.fallback_depth = Some(depth);
    }

    /// Returns the program for `key`, starting an asynchronous build when the
    /// variant has not been seen before. Until the build completes the
    /// program's built bit stays clear and it must not be bound.
    pub fn get_program(&mut self, device: &wgpu::Device, key: ProgramKey) -> ProgramIndex {
        let (idx, created) = self.registry.intern(key);
        if created {
            self.start_build(device, idx);
        }
        idx
    }

    /// Depth-draw program for a material key: irrelevant bits are normalised
    /// away first so many materials share one depth variant.
    pub fn get_depth_draw_program(&mut self, device: &wgpu::Device, key: ProgramKey) -> ProgramIndex {
        self.get_program(device, key.normalised_for_depth())
    }

    fn start_build(&mut self, device: &wgpu::Device, idx: ProgramIndex) {
        let key = self.registry.get(idx).map(|p| p.key);
        let Some(key) = key else { return };

        let header = shaders::variant_header(key.flags);
        let source = shaders::family_source(key.name, &header);

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(key.name.as_str()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let future = Box::pin(error_scope.pop());

        if let Some(p) = self.registry.get_mut(idx) {
            p.module = Some(module);
            p.state = BuildState::Building;
        }
        self.pending.push(PendingBuild { index: idx, future });
    }

    /// Polls driver-side builds without blocking.
    ///
    /// Returns the indices of programs that transitioned out of `Building`
    /// this call; the frame loop rebuilds the draw records of every batch
    /// whose material references one of them, which is the moment their
    /// built bit becomes visible to the draw loop.
    pub fn poll_builds(&mut self) -> SmallVec<[ProgramIndex; 4]> {
        let mut completed = SmallVec::new();
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);

        let mut i = 0;
        while i < self.pending.len() {
            match self.pending[i].future.as_mut().poll(&mut cx) {
                Poll::Ready(error) => {
                    let build = self.pending.swap_remove(i);
                    match error {
                        None => {
                            self.registry.mark_built(build.index);
                        }
                        Some(e) => {
                            let key = self.registry.get(build.index).map(|p| p.key);
                            log::error!(
                                "Shader program build failed for {:?}: {e}; substituting fallback",
                                key
                            );
                            self.registry.mark_failed(build.index);
                        }
                    }
                    completed.push(build.index);
                }
                Poll::Pending => i += 1,
            }
        }
        completed
    }

    #[must_use]
    pub fn num_building(&self) -> usize {
        self.pending.len()
    }

    /// Restarts every program's build. Driven by the `programs_changed`
    /// hot-reload hook: each program drops back to `Building` (its built
    /// bit clears on the next record rebuild) and resurfaces as its builds
    /// complete over the following frames.
    pub fn rebuild_all(&mut self, device: &wgpu::Device) {
        self.pending.clear();
        for idx in 0..self.registry.len() as ProgramIndex {
            self.start_build(device, idx);
        }
        self.programs_changed = false;
    }

    /// Blocks until every in-flight build has resolved. Only used at
    /// shutdown-like moments; the frame loop never calls this.
    pub fn wait_for_all_building_programs(&mut self, device: &wgpu::Device) {
        while !self.pending.is_empty() {
            let _ = device.poll(wgpu::PollType::wait_indefinitely());
            self.poll_builds();
        }
    }

    /// The program actually bound for `idx`: itself when built or building,
    /// the family fallback when the build failed.
    #[must_use]
    pub fn effective_program(&self, idx: ProgramIndex) -> ProgramIndex {
        let Some(p) = self.registry.get(idx) else {
            return idx;
        };
        if p.state != BuildState::Failed {
            return idx;
        }
        let fallback = if p.key.name == ProgramName::Depth {
            self.fallback_depth
        } else {
            self.fallback_phong
        };
        fallback.unwrap_or(idx)
    }

    /// Whether draw records referencing `idx` may carry the built bit.
    #[must_use]
    pub fn effective_is_built(&self, idx: ProgramIndex) -> bool {
        self.registry.is_built(self.effective_program(idx))
    }

    // ------------------------------------------------------------------------
    // Pipeline specialisation
    // ------------------------------------------------------------------------

    /// Fetches or creates the concrete pipeline for a built program under a
    /// specific render-state hash. `build` is invoked with the program's
    /// shader module on a cache miss.
    ///
    /// Returns `None` while the program is building or when the failed
    /// fallback is itself unavailable.
    pub fn get_or_create_pipeline<F>(
        &mut self,
        idx: ProgramIndex,
        state_hash: u64,
        build: F,
    ) -> Option<&wgpu::RenderPipeline>
    where
        F: FnOnce(&wgpu::ShaderModule) -> wgpu::RenderPipeline,
    {
        let effective = self.effective_program(idx);
        let p = self.registry.get_mut(effective)?;
        if p.state != BuildState::Built {
            return None;
        }
        if !p.pipelines.contains_key(&state_hash) {
            let module = p.module.as_ref()?;
            let pipeline = build(module);
            p.pipelines.insert(state_hash, pipeline);
        }
        p.pipelines.get(&state_hash)
    }
}

/// FxHash of any `Hash` key; used for pipeline render-state keys.
#[must_use]
pub fn fx_hash_key<K: std::hash::Hash>(key: &K) -> u64 {
    use std::hash::{BuildHasher, Hasher};
    let mut hasher = rustc_hash::FxBuildHasher.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}
