//! Engine facade.
//!
//! [`Engine`] couples the renderer with a set of scenes, exactly one of
//! which is *current*. It is windowing-agnostic: the host passes any type
//! implementing the raw window handle traits to [`Engine::init`].
//!
//! # Lifecycle
//!
//! 1. Create with [`Engine::new`] (no GPU resources yet)
//! 2. Initialise GPU with [`Engine::init`] — a failure leaves the engine in
//!    a non-initialised state where every operation is a no-op
//! 3. Mutate scenes through the engine (`add_object`, `add_light`, ...)
//! 4. Call [`Engine::draw`] once per frame

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::{SlotMap, new_key_type};

use crate::errors::Result;
use crate::renderer::Renderer;
use crate::renderer::settings::RendererSettings;
use crate::scene::Scene;
use crate::scene::light::{Light, LightKey};
use crate::scene::object::{Object, ObjectKey};

new_key_type! {
    pub struct SceneKey;
}

pub struct Engine {
    pub renderer: Renderer,
    scenes: SlotMap<SceneKey, Scene>,
    current_scene: SceneKey,
    time: f32,
    frame_count: u64,
}

impl Engine {
    /// Creates the engine with one (current) empty scene.
    #[must_use]
    pub fn new(settings: RendererSettings) -> Self {
        let reverse_z = settings.reverse_z;
        let mut scenes = SlotMap::with_key();
        let current_scene = scenes.insert(Scene::new(reverse_z));
        Self {
            renderer: Renderer::new(settings),
            scenes,
            current_scene,
            time: 0.0,
            frame_count: 0,
        }
    }

    /// Initialises the GPU context. On failure the engine records the error
    /// and stays non-initialised; all subsequent operations no-op.
    pub async fn init<W>(&mut self, window: W, width: u32, height: u32) -> Result<()>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        match self.renderer.init(window, width, height).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Engine initialisation failed: {e}");
                Err(e)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
    }

    // ------------------------------------------------------------------------
    // Scenes
    // ------------------------------------------------------------------------

    /// Creates another scene; it does not become current.
    pub fn create_scene(&mut self) -> SceneKey {
        let reverse_z = self.renderer.settings.reverse_z;
        self.scenes.insert(Scene::new(reverse_z))
    }

    /// Makes `key` the current scene if it exists.
    pub fn set_current_scene(&mut self, key: SceneKey) {
        if self.scenes.contains_key(key) {
            self.current_scene = key;
        }
    }

    #[must_use]
    pub fn current_scene(&self) -> &Scene {
        &self.scenes[self.current_scene]
    }

    pub fn current_scene_mut(&mut self) -> &mut Scene {
        &mut self.scenes[self.current_scene]
    }

    #[must_use]
    pub fn scene(&self, key: SceneKey) -> Option<&Scene> {
        self.scenes.get(key)
    }

    pub fn scene_mut(&mut self, key: SceneKey) -> Option<&mut Scene> {
        self.scenes.get_mut(key)
    }

    // ------------------------------------------------------------------------
    // Object and light management on the current scene
    // ------------------------------------------------------------------------

    pub fn add_object(&mut self, object: Object) -> Result<ObjectKey> {
        let scene = self
            .scenes
            .get_mut(self.current_scene)
            .expect("current scene always exists");
        self.renderer.add_object(scene, object)
    }

    pub fn remove_object(&mut self, key: ObjectKey) -> Option<Object> {
        let scene = self
            .scenes
            .get_mut(self.current_scene)
            .expect("current scene always exists");
        self.renderer.remove_object(scene, key)
    }

    pub fn add_light(&mut self, light: Light) -> Option<LightKey> {
        let scene = self
            .scenes
            .get_mut(self.current_scene)
            .expect("current scene always exists");
        self.renderer.add_light(scene, light)
    }

    pub fn remove_light(&mut self, key: LightKey) {
        let scene = self
            .scenes
            .get_mut(self.current_scene)
            .expect("current scene always exists");
        self.renderer.remove_light(scene, key);
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Advances time and renders the current scene to the surface.
    pub fn draw(&mut self, dt: f32) {
        self.time += dt;
        self.frame_count += 1;
        let scene = self
            .scenes
            .get_mut(self.current_scene)
            .expect("current scene always exists");
        self.renderer.draw(scene, self.time);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RendererSettings::default())
    }
}
