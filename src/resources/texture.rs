//! Texture residency cache.
//!
//! Textures are keyed by an opaque string path. Each entry tracks its CPU
//! and GPU byte cost and a used/unused bit. When the last external reference
//! to a texture is dropped the entry is marked non-resident and moved onto
//! an LRU list of unused entries; a trim step, run after every insertion and
//! once per frame, evicts least-recently-unused entries while either byte
//! budget is exceeded.
//!
//! `texture_became_unused` may be called from worker threads (asset decode
//! completions); off the render thread it only queues the key under a mutex,
//! and the render thread drains the queue at the start of `draw()`.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// GPU side of a cached texture.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// One cache entry.
pub struct TextureEntry {
    pub cpu_bytes: u64,
    pub gpu_bytes: u64,
    /// Clear once the external ref count has dropped to the cache's own
    /// reference.
    pub used: bool,
    /// Resident GPU object; dropped on eviction or while non-resident.
    pub gpu: Option<GpuTexture>,
    /// Monotonic stamp of when the entry became unused; smallest = evict
    /// first.
    unused_stamp: u64,
}

/// Byte budgets for the cache.
#[derive(Debug, Clone, Copy)]
pub struct TextureBudgets {
    pub max_cpu_bytes: u64,
    pub max_gpu_bytes: u64,
}

impl Default for TextureBudgets {
    fn default() -> Self {
        Self {
            max_cpu_bytes: 1024 * 1024 * 1024,
            max_gpu_bytes: 1024 * 1024 * 1024,
        }
    }
}

pub struct TextureCache {
    entries: FxHashMap<String, TextureEntry>,
    budgets: TextureBudgets,
    cpu_bytes_used: u64,
    gpu_bytes_used: u64,
    next_unused_stamp: u64,
    /// Keys reported unused from other threads, drained on the render
    /// thread.
    became_unused_queue: Mutex<Vec<String>>,
}

impl TextureCache {
    #[must_use]
    pub fn new(budgets: TextureBudgets) -> Self {
        Self {
            entries: FxHashMap::default(),
            budgets,
            cpu_bytes_used: 0,
            gpu_bytes_used: 0,
            next_unused_stamp: 1,
            became_unused_queue: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn cpu_bytes_used(&self) -> u64 {
        self.cpu_bytes_used
    }

    #[inline]
    #[must_use]
    pub fn gpu_bytes_used(&self) -> u64 {
        self.gpu_bytes_used
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TextureEntry> {
        self.entries.get(key)
    }

    /// Inserts an entry (used, resident) and trims against the budgets.
    ///
    /// Returns the number of entries evicted by the post-insert trim.
    pub fn insert(
        &mut self,
        key: String,
        cpu_bytes: u64,
        gpu_bytes: u64,
        gpu: Option<GpuTexture>,
    ) -> u32 {
        if let Some(old) = self.entries.insert(
            key,
            TextureEntry {
                cpu_bytes,
                gpu_bytes,
                used: true,
                gpu,
                unused_stamp: 0,
            },
        ) {
            self.cpu_bytes_used -= old.cpu_bytes;
            self.gpu_bytes_used -= old.gpu_bytes;
        }
        self.cpu_bytes_used += cpu_bytes;
        self.gpu_bytes_used += gpu_bytes;
        self.trim_texture_usage()
    }

    /// Removes an entry outright (object removal path, not eviction).
    pub fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.cpu_bytes_used -= entry.cpu_bytes;
            self.gpu_bytes_used -= entry.gpu_bytes;
        }
    }

    /// Marks `key` as used again (an object started referencing it).
    pub fn texture_became_used(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.used = true;
            entry.unused_stamp = 0;
        }
    }

    /// Render-thread path: marks `key` non-resident-eligible and appends it
    /// to the LRU order.
    pub fn texture_became_unused(&mut self, key: &str) {
        let stamp = self.next_unused_stamp;
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.used {
                entry.used = false;
                entry.unused_stamp = stamp;
                self.next_unused_stamp += 1;
            }
        }
    }

    /// Worker-thread path: only queues the key; the render thread applies it
    /// in [`process_unused_queue`](Self::process_unused_queue).
    pub fn texture_became_unused_deferred(&self, key: &str) {
        self.became_unused_queue.lock().push(key.to_owned());
    }

    /// Drains the deferred queue; called at the start of every frame.
    pub fn process_unused_queue(&mut self) {
        let keys = std::mem::take(&mut *self.became_unused_queue.lock());
        for key in keys {
            self.texture_became_unused(&key);
        }
    }

    /// Evicts least-recently-unused entries while either budget is exceeded
    /// and unused entries remain. Eviction fully releases the GPU object.
    /// Returns the number of evictions.
    pub fn trim_texture_usage(&mut self) -> u32 {
        let mut evicted = 0;
        while self.cpu_bytes_used > self.budgets.max_cpu_bytes
            || self.gpu_bytes_used > self.budgets.max_gpu_bytes
        {
            // Oldest unused entry.
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| !e.used)
                .min_by_key(|(_, e)| e.unused_stamp)
                .map(|(k, _)| k.clone());
            let Some(key) = victim else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.cpu_bytes_used -= entry.cpu_bytes;
                self.gpu_bytes_used -= entry.gpu_bytes;
                drop(entry.gpu);
                log::debug!("Evicted texture '{key}' from residency cache");
                evicted += 1;
            }
        }
        evicted
    }

    #[must_use]
    pub fn num_unused(&self) -> usize {
        self.entries.values().filter(|e| !e.used).count()
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(TextureBudgets::default())
    }
}
