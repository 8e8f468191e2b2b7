//! Scoped worker pool.
//!
//! Work is distributed by a single atomic next-index counter: each worker
//! repeatedly claims the next index until the range is exhausted. The pool
//! joins before returning, which is the ordering guarantee the renderer
//! relies on (no GPU upload happens while workers still write results).

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct TaskPool {
    num_threads: usize,
}

impl TaskPool {
    /// A pool sized to the machine, capped to keep worker startup cheap.
    #[must_use]
    pub fn new() -> Self {
        let num_threads = std::thread::available_parallelism()
            .map_or(2, std::num::NonZero::get)
            .min(8);
        Self { num_threads }
    }

    #[must_use]
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Runs `f(scratch, i)` for every `i in 0..n` across the pool, joining
    /// all workers before returning. Each worker owns one scratch value
    /// created by `make_scratch`.
    pub fn for_each_index<S, G, F>(&self, n: usize, make_scratch: G, f: F)
    where
        G: Fn() -> S + Sync,
        F: Fn(&mut S, usize) + Sync,
    {
        if n == 0 {
            return;
        }
        // Small batches are not worth the spawn cost.
        if n == 1 || self.num_threads == 1 {
            let mut scratch = make_scratch();
            for i in 0..n {
                f(&mut scratch, i);
            }
            return;
        }

        let next_index = AtomicUsize::new(0);
        let workers = self.num_threads.min(n);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    let mut scratch = make_scratch();
                    loop {
                        let i = next_index.fetch_add(1, Ordering::Relaxed);
                        if i >= n {
                            break;
                        }
                        f(&mut scratch, i);
                    }
                });
            }
        });
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}
