#![forbid(unsafe_code)]

use crate::config::AggrOptions;
use crate::error::AggrResult;

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::ThreadPool;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::any::Any;
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use std::sync::{Condvar, Mutex, OnceLock, PoisonError};

/// Crate-local Rayon pool for tile dispatch.
///
/// A global pool can fail to initialize under heavy resource pressure and
/// Rayon then panics on first use. A local pool lets callers fall back to
/// running on the calling thread instead.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
static RAYON_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn desired_rayon_threads() -> usize {
    let from_env = ["TESSERA_NUM_THREADS", "RAYON_NUM_THREADS"]
        .iter()
        .find_map(|key| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|&n| n > 0)
        });
    from_env.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn build_rayon_pool() -> Option<ThreadPool> {
    let requested = desired_rayon_threads().max(1);
    let try_build = |n| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("tessera-tile-{i}"))
            .build()
    };

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(_) if requested > 1 => try_build(1).ok(),
        Err(err) => {
            log::warn!("no tile thread pool, aggregating sequentially: {err}");
            None
        }
    }
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
pub(crate) fn rayon_pool() -> Option<&'static ThreadPool> {
    RAYON_POOL.get_or_init(build_rayon_pool).as_ref()
}

/// The pool to spread `tiles` tiles over, or `None` to stay on the calling thread.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
pub(crate) fn pool_for(options: &AggrOptions, tiles: usize) -> Option<&'static ThreadPool> {
    if !options.parallel || tiles < options.min_parallel_tiles.max(2) {
        return None;
    }
    rayon_pool().filter(|pool| pool.current_num_threads() > 1)
}

/// Whether work over `tiles` tiles would leave the calling thread.
pub(crate) fn is_parallel(options: &AggrOptions, tiles: usize) -> bool {
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    {
        pool_for(options, tiles).is_some()
    }
    #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
    {
        let _ = (options, tiles);
        false
    }
}

/// Computes one contribution per tile, possibly on several threads, and
/// applies them to `shared` strictly in increasing tile order.
///
/// The first failing tile (in tile order) determines the error; contributions
/// of later tiles are dropped.
pub(crate) fn run_ordered<S, L, F, A>(
    options: &AggrOptions,
    tiles: usize,
    shared: &mut S,
    local: F,
    apply: A,
) -> AggrResult<()>
where
    S: Send,
    L: Send,
    F: Fn(usize) -> AggrResult<L> + Sync,
    A: Fn(&mut S, L) + Sync,
{
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    if let Some(pool) = pool_for(options, tiles) {
        return run_ordered_on(pool, tiles, shared, &local, &apply);
    }

    let _ = options;
    for t in 0..tiles {
        let contribution = local(t)?;
        apply(shared, contribution);
    }
    Ok(())
}

/// Runs `f` once per tile with that tile's owned work item. Items carry
/// disjoint state, so tiles need no ordering among themselves.
pub(crate) fn try_for_each_tile<I, F>(options: &AggrOptions, items: Vec<I>, f: F) -> AggrResult<()>
where
    I: Send,
    F: Fn(usize, I) -> AggrResult<()> + Sync,
{
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    if let Some(pool) = pool_for(options, items.len()) {
        use rayon::prelude::*;
        return pool.install(|| {
            items
                .into_par_iter()
                .enumerate()
                .try_for_each(|(t, item)| f(t, item))
        });
    }

    let _ = options;
    items
        .into_iter()
        .enumerate()
        .try_for_each(|(t, item)| f(t, item))
}

/// Stable sort, on the pool when the domain spans enough tiles.
pub(crate) fn stable_sort_by<T, F>(options: &AggrOptions, tiles: usize, items: &mut [T], compare: F)
where
    T: Send,
    F: Fn(&T, &T) -> std::cmp::Ordering + Send + Sync,
{
    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    if let Some(pool) = pool_for(options, tiles) {
        use rayon::prelude::*;
        pool.install(|| items.par_sort_by(compare));
        return;
    }

    let _ = (options, tiles);
    items.sort_by(compare);
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
struct Turn<'a, S> {
    next: usize,
    shared: &'a mut S,
    error: Option<crate::AggrError>,
    panic: Option<Box<dyn Any + Send>>,
}

/// Lets tiles finish in any order but commit in tile order.
///
/// A worker holding tile `t` waits until tiles `0..t` have committed. The
/// lowest claimed tile never waits, so progress is guaranteed as long as
/// workers claim tiles in increasing order.
#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
struct OrderedCommit<'a, S> {
    turn: Mutex<Turn<'a, S>>,
    ready: Condvar,
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
impl<'a, S> OrderedCommit<'a, S> {
    fn new(shared: &'a mut S) -> Self {
        Self {
            turn: Mutex::new(Turn {
                next: 0,
                shared,
                error: None,
                panic: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn commit(&self, tile: usize, f: impl FnOnce(&mut Turn<'a, S>)) {
        let mut turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        while turn.next != tile {
            turn = self
                .ready
                .wait(turn)
                .unwrap_or_else(PoisonError::into_inner);
        }
        f(&mut turn);
        turn.next += 1;
        drop(turn);
        self.ready.notify_all();
    }

    fn finish(self) -> AggrResult<()> {
        let turn = self.turn.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(payload) = turn.panic {
            resume_unwind(payload);
        }
        match turn.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn run_ordered_on<S, L, F, A>(
    pool: &ThreadPool,
    tiles: usize,
    shared: &mut S,
    local: &F,
    apply: &A,
) -> AggrResult<()>
where
    S: Send,
    L: Send,
    F: Fn(usize) -> AggrResult<L> + Sync,
    A: Fn(&mut S, L) + Sync,
{
    let next_tile = AtomicUsize::new(0);
    let commit = OrderedCommit::new(shared);
    let workers = pool.current_num_threads().clamp(1, tiles.max(1));

    pool.scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|_| loop {
                let t = next_tile.fetch_add(1, Ordering::Relaxed);
                if t >= tiles {
                    break;
                }
                // Every claimed tile must commit, or later tiles wait forever.
                let contribution = catch_unwind(AssertUnwindSafe(|| local(t)));
                commit.commit(t, |turn| {
                    if turn.error.is_some() || turn.panic.is_some() {
                        return;
                    }
                    match contribution {
                        Ok(Ok(c)) => {
                            let shared = &mut *turn.shared;
                            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| apply(shared, c)))
                            {
                                turn.panic = Some(payload);
                            }
                        }
                        Ok(Err(err)) => turn.error = Some(err),
                        Err(payload) => turn.panic = Some(payload),
                    }
                });
            });
        }
    });

    commit.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AggrError;

    #[test]
    fn contributions_apply_in_tile_order() {
        let options = AggrOptions::default();
        let mut order = Vec::new();
        run_ordered(
            &options,
            64,
            &mut order,
            |t| {
                // Make later tiles tend to finish first.
                std::thread::sleep(std::time::Duration::from_micros((64 - t as u64) * 10));
                Ok(t)
            },
            |order: &mut Vec<usize>, t| order.push(t),
        )
        .unwrap();
        assert_eq!(order, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn first_error_in_tile_order_wins() {
        let options = AggrOptions::default();
        let mut applied = 0usize;
        let err = run_ordered(
            &options,
            16,
            &mut applied,
            |t| {
                if t >= 5 {
                    Err(AggrError::precondition("test", format!("tile {t}")))
                } else {
                    Ok(())
                }
            },
            |applied: &mut usize, ()| *applied += 1,
        )
        .unwrap_err();
        assert_eq!(err, AggrError::precondition("test", "tile 5"));
        assert_eq!(applied, 5);
    }

    #[test]
    fn pooled_sort_is_stable() {
        let options = AggrOptions {
            min_parallel_tiles: 1,
            ..AggrOptions::default()
        };
        let keys: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 5) as u8).collect();
        let mut items: Vec<u32> = (0..1000).collect();
        stable_sort_by(&options, 8, &mut items, |&a, &b| {
            keys[a as usize].cmp(&keys[b as usize])
        });
        let mut expected: Vec<u32> = (0..1000).collect();
        expected.sort_by_key(|&p| keys[p as usize]);
        assert_eq!(items, expected);
    }

    #[test]
    fn sequential_options_stay_on_the_calling_thread() {
        assert!(!is_parallel(&AggrOptions::sequential(), 100));
        assert!(!is_parallel(&AggrOptions::default(), 1));
    }
}
