//! Parallel discovery over a shared, de-duplicating work list.
//!
//! Workers pop a node, resolve its direct dependencies and push whatever they
//! touched back on the list. The list remembers every entry it has ever held,
//! so nothing is queued twice. Once all workers have drained the list, the
//! hash pass runs on the calling thread over everything that was discovered.

use crate::error::{DepInfoError, Result};
use crate::graph::{NodeId, Resolver};
use anyhow::Context;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Thread-safe queue that accepts each item at most once over its lifetime.
pub struct WorkList<T> {
    inner: Mutex<WorkListInner<T>>,
}

struct WorkListInner<T> {
    queue: VecDeque<T>,
    all_entries: HashSet<T>,
    /// Popped but not yet reported back through `finish`.
    in_flight: usize,
}

impl<T: Copy + Eq + Hash> WorkList<T> {
    pub fn new<I: IntoIterator<Item = T>>(items: I) -> Self {
        let list = Self {
            inner: Mutex::new(WorkListInner {
                queue: VecDeque::new(),
                all_entries: HashSet::new(),
                in_flight: 0,
            }),
        };
        for item in items {
            list.add(item);
        }
        list
    }

    /// Queue `item` unless it has ever been queued before. Returns true if queued.
    pub fn add(&self, item: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.all_entries.insert(item) {
            inner.queue.push_back(item);
            true
        } else {
            false
        }
    }

    /// Take the next item. Every popped item must be handed back to `finish`.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.queue.pop_front()?;
        inner.in_flight += 1;
        Some(item)
    }

    pub fn finish(&self) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }

    /// Nothing queued and nobody still working on a popped item.
    pub fn is_drained(&self) -> bool {
        let inner = self.inner.lock();
        inner.queue.is_empty() && inner.in_flight == 0
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_all_entries(self) -> HashSet<T> {
        self.inner.into_inner().all_entries
    }
}

/// Cooperative stop signal for a concurrent resolution.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a concurrent resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResolutionReport {
    /// Nodes that went through the work list.
    pub discovered: usize,
    /// Nodes with final dependent hashes and timestamps.
    pub hashed: usize,
    /// Nodes the package source could not open.
    pub invalid: usize,
    /// Valid nodes whose closure reaches an invalid one.
    pub degraded: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Options for [`resolve_concurrently`].
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyOptions {
    pub workers: usize,
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

/// Discover the closure of `roots` on `options.workers` threads, then hash it.
pub fn resolve_concurrently(
    resolver: &Resolver<'_>,
    roots: Vec<NodeId>,
    options: &ConcurrencyOptions,
) -> Result<ResolutionReport> {
    let started = Instant::now();
    let workers = options.workers.max(1);
    let work = WorkList::new(roots);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("pkgdeps-resolve-{i}"))
        .build()
        .context("Failed to start dependency resolution workers")?;

    {
        let _discovery = resolver.discovery();
        let work = &work;
        pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(move |_| drain(resolver, work, options));
            }
        });
    }

    if options.cancel.is_cancelled() {
        return Err(DepInfoError::Cancelled);
    }

    let all = work.into_all_entries();
    resolver.resolve_hashes_and_timestamps(all.iter().copied());

    let graph = resolver.graph();
    let mut report = ResolutionReport {
        discovered: all.len(),
        ..Default::default()
    };
    for &id in &all {
        let state = graph.node(id).state();
        if !state.valid {
            report.invalid += 1;
        } else if state.hashes_resolved {
            report.hashed += 1;
        } else if state.unresolved_dependency.is_some() {
            report.degraded += 1;
        }
    }
    report.elapsed = started.elapsed();

    info!(
        "Resolved {} packages on {workers} workers in {:?} ({} invalid, {} degraded)",
        report.discovered, report.elapsed, report.invalid, report.degraded
    );
    Ok(report)
}

/// Worker body: runs until the list is drained or the resolution is cancelled.
fn drain(resolver: &Resolver<'_>, work: &WorkList<NodeId>, options: &ConcurrencyOptions) {
    loop {
        if options.deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("Resolution deadline passed");
            options.cancel.cancel();
        }
        if options.cancel.is_cancelled() {
            return;
        }
        let Some(id) = work.pop() else {
            if work.is_drained() {
                return;
            }
            // another worker may still push what it finds
            std::thread::sleep(IDLE_WAIT);
            continue;
        };
        match resolver.resolve_direct_dependencies(id) {
            Ok(touched) => {
                for dependency in touched {
                    work.add(dependency);
                }
            }
            Err(e) => debug!("Not expanding {}: {e}", resolver.graph().node(id).name()),
        }
        work.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_list_dedups_forever() {
        let list = WorkList::new([1, 2, 2, 3]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.pop(), Some(1));
        assert!(!list.add(1), "popped items stay known");
        assert!(list.add(4));
        assert!(!list.is_drained());
        while list.pop().is_some() {
            list.finish();
        }
        list.finish();
        assert!(list.is_drained());
        assert_eq!(list.into_all_entries(), HashSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn test_work_list_concurrent_adds() {
        let list = Arc::new(WorkList::new(Vec::<u32>::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let list = Arc::clone(&list);
                std::thread::spawn(move || (0..100).filter(|i| list.add(*i)).count())
            })
            .collect();
        let queued: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(queued, 100);
        assert_eq!(list.len(), 100);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
